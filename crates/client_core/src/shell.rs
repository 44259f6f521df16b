use std::{sync::Arc, time::Duration};

use shared::domain::SlotLabel;
use tokio::{
    sync::{broadcast::error::RecvError, Mutex},
    task::JoinHandle,
};

use crate::{
    catalog::{CatalogStatus, GameCatalog},
    session_gate::{GateEvent, GateState, SessionGate},
    AuthError, SignUpOutcome,
};

/// Window after a navigation during which tool overlays are suppressed even
/// if toggled, so a revealed name never flashes over the incoming game.
pub const NAVIGATION_DEBOUNCE: Duration = Duration::from_millis(300);

pub const VERIFICATION_PENDING_NOTICE: &str =
    "Verification email sent. Confirm your address before signing in.";

/// What the UI should render right now. A pure projection of gate state,
/// catalog state and the shell's local toggles; owns no business data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    /// Blocking loading view: session probe or allowlist check in flight.
    CheckingSession { email: Option<String> },
    LoginForm {
        error: Option<String>,
        notice: Option<String>,
    },
    AccessDenied { email: Option<String> },
    LoadingCatalog,
    NoGames { error_banner: Option<String> },
    Game(GameView),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameView {
    pub title: String,
    pub index: usize,
    pub total: usize,
    /// False when there is at most one record; navigation controls render
    /// disabled rather than erroring.
    pub can_navigate: bool,
    pub tools_visible: bool,
    pub deployed_count: usize,
    pub slots: Vec<SlotView>,
    pub error_banner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotView {
    pub label: SlotLabel,
    pub status: SlotStatus,
    /// Tool name, present only while the reveal toggle is on and no
    /// navigation debounce window is open.
    pub tool: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotStatus {
    Live { url: String },
    NotDeployed,
}

struct UiState {
    tools_visible: bool,
    navigating: bool,
    /// Identifies the currently armed debounce timer. A new navigation bumps
    /// the generation, invalidating any timer still pending for the old one.
    nav_generation: u64,
}

#[derive(Default)]
struct FormState {
    error: Option<String>,
    notice: Option<String>,
}

/// Composes the session gate and the game catalog into a renderable view,
/// and owns the local UI toggles (tool reveal, navigation debounce).
pub struct PresentationShell {
    gate: Arc<SessionGate>,
    catalog: Mutex<GameCatalog>,
    ui: Mutex<UiState>,
    form: Mutex<FormState>,
    gate_task: Mutex<Option<JoinHandle<()>>>,
}

impl PresentationShell {
    pub fn new(gate: Arc<SessionGate>, catalog: GameCatalog) -> Arc<Self> {
        Arc::new(Self {
            gate,
            catalog: Mutex::new(catalog),
            ui: Mutex::new(UiState {
                tools_visible: false,
                navigating: false,
                nav_generation: 0,
            }),
            form: Mutex::new(FormState::default()),
            gate_task: Mutex::new(None),
        })
    }

    /// Starts the session gate and arranges for the catalog to load once the
    /// gate first reaches `Authorized`. Catalog data is never fetched, let
    /// alone rendered, before authorization.
    pub async fn start(self: &Arc<Self>) {
        let mut events = self.gate.subscribe();
        let weak = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(GateEvent::StateChanged(GateState::Authorized { .. })) => {
                        let Some(shell) = weak.upgrade() else {
                            break;
                        };
                        shell.catalog.lock().await.load().await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
            }
        });
        {
            let mut guard = self.gate_task.lock().await;
            if let Some(previous) = guard.replace(task) {
                previous.abort();
            }
        }
        self.gate.start().await;
    }

    pub async fn shutdown(&self) {
        if let Some(task) = self.gate_task.lock().await.take() {
            task.abort();
        }
        self.gate.shutdown().await;
    }

    pub async fn sign_in(&self, email: &str, secret: &str) -> Result<(), AuthError> {
        self.clear_form().await;
        let result = self.gate.sign_in(email, secret).await;
        if let Err(err) = &result {
            self.form.lock().await.error = Some(format!("Authentication failed: {err}"));
        }
        result
    }

    pub async fn sign_up(&self, email: &str, secret: &str) -> Result<SignUpOutcome, AuthError> {
        self.clear_form().await;
        let result = self.gate.sign_up(email, secret).await;
        let mut form = self.form.lock().await;
        match &result {
            Ok(SignUpOutcome::VerificationPending) => {
                form.notice = Some(VERIFICATION_PENDING_NOTICE.to_string());
            }
            Ok(SignUpOutcome::SessionEstablished) => {}
            Err(err) => form.error = Some(format!("Sign-up failed: {err}")),
        }
        result
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.clear_form().await;
        self.gate.sign_out().await
    }

    async fn clear_form(&self) {
        let mut form = self.form.lock().await;
        form.error = None;
        form.notice = None;
    }

    pub async fn next_game(self: &Arc<Self>) {
        let moved = self.catalog.lock().await.next();
        if moved {
            self.begin_navigation().await;
        }
    }

    pub async fn prev_game(self: &Arc<Self>) {
        let moved = self.catalog.lock().await.prev();
        if moved {
            self.begin_navigation().await;
        }
    }

    pub async fn toggle_tools(&self) {
        let mut ui = self.ui.lock().await;
        ui.tools_visible = !ui.tools_visible;
    }

    pub async fn reveal_tools(&self) {
        self.ui.lock().await.tools_visible = true;
    }

    pub async fn hide_tools(&self) {
        self.ui.lock().await.tools_visible = false;
    }

    /// Re-hides tool names and opens a fresh debounce window. The previous
    /// window's timer is invalidated, not stacked: only a timer whose
    /// generation still matches may clear the navigating flag.
    async fn begin_navigation(self: &Arc<Self>) {
        let generation = {
            let mut ui = self.ui.lock().await;
            ui.tools_visible = false;
            ui.navigating = true;
            ui.nav_generation += 1;
            ui.nav_generation
        };

        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(NAVIGATION_DEBOUNCE).await;
            if let Some(shell) = weak.upgrade() {
                let mut ui = shell.ui.lock().await;
                if ui.nav_generation == generation {
                    ui.navigating = false;
                }
            }
        });
    }

    pub async fn view(&self) -> View {
        match self.gate.state().await {
            GateState::Checking => View::CheckingSession { email: None },
            GateState::CheckingAuthorization { email } => View::CheckingSession {
                email: Some(email),
            },
            GateState::Unauthenticated => {
                let form = self.form.lock().await;
                View::LoginForm {
                    error: form.error.clone(),
                    notice: form.notice.clone(),
                }
            }
            GateState::Unauthorized { email } => View::AccessDenied { email },
            GateState::Authorized { .. } => {
                let catalog = self.catalog.lock().await;
                if *catalog.status() == CatalogStatus::Loading {
                    return View::LoadingCatalog;
                }
                match catalog.current() {
                    Some(record) => {
                        let ui = self.ui.lock().await;
                        let tools_shown = ui.tools_visible && !ui.navigating;
                        let title = if record.title.trim().is_empty() {
                            format!("Game {}", catalog.index() + 1)
                        } else {
                            record.title.clone()
                        };
                        View::Game(GameView {
                            title,
                            index: catalog.index(),
                            total: catalog.len(),
                            can_navigate: catalog.len() > 1,
                            tools_visible: ui.tools_visible,
                            deployed_count: record.deployed_count(),
                            slots: record
                                .slots
                                .iter()
                                .map(|slot| SlotView {
                                    label: slot.label,
                                    status: match slot.website_url() {
                                        Some(url) => SlotStatus::Live {
                                            url: url.to_string(),
                                        },
                                        None => SlotStatus::NotDeployed,
                                    },
                                    tool: tools_shown.then(|| slot.tool.clone()),
                                })
                                .collect(),
                            error_banner: catalog.error().map(str::to_string),
                        })
                    }
                    None => View::NoGames {
                        error_banner: catalog.error().map(str::to_string),
                    },
                }
            }
        }
    }
}
