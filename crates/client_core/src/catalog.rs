use std::sync::Arc;

use serde_json::Value;
use shared::{domain::GameRecord, protocol::SheetRow};
use tracing::warn;

use crate::{error::CatalogFetchError, CatalogSource};

/// Field name the spreadsheet API wraps its rows under when it does not
/// return a bare array.
const NAMED_ARRAY_FIELD: &str = "sheet1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogStatus {
    Loading,
    Ready,
    /// The fetch failed; the catalog holds placeholder data and the message
    /// is shown as a banner. Navigation and display still function.
    Failed { message: String },
}

/// Which shape of the response body the record array was found in. Anything
/// other than a bare array is format drift worth logging.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ParsedShape {
    BareArray,
    NamedField,
    FirstArrayField(String),
}

/// In-memory ordered list of game records plus a wrapping current-index
/// pointer. Populated by a single fetch attempt; never refetched.
pub struct GameCatalog {
    source: Arc<dyn CatalogSource>,
    games: Vec<GameRecord>,
    index: usize,
    status: CatalogStatus,
    load_attempted: bool,
}

impl GameCatalog {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self {
            source,
            games: Vec::new(),
            index: 0,
            status: CatalogStatus::Loading,
            load_attempted: false,
        }
    }

    /// Issues the one and only fetch. Subsequent calls are no-ops.
    pub async fn load(&mut self) {
        if self.load_attempted {
            return;
        }
        self.load_attempted = true;

        let body = match self.source.fetch_catalog().await {
            Ok(body) => body,
            Err(err) => {
                self.fail(CatalogFetchError::Transport(err.to_string()));
                return;
            }
        };

        match extract_records(&body) {
            Ok((games, shape)) => {
                if let ParsedShape::FirstArrayField(field) = &shape {
                    warn!("catalog response shape drifted, using first array field {field:?}");
                } else if shape == ParsedShape::NamedField {
                    warn!("catalog response wrapped in {NAMED_ARRAY_FIELD:?} field");
                }
                self.games = games;
                self.index = 0;
                self.status = CatalogStatus::Ready;
            }
            Err(err) => self.fail(err),
        }
    }

    fn fail(&mut self, err: CatalogFetchError) {
        warn!("catalog fetch failed, falling back to placeholder data: {err}");
        self.games = vec![placeholder_record()];
        self.index = 0;
        self.status = CatalogStatus::Failed {
            message: format!("Failed to load games: {err}"),
        };
    }

    /// Advances the pointer, wrapping at the end. No-op on an empty catalog.
    pub fn next(&mut self) -> bool {
        if self.games.is_empty() {
            return false;
        }
        self.index = (self.index + 1) % self.games.len();
        true
    }

    /// Moves the pointer back, wrapping at the start. No-op on an empty
    /// catalog.
    pub fn prev(&mut self) -> bool {
        if self.games.is_empty() {
            return false;
        }
        self.index = (self.index + self.games.len() - 1) % self.games.len();
        true
    }

    pub fn current(&self) -> Option<&GameRecord> {
        self.games.get(self.index)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    pub fn status(&self) -> &CatalogStatus {
        &self.status
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            CatalogStatus::Failed { message } => Some(message),
            _ => None,
        }
    }
}

/// Finds the record array in the response, trying shapes in a fixed order:
/// bare array, the named wrapper field, then the first array-valued field.
fn extract_records(body: &Value) -> Result<(Vec<GameRecord>, ParsedShape), CatalogFetchError> {
    let (array, shape) = if body.is_array() {
        (body.clone(), ParsedShape::BareArray)
    } else if let Some(named) = body.get(NAMED_ARRAY_FIELD).filter(|v| v.is_array()) {
        (named.clone(), ParsedShape::NamedField)
    } else if let Some((field, value)) = body
        .as_object()
        .and_then(|obj| obj.iter().find(|(_, v)| v.is_array()))
    {
        (value.clone(), ParsedShape::FirstArrayField(field.clone()))
    } else {
        return Err(CatalogFetchError::NoRecordArray);
    };

    let rows: Vec<SheetRow> = serde_json::from_value(array)
        .map_err(|err| CatalogFetchError::Malformed(err.to_string()))?;
    Ok((
        rows.into_iter().map(SheetRow::into_record).collect(),
        shape,
    ))
}

/// The one hard-coded record shown when the fetch fails.
pub fn placeholder_record() -> GameRecord {
    SheetRow {
        title: "Game1: build me a minimalist note taking journal".into(),
        link_a_tool: "Dualite".into(),
        link_a_website: "https://spectacular-otter-545c51.netlify.app".into(),
        link_b_tool: "Lovable".into(),
        link_b_website: "https://simple-thoughts-log.lovable.app".into(),
        link_c_tool: "Bolt".into(),
        link_c_website: "https://journal-alpha-iota.vercel.app/".into(),
        link_d_tool: "v0".into(),
        link_d_website: "https://journall-v0.vercel.app".into(),
        id: Some(2),
    }
    .into_record()
}
