use std::{sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use client_core::{
    load_settings, GameCatalog, HostedAllowlistDirectory, HostedIdentityProvider,
    PresentationShell, SessionGate, SheetCatalogSource, SlotStatus, View,
};

#[derive(Parser, Debug)]
struct Args {
    /// Sign in with this email before rendering.
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    secret: Option<String>,
    /// Override the configured catalog endpoint.
    #[arg(long)]
    catalog_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let mut settings = load_settings()?;
    if let Some(url) = args.catalog_url {
        settings.catalog_url = url;
    }

    let identity = Arc::new(HostedIdentityProvider::new(&settings)?);
    let allowlist = Arc::new(HostedAllowlistDirectory::new(&settings)?);
    let source = Arc::new(SheetCatalogSource::new(&settings)?);

    let gate = SessionGate::new(identity, allowlist);
    let shell = PresentationShell::new(gate, GameCatalog::new(source));
    shell.start().await;

    if let (Some(email), Some(secret)) = (&args.email, &args.secret) {
        if let Err(err) = shell.sign_in(email, secret).await {
            println!("Sign-in failed: {err}");
        }
    }

    let view = settle(&shell).await;
    render(&view);

    if matches!(view, View::Game(_)) {
        shell.next_game().await;
        println!();
        println!("-- after next() --");
        render(&settle(&shell).await);
    }

    shell.shutdown().await;
    Ok(())
}

/// Waits for the gate probe and catalog fetch to finish, up to a deadline.
async fn settle(shell: &Arc<PresentationShell>) -> View {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let view = shell.view().await;
        let pending = matches!(view, View::CheckingSession { .. } | View::LoadingCatalog);
        if !pending || tokio::time::Instant::now() >= deadline {
            return view;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

fn render(view: &View) {
    match view {
        View::CheckingSession { email: None } => println!("Verifying session..."),
        View::CheckingSession { email: Some(email) } => {
            println!("Checking clearance for {email}...");
        }
        View::LoginForm { error, notice } => {
            println!("Sign-in required.");
            if let Some(notice) = notice {
                println!("  {notice}");
            }
            if let Some(error) = error {
                println!("  {error}");
            }
        }
        View::AccessDenied { email } => match email {
            Some(email) => println!("Access denied for {email}."),
            None => println!("Access denied."),
        },
        View::LoadingCatalog => println!("Loading game data..."),
        View::NoGames { error_banner } => {
            if let Some(banner) = error_banner {
                println!("! {banner}");
            }
            println!("No games available.");
        }
        View::Game(game) => {
            if let Some(banner) = &game.error_banner {
                println!("! {banner}");
            }
            println!("{} ({} of {})", game.title, game.index + 1, game.total);
            println!("{}/4 deployed", game.deployed_count);
            for slot in &game.slots {
                let tool = slot.tool.as_deref().unwrap_or("???");
                match &slot.status {
                    SlotStatus::Live { url } => println!("  {}: {tool} {url}", slot.label),
                    SlotStatus::NotDeployed => println!("  {}: {tool} (not deployed)", slot.label),
                }
            }
        }
    }
}
