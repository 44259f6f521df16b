use std::{collections::HashMap, time::Duration};

use axum::{
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;

use crate::{
    catalog::GameCatalog,
    config::Settings,
    hosted::{HostedAllowlistDirectory, HostedIdentityProvider},
    session_gate::SessionGate,
    shell::{PresentationShell, View},
    sheet::SheetCatalogSource,
    tests_support::sheet_row,
    AllowlistDirectory, AuthError, CatalogSource, IdentityProvider, SignUpOutcome,
};

#[derive(Debug, Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

async fn handle_token(
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Credentials>,
) -> Response {
    if params.get("grant_type").map(String::as_str) != Some("password") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "unsupported_grant_type" })),
        )
            .into_response();
    }
    if body.email == "user@x.com" && body.password == "hunter2000" {
        Json(json!({
            "access_token": "tok-123",
            "token_type": "bearer",
            "user": { "id": "u1", "email": "user@x.com" }
        }))
        .into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })),
        )
            .into_response()
    }
}

async fn handle_signup(Json(body): Json<Credentials>) -> Response {
    if body.email == "taken@x.com" {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error_code": "user_already_exists",
                "msg": "User already registered"
            })),
        )
            .into_response();
    }
    if body.password.len() < 6 {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error_code": "weak_password",
                "msg": "Password should be at least 6 characters"
            })),
        )
            .into_response();
    }
    Json(json!({ "user": { "id": "u2", "email": body.email } })).into_response()
}

async fn handle_logout() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn handle_allowlist(Query(params): Query<HashMap<String, String>>) -> Response {
    match params.get("email").map(String::as_str) {
        Some("eq.user@x.com") => Json(json!([{ "email": "user@x.com" }])).into_response(),
        Some(_) => Json(json!([])).into_response(),
        None => Json(json!([{ "email": "admin@x.com" }, { "email": "user@x.com" }]))
            .into_response(),
    }
}

async fn handle_sheet() -> Response {
    Json(json!({
        "sheet1": [sheet_row("Game1: journal", ["https://a", "", "https://c", ""])]
    }))
    .into_response()
}

async fn spawn_service() -> Settings {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let app = Router::new()
        .route("/auth/v1/token", post(handle_token))
        .route("/auth/v1/signup", post(handle_signup))
        .route("/auth/v1/logout", post(handle_logout))
        .route("/rest/v1/authorized_users", get(handle_allowlist))
        .route("/sheet1", get(handle_sheet));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Settings {
        service_url: format!("http://{addr}"),
        service_key: "test-key".to_string(),
        catalog_url: format!("http://{addr}/sheet1"),
        request_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn sign_in_establishes_session_and_notifies() {
    let settings = spawn_service().await;
    let provider = HostedIdentityProvider::new(&settings).expect("provider");
    let mut changes = provider.subscribe_changes();

    let identity = provider.sign_in("user@x.com", "hunter2000").await.unwrap();
    assert_eq!(identity.email.as_deref(), Some("user@x.com"));

    let change = changes.recv().await.expect("change emitted");
    assert_eq!(
        change.identity.and_then(|i| i.email).as_deref(),
        Some("user@x.com")
    );

    let session = provider.current_session().await.unwrap();
    assert_eq!(
        session.and_then(|i| i.email).as_deref(),
        Some("user@x.com")
    );
}

#[tokio::test]
async fn sign_in_maps_rejection_to_invalid_credentials() {
    let settings = spawn_service().await;
    let provider = HostedIdentityProvider::new(&settings).expect("provider");
    let err = provider.sign_in("user@x.com", "wrong").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    assert!(provider.current_session().await.unwrap().is_none());
}

#[tokio::test]
async fn sign_up_maps_service_errors() {
    let settings = spawn_service().await;
    let provider = HostedIdentityProvider::new(&settings).expect("provider");

    let err = provider.sign_up("taken@x.com", "hunter2000").await.unwrap_err();
    assert!(matches!(err, AuthError::AlreadyExists));

    let err = provider.sign_up("new@x.com", "pw").await.unwrap_err();
    assert!(matches!(err, AuthError::WeakSecret));

    let outcome = provider.sign_up("new@x.com", "hunter2000").await.unwrap();
    assert_eq!(outcome, SignUpOutcome::VerificationPending);
    // No session until the email is verified.
    assert!(provider.current_session().await.unwrap().is_none());
}

#[tokio::test]
async fn sign_out_clears_session_and_notifies() {
    let settings = spawn_service().await;
    let provider = HostedIdentityProvider::new(&settings).expect("provider");
    provider.sign_in("user@x.com", "hunter2000").await.unwrap();

    let mut changes = provider.subscribe_changes();
    provider.sign_out().await.unwrap();

    let change = changes.recv().await.expect("change emitted");
    assert!(change.identity.is_none());
    assert!(provider.current_session().await.unwrap().is_none());
}

#[tokio::test]
async fn allowlist_lookup_reflects_table_membership() {
    let settings = spawn_service().await;
    let directory = HostedAllowlistDirectory::new(&settings).expect("directory");

    assert!(directory.is_email_authorized("user@x.com").await.unwrap());
    assert!(!directory.is_email_authorized("other@x.com").await.unwrap());

    let emails = directory.authorized_emails().await.unwrap();
    assert_eq!(emails, vec!["admin@x.com", "user@x.com"]);
}

#[tokio::test]
async fn sheet_source_fetches_wrapped_rows() {
    let settings = spawn_service().await;
    let source = SheetCatalogSource::new(&settings).expect("source");
    let body = source.fetch_catalog().await.unwrap();
    assert!(body.get("sheet1").is_some_and(|v| v.is_array()));
}

#[tokio::test]
async fn sheet_source_propagates_error_status() {
    let mut settings = spawn_service().await;
    settings.catalog_url = format!("{}/missing", settings.service_url);
    let source = SheetCatalogSource::new(&settings).expect("source");
    let err = source.fetch_catalog().await.unwrap_err();
    assert!(err.to_string().contains("error status"), "got: {err}");
}

#[tokio::test]
async fn full_stack_sign_in_reaches_the_game_view() {
    let settings = spawn_service().await;
    let provider =
        std::sync::Arc::new(HostedIdentityProvider::new(&settings).expect("provider"));
    let directory =
        std::sync::Arc::new(HostedAllowlistDirectory::new(&settings).expect("directory"));
    let source = std::sync::Arc::new(SheetCatalogSource::new(&settings).expect("source"));

    let gate = SessionGate::new(provider, directory);
    let shell = PresentationShell::new(gate, GameCatalog::new(source));
    shell.start().await;

    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if matches!(shell.view().await, View::LoginForm { .. }) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("login form shown");

    shell.sign_in("user@x.com", "hunter2000").await.unwrap();

    let view = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let View::Game(game) = shell.view().await {
                return game;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("game view reached");

    assert_eq!(view.title, "Game1: journal");
    assert_eq!(view.deployed_count, 2);
}
