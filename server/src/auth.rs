//! Request gate and login endpoint.
//!
//! Authorization is a pure function of the request path, its headers and the
//! configured credential pair. There is no server-side session table: the
//! session cookie carries a fixed sentinel and its exact value is the proof.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::{config::Credentials, SharedState};

pub const SESSION_COOKIE: &str = "auth_token";
pub const SESSION_VALUE: &str = "logged_in";
pub const SESSION_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 7;
pub const REALM: &str = "Script Hub";
pub const LOGIN_PAGE: &str = "/login";

/// Path prefixes served without any credential check.
const BYPASS_PREFIXES: &[&str] = &["/static", "/favicon.ico", "/api/cli", "/api/raw", "/raw"];
/// Exact paths served without any credential check.
const BYPASS_EXACT: &[&str] = &["/api/login", "/script", LOGIN_PAGE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// API request without valid credentials: 401 plus a Basic challenge.
    Challenge,
    /// Page request without valid credentials: send to the login page.
    RedirectToLogin,
}

pub fn is_bypassed(path: &str) -> bool {
    BYPASS_EXACT.contains(&path) || BYPASS_PREFIXES.iter().any(|p| path.starts_with(p))
}

/// The only `Authorization` value accepted, compared byte for byte.
pub fn expected_basic_header(creds: &Credentials) -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!("{}:{}", creds.username, creds.password))
    )
}

pub fn authorize(path: &str, headers: &HeaderMap, creds: &Credentials) -> Decision {
    if is_bypassed(path) {
        return Decision::Allow;
    }

    if session_cookie(headers).as_deref() == Some(SESSION_VALUE) {
        return Decision::Allow;
    }

    if let Some(auth) = headers.get(header::AUTHORIZATION) {
        if auth.as_bytes() == expected_basic_header(creds).as_bytes() {
            return Decision::Allow;
        }
    }

    if path.starts_with("/api") {
        Decision::Challenge
    } else {
        Decision::RedirectToLogin
    }
}

/// Value of the session cookie, scanning every `Cookie` header.
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

/// Axum middleware wrapping every route.
pub async fn gate(State(state): State<SharedState>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();

    match authorize(&path, req.headers(), &state.config.credentials) {
        Decision::Allow => next.run(req).await,
        Decision::Challenge => {
            debug!("Rejected unauthenticated API request to {}", path);
            unauthorized()
        }
        Decision::RedirectToLogin => Redirect::temporary(LOGIN_PAGE).into_response(),
    }
}

fn unauthorized() -> Response {
    let challenge = HeaderValue::from_str(&format!("Basic realm=\"{}\"", REALM))
        .unwrap_or_else(|_| HeaderValue::from_static("Basic"));

    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, challenge)],
        "Unauthorized",
    )
        .into_response()
}

// --------------------------------------------
// Login
// --------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

pub fn session_cookie_header() -> String {
    format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, SESSION_VALUE, SESSION_MAX_AGE_SECS
    )
}

/// POST /api/login
/// Sets the session cookie when the submitted pair matches exactly.
pub async fn login(State(state): State<SharedState>, Json(body): Json<LoginRequest>) -> Response {
    let creds = &state.config.credentials;

    if body.username == creds.username && body.password == creds.password {
        info!("Login succeeded for {}", body.username);
        return (
            [(header::SET_COOKIE, session_cookie_header())],
            Json(json!({ "success": true })),
        )
            .into_response();
    }

    warn!("Login failed for {:?}", body.username);
    (StatusCode::UNAUTHORIZED, Json(json!({ "success": false }))).into_response()
}
