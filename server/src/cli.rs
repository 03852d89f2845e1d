use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::error;

use crate::{scripts::on_store, store::Category, SharedState};

/// Shipped template, used unless `SCRIPTHUB_CLI_TEMPLATE` points elsewhere.
pub const EMBEDDED_TEMPLATE: &str = include_str!("../assets/cli-template.sh");
pub const SERVER_URL_TOKEN: &str = "__SERVER_URL__";
const DEFAULT_HOST: &str = "localhost:7524";

const TEMPLATE_ERROR_SCRIPT: &str =
    "#!/bin/bash\necho \"Error: unable to generate CLI script\"\nexit 1";

#[derive(Debug, Serialize, PartialEq)]
pub struct CliScript {
    pub name: String,
    pub path: String,
    pub extension: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct CliIndex {
    pub success: bool,
    pub total: usize,
    pub categories: usize,
    /// Categories in listing order, `Uncategorized` last.
    pub data: IndexMap<String, Vec<CliScript>>,
}

impl CliIndex {
    pub fn from_categories(categories: Vec<Category>) -> Self {
        let total = categories.iter().map(|c| c.scripts.len()).sum();
        let count = categories.len();

        let data = categories
            .into_iter()
            .map(|cat| {
                let scripts = cat
                    .scripts
                    .into_iter()
                    .map(|s| CliScript {
                        name: s.name,
                        path: s.path,
                        extension: s.extension,
                        description: s.description.unwrap_or_default(),
                    })
                    .collect();
                (cat.name, scripts)
            })
            .collect();

        CliIndex {
            success: true,
            total,
            categories: count,
            data,
        }
    }
}

/// GET /api/cli
/// Flat listing for command-line consumers.
pub async fn index(State(state): State<SharedState>) -> Response {
    match on_store(&state, |store| store.list()).await {
        Ok(categories) => Json(CliIndex::from_categories(categories)).into_response(),
        Err(e) => {
            error!("CLI listing failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "success": false,
                    "error": "Failed to list scripts"
                })),
            )
                .into_response()
        }
    }
}

/// Base URL the client used to reach us, honoring a proxy's scheme header.
pub fn server_url(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_HOST);
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    format!("{}://{}", proto, host)
}

pub fn render(template: &str, server_url: &str) -> String {
    template.replace(SERVER_URL_TOKEN, server_url)
}

/// GET /api/cli/script and its /script alias.
/// Serves the shell helper with this server's URL baked in.
pub async fn script(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let template = match &state.config.cli_template {
        Some(path) => match tokio::fs::read_to_string(path).await {
            Ok(t) => t,
            Err(e) => {
                error!("CLI template {} unreadable: {}", path.display(), e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    [(header::CONTENT_TYPE, "text/plain")],
                    TEMPLATE_ERROR_SCRIPT,
                )
                    .into_response();
            }
        },
        None => EMBEDDED_TEMPLATE.to_string(),
    };

    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "inline; filename=\"cli.sh\""),
        ],
        render(&template, &server_url(&headers)),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ScriptEntry, UNCATEGORIZED};
    use axum::http::HeaderValue;
    use chrono::Utc;

    fn entry(path: &str, category: &str, description: Option<&str>) -> ScriptEntry {
        ScriptEntry {
            name: path.rsplit('/').next().unwrap().to_string(),
            path: path.to_string(),
            category: category.to_string(),
            extension: ".sh".to_string(),
            size: 1,
            updated_at: Utc::now(),
            description: description.map(str::to_string),
        }
    }

    #[test]
    fn index_counts_and_flattens() {
        let idx = CliIndex::from_categories(vec![
            Category {
                name: "ops".into(),
                scripts: vec![
                    entry("ops/a.sh", "ops", Some("does a")),
                    entry("ops/b.sh", "ops", None),
                ],
            },
            Category {
                name: UNCATEGORIZED.into(),
                scripts: vec![entry("c.sh", UNCATEGORIZED, None)],
            },
        ]);

        assert_eq!(idx.total, 3);
        assert_eq!(idx.categories, 2);
        assert_eq!(idx.data["ops"][0].description, "does a");
        assert_eq!(idx.data["ops"][1].description, "");
        assert_eq!(idx.data[UNCATEGORIZED][0].path, "c.sh");
    }

    #[test]
    fn index_keeps_listing_order() {
        let idx = CliIndex::from_categories(vec![
            Category {
                name: "zeta".into(),
                scripts: vec![entry("zeta/z.sh", "zeta", None)],
            },
            Category {
                name: "alpha".into(),
                scripts: vec![entry("alpha/a.sh", "alpha", None)],
            },
            Category {
                name: UNCATEGORIZED.into(),
                scripts: vec![entry("c.sh", UNCATEGORIZED, None)],
            },
        ]);

        let keys: Vec<&str> = idx.data.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", UNCATEGORIZED]);

        let json = serde_json::to_string(&idx).unwrap();
        let zeta = json.find("\"zeta\"").unwrap();
        let alpha = json.find("\"alpha\"").unwrap();
        assert!(zeta < alpha);
    }

    #[test]
    fn server_url_uses_host_and_forwarded_proto() {
        let mut headers = HeaderMap::new();
        assert_eq!(server_url(&headers), "http://localhost:7524");

        headers.insert(header::HOST, HeaderValue::from_static("hub.example:8080"));
        assert_eq!(server_url(&headers), "http://hub.example:8080");

        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        assert_eq!(server_url(&headers), "https://hub.example:8080");
    }

    #[test]
    fn render_replaces_every_token() {
        let out = render(EMBEDDED_TEMPLATE, "http://hub:7524");
        assert!(!out.contains(SERVER_URL_TOKEN));
        assert!(out.contains("http://hub:7524"));
    }
}
