use std::{path::Path, time::Duration};

use anyhow::{anyhow, Context, Result};
use reqwest::{
    blocking::{multipart, Client, RequestBuilder, Response},
    Url,
};
use serde::Deserialize;

use crate::types::CliIndex;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:7524";

/// Basic credentials sent on protected calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// `SCRIPTHUB_USER` and `SCRIPTHUB_PASSWORD`, when both are set.
    pub fn from_env() -> Option<Self> {
        match (
            std::env::var("SCRIPTHUB_USER"),
            std::env::var("SCRIPTHUB_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) => Some(Self { username, password }),
            _ => None,
        }
    }
}

/// Blocking client for a Script Hub server.
pub struct HubClient {
    base: String,
    http: Client,
    credentials: Option<Credentials>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl HubClient {
    pub fn new(base: &str, credentials: Option<Credentials>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            http,
            credentials,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    /// `/raw/<path>` with every segment of `path` percent-encoded.
    pub fn raw_url(&self, path: &str) -> Result<Url> {
        let mut url = Url::parse(&self.url("raw"))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("{} cannot be used as a base URL", self.base))?
            .extend(path.trim_start_matches('/').split('/'));
        Ok(url)
    }

    fn authed(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        let creds = self.credentials.as_ref().ok_or_else(|| {
            anyhow!("this command needs SCRIPTHUB_USER and SCRIPTHUB_PASSWORD to be set")
        })?;
        Ok(req.basic_auth(&creds.username, Some(&creds.password)))
    }

    /// GET /api/cli
    pub fn index(&self) -> Result<CliIndex> {
        let resp = self.http.get(self.url("api/cli")).send()?;
        Ok(check(resp)?.json::<CliIndex>()?)
    }

    /// GET /raw/<path>
    pub fn raw(&self, path: &str) -> Result<String> {
        let resp = self.http.get(self.raw_url(path)?).send()?;
        Ok(check(resp).with_context(|| format!("cannot fetch {}", path))?.text()?)
    }

    /// POST /api/scripts with the file's bytes as the upload.
    pub fn push(&self, file: &Path, category: Option<&str>, name: Option<&str>) -> Result<()> {
        let bytes = std::fs::read(file).with_context(|| format!("cannot read {:?}", file))?;
        let file_name = name
            .map(str::to_string)
            .or_else(|| file.file_name().map(|n| n.to_string_lossy().into_owned()))
            .ok_or_else(|| anyhow!("cannot infer a file name from {:?}", file))?;

        let mut form = multipart::Form::new()
            .text("filename", file_name.clone())
            .part("file", multipart::Part::bytes(bytes).file_name(file_name));
        if let Some(cat) = category {
            form = form.text("category", cat.to_string());
        }

        let req = self.authed(self.http.post(self.url("api/scripts")))?;
        check(req.multipart(form).send()?)?;
        Ok(())
    }

    /// DELETE /api/scripts?path=<path>
    pub fn remove(&self, path: &str) -> Result<()> {
        let req = self
            .http
            .delete(self.url("api/scripts"))
            .query(&[("path", path)]);
        check(self.authed(req)?.send()?)?;
        Ok(())
    }

    /// GET /api/download
    pub fn export(&self) -> Result<Vec<u8>> {
        let req = self.authed(self.http.get(self.url("api/download")))?;
        Ok(check(req.send()?)?.bytes()?.to_vec())
    }
}

/// Passes 2xx responses through; turns anything else into an error that
/// carries the server's short reason.
fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().unwrap_or_default();
    Err(anyhow!(error_message(status.as_u16(), &body)))
}

pub fn error_message(status: u16, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return format!("server returned {}: {}", status, parsed.error);
    }

    match (status, body.trim()) {
        (401, _) => "server returned 401: credentials rejected".to_string(),
        (_, "") => format!("server returned {}", status),
        (_, text) => format!("server returned {}: {}", status, text),
    }
}
