use anyhow::{Context, Result};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{TargetBase, TargetProvider};
use crate::config::{ConnectionString, TargetConfig};
use crate::error::ProviderError;
use crate::managers::run_log::Logger;

const API_URL: &str = "https://api.dropboxapi.com/2";
const CONTENT_URL: &str = "https://content.dropboxapi.com/2";
const CHUNK_SIZE: usize = 8 * 1024 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Dropbox account; buckets are folders below an optional base path.
///
/// `target` is either a bare access token or `token=...;path=...`.
/// The HTTP client is blocking and must only be created, used and dropped
/// on blocking threads.
pub struct DropboxTarget {
    base: TargetBase,
    token: String,
    path: String,
    api_url: String,
    content_url: String,
    client: Option<Client>,
}

#[derive(Deserialize)]
struct SessionStart {
    session_id: String,
}

#[derive(Deserialize)]
struct ListFolder {
    entries: Vec<ListEntry>,
    cursor: String,
    has_more: bool,
}

#[derive(Deserialize)]
struct ListEntry {
    #[serde(rename = ".tag")]
    tag: String,
    name: String,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    error_summary: String,
}

impl DropboxTarget {
    pub fn new(config: &TargetConfig, logger: &Logger) -> Result<Self, ProviderError> {
        let base = TargetBase::new(config, logger)?;
        let (token, path) = parse_target(&config.target);

        let token = token.ok_or_else(|| ProviderError::MissingSetting {
            name: config.name.clone(),
            key: "token".to_string(),
        })?;

        Ok(Self {
            base,
            token,
            path: normalize_path(path.as_deref()),
            api_url: API_URL.to_string(),
            content_url: CONTENT_URL.to_string(),
            client: None,
        })
    }

    /// Point the client at other endpoints (a local stand-in server)
    pub fn with_endpoints(mut self, api_url: &str, content_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self.content_url = content_url.trim_end_matches('/').to_string();
        self
    }

    /// Folder a bucket maps to
    pub fn bucket_path(&self, bucket: &str) -> String {
        format!("{}{}", self.path, bucket)
    }

    fn client(&mut self) -> Result<Client> {
        if let Some(client) = &self.client {
            return Ok(client.clone());
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(format!("multibackup/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        self.client = Some(client.clone());
        Ok(client)
    }

    fn content_call(&mut self, endpoint: &str, arg: serde_json::Value, body: Vec<u8>) -> Result<Response> {
        let url = format!("{}/{}", self.content_url, endpoint);
        let response = self
            .client()?
            .post(&url)
            .bearer_auth(&self.token)
            .header("Dropbox-API-Arg", header_json(&arg))
            .header("Content-Type", "application/octet-stream")
            .body(body)
            .send()
            .with_context(|| format!("POST {} failed", endpoint))?;

        check(response, endpoint)
    }

    fn api_call(&mut self, endpoint: &str, arg: serde_json::Value) -> Result<Response> {
        let url = format!("{}/{}", self.api_url, endpoint);
        self.client()?
            .post(&url)
            .bearer_auth(&self.token)
            .json(&arg)
            .send()
            .with_context(|| format!("POST {} failed", endpoint))
    }

    fn upload(&mut self, file: &Path, remote_path: &str) -> Result<()> {
        let mut input = File::open(file)?;
        let mut offset: u64 = 0;
        let mut session_id: Option<String> = None;

        loop {
            let mut chunk = Vec::with_capacity(CHUNK_SIZE);
            (&mut input).take(CHUNK_SIZE as u64).read_to_end(&mut chunk)?;
            let read = chunk.len() as u64;

            match &session_id {
                None => {
                    let response = self.content_call(
                        "files/upload_session/start",
                        json!({ "close": false }),
                        chunk,
                    )?;
                    let start: SessionStart = response.json()?;
                    session_id = Some(start.session_id);
                }
                Some(id) if read > 0 => {
                    let arg = json!({
                        "cursor": { "session_id": id, "offset": offset },
                        "close": false,
                    });
                    self.content_call("files/upload_session/append_v2", arg, chunk)?;
                }
                Some(_) => break,
            }

            offset += read;
            if read < CHUNK_SIZE as u64 {
                break;
            }
        }

        let Some(id) = session_id else {
            anyhow::bail!("upload session was not started");
        };
        let arg = json!({
            "cursor": { "session_id": id, "offset": offset },
            "commit": {
                "path": remote_path,
                "mode": "overwrite",
                "autorename": false,
                "mute": true,
            },
        });
        self.content_call("files/upload_session/finish", arg, Vec::new())?;
        Ok(())
    }

    fn list_root(&self) -> String {
        let trimmed = self.path.trim_end_matches('/');
        trimmed.to_string()
    }
}

fn check(response: Response, endpoint: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().unwrap_or_default();
    anyhow::bail!("{} returned {}: {}", endpoint, status, body)
}

/// Split the target into `(token, path)`; a string without `=` is the token
fn parse_target(raw: &str) -> (Option<String>, Option<String>) {
    if !raw.contains('=') {
        let token = raw.trim();
        return ((!token.is_empty()).then(|| token.to_string()), None);
    }

    let connection = ConnectionString::parse(raw);
    (
        connection.get("token").map(str::to_string),
        connection.get("path").map(str::to_string),
    )
}

/// Always `/`-prefixed and `/`-terminated
fn normalize_path(path: Option<&str>) -> String {
    let mut path = path.unwrap_or_default().trim().replace('\\', "/");
    if !path.starts_with('/') {
        path.insert(0, '/');
    }
    if !path.ends_with('/') {
        path.push('/');
    }
    path
}

/// HTTP headers must be ASCII; escape everything else as JSON `\u` sequences
fn header_json(value: &serde_json::Value) -> String {
    let mut out = String::new();
    let mut buf = [0u16; 2];
    for c in value.to_string().chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            for unit in c.encode_utf16(&mut buf) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

fn is_not_found(body: &str) -> bool {
    serde_json::from_str::<ApiError>(body)
        .map(|e| e.error_summary.contains("not_found"))
        .unwrap_or(false)
}

impl TargetProvider for DropboxTarget {
    fn save(&mut self, bucket: &str, files: &[PathBuf]) -> Vec<PathBuf> {
        let folder = self.bucket_path(bucket);
        let base = self.base.clone();

        base.save_each(bucket, files, |file, name| {
            self.upload(file, &format!("{}/{}", folder, name))
        })
    }

    fn delete_bucket(&mut self, bucket: &str) -> Result<()> {
        let path = self.bucket_path(bucket);
        let response = self.api_call("files/delete_v2", json!({ "path": path }))?;

        let status = response.status();
        if status.is_success() {
            self.base.info(format!("Deleted {}", bucket));
            return Ok(());
        }

        let body = response.text().unwrap_or_default();
        if status == StatusCode::CONFLICT && is_not_found(&body) {
            return Ok(());
        }
        anyhow::bail!("delete of {} returned {}: {}", path, status, body)
    }

    fn list_buckets(&mut self) -> Result<Vec<String>> {
        let response = self.api_call(
            "files/list_folder",
            json!({ "path": self.list_root(), "recursive": false }),
        )?;

        if response.status() == StatusCode::CONFLICT {
            let body = response.text().unwrap_or_default();
            if is_not_found(&body) {
                return Ok(Vec::new());
            }
            anyhow::bail!("list_folder returned 409: {}", body);
        }

        let mut page: ListFolder = check(response, "files/list_folder")?.json()?;
        let mut buckets = Vec::new();
        loop {
            buckets.extend(
                page.entries
                    .into_iter()
                    .filter(|e| e.tag == "folder")
                    .map(|e| e.name),
            );
            if !page.has_more {
                break;
            }
            let response =
                self.api_call("files/list_folder/continue", json!({ "cursor": page.cursor }))?;
            page = check(response, "files/list_folder/continue")?.json()?;
        }

        buckets.sort();
        Ok(buckets)
    }

    fn dispose(&mut self) {
        self.client = None;
    }
}
