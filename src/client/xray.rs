//! Xray Cloud REST client over `reqwest::blocking`.
//!
//! The bearer token is requested on first use and reused for the lifetime
//! of the client.

use super::{
    AttachmentStatus, BackupArchive, BackupJobStatus, BackupRequest, ImportStatus, TestTracker,
    body_excerpt, json_body,
};
use crate::config::{XraySettings, require};
use crate::error::{Result, XportError};
use crate::model::{ExportedTest, normalize_id};
use reqwest::StatusCode;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde_json::{Value, json};
use std::io::Write;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info};

pub struct XrayClient {
    http: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    token: OnceLock<String>,
}

impl XrayClient {
    /// Build a client from resolved settings.
    ///
    /// # Errors
    ///
    /// Returns `MissingSetting` for an absent url, client id or secret, or a
    /// transport error if the HTTP client cannot be built.
    pub fn from_settings(settings: &XraySettings, timeout: Duration) -> Result<Self> {
        let base_url = require(settings.url.as_ref(), "xray.url")?;
        let client_id = require(settings.client_id.as_ref(), "xray.client-id")?;
        let client_secret = require(settings.client_secret.as_ref(), "xray.client-secret")?;
        Self::new(base_url, client_id, client_secret, timeout)
    }

    /// # Errors
    ///
    /// Returns a transport error if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        client_id: &str,
        client_secret: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token: OnceLock::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn token(&self) -> Result<&str> {
        if let Some(token) = self.token.get() {
            return Ok(token.as_str());
        }

        let url = self.url("/api/v2/authenticate");
        let response = self
            .http
            .post(&url)
            .json(&json!({
                "client_id": self.client_id,
                "client_secret": self.client_secret,
            }))
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if status != StatusCode::OK {
            return Err(XportError::Auth {
                service: "Xray".to_string(),
                status: status.as_u16(),
                body: body_excerpt(&body),
            });
        }

        let token = body.trim().trim_matches('"').to_string();
        if token.is_empty() {
            return Err(XportError::UnexpectedResponse {
                url,
                reason: "empty token".to_string(),
            });
        }
        info!("Authenticated with Xray");
        Ok(self.token.get_or_init(|| token).as_str())
    }

    fn authed(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        Ok(builder.bearer_auth(self.token()?))
    }

    fn expect_ok(response: Response, url: &str) -> Result<Response> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(XportError::Auth {
                service: "Xray".to_string(),
                status: status.as_u16(),
                body: body_excerpt(&response.text().unwrap_or_default()),
            });
        }
        if !status.is_success() {
            return Err(XportError::Http {
                status: status.as_u16(),
                url: url.to_string(),
                body: body_excerpt(&response.text().unwrap_or_default()),
            });
        }
        Ok(response)
    }
}

fn job_id(body: &Value) -> Option<String> {
    body.get("jobId").and_then(normalize_id)
}

impl TestTracker for XrayClient {
    fn start_backup(&self, request: &BackupRequest) -> Result<Option<String>> {
        let url = self.url("/api/v2/backup");
        let response = self.authed(self.http.post(&url))?.json(request).send()?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(XportError::Auth {
                service: "Xray".to_string(),
                status: status.as_u16(),
                body: body_excerpt(&response.text().unwrap_or_default()),
            });
        }

        let text = response.text()?;
        debug!(status = status.as_u16(), body = %body_excerpt(&text), "Backup trigger answered");
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        Ok(job_id(&body))
    }

    fn backup_status(&self, job_id: &str) -> Result<BackupJobStatus> {
        let url = self.url(&format!("/api/v2/backup/{job_id}/status"));
        let response = self.authed(self.http.get(&url))?.send()?;
        let body = json_body(Self::expect_ok(response, &url)?, &url)?;

        let status = body
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let progress = body.get("progressValue").map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
        Ok(BackupJobStatus { status, progress })
    }

    fn download_backup(&self, archive: BackupArchive, dest: &mut dyn Write) -> Result<u64> {
        let url = self.url(archive.path());
        let response = self.authed(self.http.get(&url))?.send()?;
        let mut response = Self::expect_ok(response, &url)?;
        let written = response.copy_to(dest)?;
        Ok(written)
    }

    fn attachment_status(&self, attachment_id: &str) -> Result<AttachmentStatus> {
        let url = self.url(&format!("/api/v2/attachments/{attachment_id}"));
        let response = self.authed(self.http.get(&url))?.send()?;
        Ok(match response.status() {
            StatusCode::OK => AttachmentStatus::Present,
            StatusCode::UNAUTHORIZED => AttachmentStatus::Unauthorized,
            other => AttachmentStatus::Missing(other.as_u16()),
        })
    }

    fn upload_attachment(&self, filename: &str, content: Vec<u8>) -> Result<String> {
        let url = self.url("/api/v1/attachments");
        let form = Form::new().part(
            "attachment",
            Part::bytes(content).file_name(filename.to_string()),
        );
        let response = self.authed(self.http.post(&url))?.multipart(form).send()?;
        if response.status() != StatusCode::OK {
            return Err(XportError::Http {
                status: response.status().as_u16(),
                url,
                body: body_excerpt(&response.text().unwrap_or_default()),
            });
        }
        let body = json_body(response, &url)?;
        body.get("id")
            .and_then(normalize_id)
            .ok_or_else(|| XportError::UnexpectedResponse {
                url,
                reason: "attachment upload returned no id".to_string(),
            })
    }

    fn submit_bulk_import(&self, tests: &[ExportedTest]) -> Result<String> {
        let url = self.url("/api/v2/import/test/bulk");
        let response = self.authed(self.http.post(&url))?.json(tests).send()?;
        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::ACCEPTED {
            return Err(XportError::Http {
                status: status.as_u16(),
                url,
                body: body_excerpt(&response.text().unwrap_or_default()),
            });
        }
        let body = json_body(response, &url)?;
        job_id(&body).ok_or_else(|| XportError::MissingJobId {
            operation: "bulk import".to_string(),
        })
    }

    fn import_status(&self, job_id: &str) -> Result<ImportStatus> {
        let url = self.url(&format!("/api/v2/import/test/bulk/{job_id}/status"));
        let response = self.authed(self.http.get(&url))?.send()?;
        if response.status() != StatusCode::OK {
            return Ok(ImportStatus::NotResponding(response.status().as_u16()));
        }
        Ok(ImportStatus::Reported(json_body(response, &url)?))
    }
}
