//! Jira REST v2 client over `reqwest::blocking` with Basic auth.

use super::{IssueTracker, SearchQuery, body_excerpt, json_body};
use crate::config::{JiraSettings, require};
use crate::error::{Result, XportError};
use crate::model::is_issue_key;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub struct JiraClient {
    http: Client,
    base_url: String,
    email: String,
    token: String,
}

impl JiraClient {
    /// Build a client from resolved settings.
    ///
    /// # Errors
    ///
    /// Returns `MissingSetting` for an absent url, email or token, or a
    /// transport error if the HTTP client cannot be built.
    pub fn from_settings(settings: &JiraSettings, timeout: Duration) -> Result<Self> {
        let base_url = require(settings.url.as_ref(), "jira.url")?;
        let email = require(settings.email.as_ref(), "jira.email")?;
        let token = require(settings.token.as_ref(), "jira.token")?;
        Self::new(base_url, email, token, timeout)
    }

    /// # Errors
    ///
    /// Returns a transport error if the HTTP client cannot be built.
    pub fn new(base_url: &str, email: &str, token: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            email: email.to_string(),
            token: token.to_string(),
        })
    }

    fn get(&self, url: &str) -> reqwest::blocking::RequestBuilder {
        self.http
            .get(url)
            .basic_auth(&self.email, Some(&self.token))
            .header("Accept", "application/json")
    }
}

impl IssueTracker for JiraClient {
    fn search(&self, query: &SearchQuery) -> Result<Vec<Value>> {
        let url = format!("{}/rest/api/2/search", self.base_url);
        debug!(jql = %query.jql, "Jira search");

        let fields = query.fields.join(",");
        let max_results = query.max_results.to_string();
        let response = self
            .get(&url)
            .query(&[
                ("jql", query.jql.as_str()),
                ("fields", fields.as_str()),
                ("maxResults", max_results.as_str()),
            ])
            .send()?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(XportError::Auth {
                service: "Jira".to_string(),
                status: status.as_u16(),
                body: body_excerpt(&response.text().unwrap_or_default()),
            });
        }
        if status != StatusCode::OK {
            return Err(XportError::Http {
                status: status.as_u16(),
                url,
                body: body_excerpt(&response.text().unwrap_or_default()),
            });
        }

        let body = json_body(response, &url)?;
        match body.get("issues") {
            Some(Value::Array(issues)) => Ok(issues.clone()),
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(_) => Err(XportError::UnexpectedResponse {
                url,
                reason: "'issues' is not an array".to_string(),
            }),
        }
    }

    fn issue_exists(&self, key: &str) -> Result<bool> {
        // The key becomes a path segment.
        if !is_issue_key(key) {
            return Ok(false);
        }
        let url = format!("{}/rest/api/2/issue/{key}", self.base_url);
        let response = self.get(&url).query(&[("fields", "key")]).send()?;
        debug!(key, status = response.status().as_u16(), "Jira issue check");
        Ok(response.status() == StatusCode::OK)
    }

    fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{key}", self.base_url)
    }
}
