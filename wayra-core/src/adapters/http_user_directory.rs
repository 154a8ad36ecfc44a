//! Wayra user service HTTP client
//!
//! Talks to the local Wayra server:
//! - `POST /create {username, password}` answers 201 with the user record
//! - `GET /find?username=&password=` answers 200 with the user record

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;

use crate::domain::result::{Error, Result};
use crate::domain::UserConfig;
use crate::ports::UserDirectory;

/// Default request timeout for the user service
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking HTTP client for the Wayra user service
#[derive(Debug)]
pub struct HttpUserDirectory {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpUserDirectory {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::validation(format!(
                "User service URL must start with http:// or https://, got '{}'",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::UserService {
                status: None,
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_request_error(&self, error: reqwest::Error) -> Error {
        let message = if error.is_timeout() {
            format!("Request timed out after {} seconds", self.timeout.as_secs())
        } else if error.is_connect() {
            format!("Unable to connect to the user service at {}", self.base_url)
        } else {
            format!("Request failed: {}", error)
        };
        Error::UserService {
            status: None,
            message,
        }
    }

    /// Accept only `expected`, otherwise surface the service's own message
    fn read_user(&self, response: Response, expected: StatusCode, action: &str) -> Result<UserConfig> {
        let status = response.status();
        if status != expected {
            let body = response.text().unwrap_or_default();
            return Err(Error::UserService {
                status: Some(status.as_u16()),
                message: format!("{} failed: {}", action, error_message(&body)),
            });
        }

        response.json::<UserConfig>().map_err(|e| Error::UserService {
            status: Some(status.as_u16()),
            message: format!("{} returned an invalid user record: {}", action, e),
        })
    }
}

/// Pull `error` out of a JSON body, falling back to the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

impl UserDirectory for HttpUserDirectory {
    fn create_user(&self, username: &str, password: &str) -> Result<UserConfig> {
        let url = format!("{}/create", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .map_err(|e| self.map_request_error(e))?;

        self.read_user(response, StatusCode::CREATED, "User creation")
    }

    fn find_user(&self, username: &str, password: &str) -> Result<UserConfig> {
        let url = format!("{}/find", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("username", username), ("password", password)])
            .send()
            .map_err(|e| self.map_request_error(e))?;

        self.read_user(response, StatusCode::OK, "Authentication")
    }
}
