//! Typed operations over the game's REST control surface (C4).
//!
//! Five operations (`health_check`, `announce`, `save`, `shutdown`, `stop`),
//! basic-or-token auth, a per-call timeout defaulting to 10s, and "any
//! transport or non-2xx response is an API error" (`ApiError`).

use std::time::Duration;

use serde::Serialize;
use serde_json::json;

use crate::config::Auth;
use crate::error::ApiError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ServerApiClient {
    base_url: String,
    auth: Auth,
    http: reqwest::blocking::Client,
}

impl ServerApiClient {
    pub fn new(base_url: String, auth: Auth) -> Self {
        ServerApiClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            http: reqwest::blocking::Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("build REST control client"),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    fn get(&self, endpoint: &str) -> Result<reqwest::blocking::Response, ApiError> {
        let mut request = self.http.get(self.url(endpoint));
        request = apply_auth(request, &self.auth);
        request.send().map_err(|source| ApiError::Get {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    fn post(&self, endpoint: &str, body: impl Serialize) -> Result<(), ApiError> {
        let mut request = self.http.post(self.url(endpoint)).json(&body);
        request = apply_auth(request, &self.auth);
        let response = request.send().map_err(|source| ApiError::Post {
            endpoint: endpoint.to_string(),
            source,
        })?;
        if !response.status().is_success() {
            return Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    /// `GET /v1/api/info`. Returns `true` iff the server responded with a
    /// success status; any transport or non-2xx failure is treated as
    /// unhealthy rather than propagated.
    pub fn health_check(&self) -> bool {
        match self.get("/v1/api/info") {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// `POST /v1/api/announce {message}`.
    pub fn announce(&self, message: &str) -> Result<(), ApiError> {
        self.post("/v1/api/announce", json!({ "message": message }))
    }

    /// `POST /v1/api/save {}`.
    pub fn save(&self) -> Result<(), ApiError> {
        self.post("/v1/api/save", json!({}))
    }

    /// `POST /v1/api/shutdown {waittime, message}`.
    pub fn shutdown(&self, message: &str, delay_seconds: u32) -> Result<(), ApiError> {
        self.post(
            "/v1/api/shutdown",
            json!({ "waittime": delay_seconds, "message": message }),
        )
    }

    /// `POST /v1/api/stop {}`.
    pub fn stop(&self) -> Result<(), ApiError> {
        self.post("/v1/api/stop", json!({}))
    }
}

fn apply_auth(
    request: reqwest::blocking::RequestBuilder,
    auth: &Auth,
) -> reqwest::blocking::RequestBuilder {
    match auth {
        Auth::Basic { username, password } => request.basic_auth(username, Some(password)),
        Auth::Token { token } => request.bearer_auth(token),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_and_endpoint_exactly_once() {
        let client = ServerApiClient::new(
            "http://localhost:8212/".to_string(),
            Auth::Token { token: "x".to_string() },
        );
        assert_eq!(client.url("/v1/api/info"), "http://localhost:8212/v1/api/info");
        assert_eq!(client.url("v1/api/save"), "http://localhost:8212/v1/api/save");
    }

    #[test]
    fn health_check_on_unreachable_host_is_false() {
        let client = ServerApiClient::new(
            "http://127.0.0.1:1".to_string(),
            Auth::Basic {
                username: "a".to_string(),
                password: "b".to_string(),
            },
        );
        assert!(!client.health_check());
    }
}
