//! HTTP/JSON implementation of [`RemoteGateway`] on `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::{ChatTurnRequest, ChatTurnResponse, RemoteGateway};
use crate::config::BackendConfig;
use crate::error::{AuraError, Result};
use crate::profile::{ProfilePatch, UserProfile};

#[derive(Debug, Deserialize)]
struct ProfileEnvelope {
    profile: UserProfile,
}

/// Gateway talking to the backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGateway {
    /// Build a gateway with the request/connect timeouts from config.
    ///
    /// # Errors
    ///
    /// Returns [`AuraError::Config`] if the HTTP client cannot be constructed.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(concat!("aura/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AuraError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn user_url(&self, user_id: &str) -> String {
        self.url(&format!("/users/{}", urlencoding::encode(user_id)))
    }

    /// Send a request and decode its JSON body.
    ///
    /// `missing` names the resource reported as `NotFound` on a 404; without
    /// it a 404 is just another unusable status.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &str,
        missing: Option<&str>,
    ) -> Result<T> {
        let response = request.send().await.map_err(|e| {
            AuraError::RemoteUnavailable(format!("{operation}: request failed: {e}"))
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND
            && let Some(resource) = missing
        {
            return Err(AuraError::NotFound(format!("{resource} not found on backend")));
        }
        if !status.is_success() {
            return Err(AuraError::RemoteUnavailable(format!(
                "{operation}: backend returned HTTP {status}"
            )));
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("application/json"));
        if !is_json {
            return Err(AuraError::RemoteUnavailable(format!(
                "{operation}: response is not JSON"
            )));
        }

        response.json::<T>().await.map_err(|e| {
            AuraError::RemoteUnavailable(format!("{operation}: malformed response body: {e}"))
        })
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn ping(&self) -> bool {
        let url = self.url("/agent/info");
        match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(url = url.as_str(), "backend reachable");
                true
            }
            Ok(resp) => {
                warn!(url = url.as_str(), status = %resp.status(), "backend responded with error");
                false
            }
            Err(e) => {
                warn!(url = url.as_str(), error = %e, "backend connection failed");
                false
            }
        }
    }

    async fn create_profile(&self, name: &str, email: &str) -> Result<UserProfile> {
        let body = serde_json::json!({
            "basic_info": {
                "name": name,
                "email": email,
                "nationality": "",
                "home_location": "",
            }
        });
        debug!("POST /users");
        let envelope: ProfileEnvelope = self
            .send_json(
                self.client.post(self.url("/users")).json(&body),
                "create profile",
                None,
            )
            .await?;
        Ok(envelope.profile)
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<UserProfile> {
        debug!(user_id, "GET /users/{{id}}");
        let envelope: ProfileEnvelope = self
            .send_json(
                self.client.get(self.user_url(user_id)),
                "fetch profile",
                Some(user_id),
            )
            .await?;
        Ok(envelope.profile)
    }

    async fn update_profile(&self, user_id: &str, patch: &ProfilePatch) -> Result<UserProfile> {
        debug!(user_id, "PUT /users/{{id}}");
        let envelope: ProfileEnvelope = self
            .send_json(
                self.client.put(self.user_url(user_id)).json(patch),
                "update profile",
                Some(user_id),
            )
            .await?;
        Ok(envelope.profile)
    }

    async fn send_chat_turn(&self, request: &ChatTurnRequest) -> Result<ChatTurnResponse> {
        debug!(session_id = request.session_id.as_str(), "POST /chat");
        self.send_json(self.client.post(self.url("/chat")).json(request), "chat", None)
            .await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn gateway(base_url: &str) -> HttpGateway {
        HttpGateway::new(&BackendConfig {
            base_url: base_url.to_owned(),
            ..BackendConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let g = gateway("http://localhost:8080/");
        assert_eq!(g.base_url(), "http://localhost:8080");
        assert_eq!(g.url("/chat"), "http://localhost:8080/chat");
    }

    #[test]
    fn user_ids_are_percent_encoded() {
        let g = gateway("http://localhost:8080");
        assert_eq!(
            g.user_url("jane doe?x"),
            "http://localhost:8080/users/jane%20doe%3Fx"
        );
    }

    #[tokio::test]
    async fn unreachable_backend_is_remote_unavailable() {
        // Port 9 (discard) on localhost is closed in test environments.
        let g = gateway("http://127.0.0.1:9");
        let err = g.fetch_profile("u1").await.unwrap_err();
        assert!(matches!(err, AuraError::RemoteUnavailable(_)));
        assert!(!g.ping().await);
    }
}
