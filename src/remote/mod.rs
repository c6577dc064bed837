//! Backend access.
//!
//! [`RemoteGateway`] is the contract for the five backend operations. It
//! signals every transport, status or decoding problem as
//! [`AuraError::RemoteUnavailable`](crate::error::AuraError::RemoteUnavailable)
//! (404 on a user resource as `NotFound`) and never retries: deciding what
//! to do about a failure belongs to the
//! [`ConnectivityDispatcher`](crate::dispatch::ConnectivityDispatcher).

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::profile::{ProfilePatch, UserProfile};

pub use http::HttpGateway;

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurnRequest {
    pub message: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Echo of the profile context the backend used for a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub context_injected: bool,
    pub user_name: String,
    pub accessibility_needs: bool,
}

/// Reply to one chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurnResponse {
    pub response: String,
    pub session_id: String,
    /// Backend agent events; carried through untouched.
    #[serde(default)]
    pub events: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_context: Option<UserContext>,
}

/// The travel-agent backend.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Connectivity probe (`GET /agent/info`). Diagnostic only.
    async fn ping(&self) -> bool;

    /// Create a profile; the backend assigns the id, timestamps and defaults.
    async fn create_profile(&self, name: &str, email: &str) -> Result<UserProfile>;

    async fn fetch_profile(&self, user_id: &str) -> Result<UserProfile>;

    /// Send a partial update; the backend returns the merged record.
    async fn update_profile(&self, user_id: &str, patch: &ProfilePatch) -> Result<UserProfile>;

    async fn send_chat_turn(&self, request: &ChatTurnRequest) -> Result<ChatTurnResponse>;
}
