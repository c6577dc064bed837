//! Remote-first dispatch with local fallback.
//!
//! [`ConnectivityDispatcher`] routes every profile and chat operation either
//! to the backend or to the local cache, depending on the configured
//! [`ConnectivityMode`] and on whether the remote attempt succeeded.
//!
//! # Policy
//!
//! - **`LocalOnly`**: the backend is never contacted.
//! - **`Auto`**: the backend is tried exactly once. `RemoteUnavailable` or
//!   `NotFound` switches to the local path; any other error propagates.
//! - **`RemoteOnly`**: backend errors propagate unchanged.
//!
//! Results carry an [`Origin`] so callers can tell a remote-confirmed value
//! from one that only exists locally. Remote-confirmed profiles are written
//! through to the local store so a later fallback sees them, unless the
//! cached record is newer: an offline edit the backend has not seen is kept
//! and returned as [`Origin::Local`] instead of being overwritten.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::{ConnectivityMode, ProfileDefaults};
use crate::error::{AuraError, Result};
use crate::profile::{ProfilePatch, UserProfile, merge};
use crate::remote::{ChatTurnRequest, ChatTurnResponse, RemoteGateway, UserContext};
use crate::store::ProfileStore;

/// Name used in local replies when no profile is available.
const FALLBACK_USER_NAME: &str = "User";

/// Where a returned value was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Confirmed by the backend.
    Remote,
    /// Produced by the local fallback; not yet known to the backend.
    Local,
}

/// A value tagged with its [`Origin`].
#[derive(Debug, Clone, PartialEq)]
pub struct Synced<T> {
    pub value: T,
    pub origin: Origin,
}

impl<T> Synced<T> {
    fn remote(value: T) -> Self {
        Self {
            value,
            origin: Origin::Remote,
        }
    }

    fn local(value: T) -> Self {
        Self {
            value,
            origin: Origin::Local,
        }
    }

    pub fn is_remote(&self) -> bool {
        self.origin == Origin::Remote
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// One conversational turn, as seen by a chat session.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn chat(
        &self,
        message: &str,
        session_id: &str,
        user_id: Option<&str>,
    ) -> Result<ChatTurnResponse>;
}

/// Routes operations between the backend and the local profile cache.
pub struct ConnectivityDispatcher {
    gateway: Arc<dyn RemoteGateway>,
    store: Arc<dyn ProfileStore>,
    defaults: ProfileDefaults,
    mode: AtomicU8,
}

impl ConnectivityDispatcher {
    pub fn new(
        gateway: Arc<dyn RemoteGateway>,
        store: Arc<dyn ProfileStore>,
        mode: ConnectivityMode,
        defaults: ProfileDefaults,
    ) -> Self {
        Self {
            gateway,
            store,
            defaults,
            mode: AtomicU8::new(mode_to_u8(mode)),
        }
    }

    pub fn mode(&self) -> ConnectivityMode {
        mode_from_u8(self.mode.load(Ordering::Relaxed))
    }

    /// Switch modes at runtime, e.g. when the host learns the network is down.
    pub fn set_mode(&self, mode: ConnectivityMode) {
        let previous = mode_from_u8(self.mode.swap(mode_to_u8(mode), Ordering::Relaxed));
        if previous != mode {
            info!(from = ?previous, to = ?mode, "connectivity mode changed");
        }
    }

    pub fn store(&self) -> &Arc<dyn ProfileStore> {
        &self.store
    }

    /// Probe the backend. Diagnostic only: the mode is left untouched.
    pub async fn probe(&self) -> bool {
        let reachable = self.gateway.ping().await;
        if reachable {
            info!("backend probe succeeded");
        } else {
            warn!("backend probe failed; profile and chat operations will use the local fallback");
        }
        reachable
    }

    /// Create a profile for a new traveller.
    ///
    /// # Errors
    ///
    /// Returns [`AuraError::Validation`] for a blank name or email, before any
    /// network attempt.
    pub async fn create_profile(&self, name: &str, email: &str) -> Result<Synced<UserProfile>> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() || email.is_empty() {
            return Err(AuraError::Validation(
                "name and email are required to create a profile".into(),
            ));
        }

        if self.remote_enabled("create_profile") {
            match self.gateway.create_profile(name, email).await {
                Ok(profile) => {
                    info!(user_id = profile.user_id.as_str(), "profile created on backend");
                    return Ok(self.reconcile(profile).await);
                }
                Err(e) if self.falls_back("create_profile", &e) => {}
                Err(e) => return Err(e),
            }
        }

        let user_id = format!("user-{}", uuid::Uuid::new_v4());
        let profile = UserProfile::new(&user_id, name, email, &self.defaults, Utc::now());
        self.store.put(&user_id, &profile).await?;
        info!(user_id = user_id.as_str(), "profile created locally");
        Ok(Synced::local(profile))
    }

    pub async fn fetch_profile(&self, user_id: &str) -> Result<Synced<UserProfile>> {
        if self.remote_enabled("fetch_profile") {
            match self.gateway.fetch_profile(user_id).await {
                Ok(profile) => return Ok(self.reconcile(profile).await),
                Err(e) if self.falls_back("fetch_profile", &e) => {}
                Err(e) => return Err(e),
            }
        }

        let profile = self.store.get(user_id).await?;
        debug!(user_id, "profile served from local cache");
        Ok(Synced::local(profile))
    }

    /// Apply a partial update. The returned profile is the merged record.
    pub async fn update_profile(
        &self,
        user_id: &str,
        patch: &ProfilePatch,
    ) -> Result<Synced<UserProfile>> {
        if self.remote_enabled("update_profile") {
            match self.gateway.update_profile(user_id, patch).await {
                Ok(profile) => return Ok(self.reconcile(profile).await),
                Err(e) if self.falls_back("update_profile", &e) => {}
                Err(e) => return Err(e),
            }
        }

        let base = self.store.get(user_id).await?;
        let merged = merge(&base, patch);
        self.store.put(user_id, &merged).await?;
        info!(user_id, "profile updated locally");
        Ok(Synced::local(merged))
    }

    /// Relay one chat turn. The local path always produces a reply.
    pub async fn chat(
        &self,
        message: &str,
        session_id: &str,
        user_id: Option<&str>,
    ) -> Result<Synced<ChatTurnResponse>> {
        if self.remote_enabled("chat") {
            let request = ChatTurnRequest {
                message: message.to_owned(),
                session_id: session_id.to_owned(),
                user_id: user_id.map(str::to_owned),
            };
            match self.gateway.send_chat_turn(&request).await {
                Ok(response) => return Ok(Synced::remote(response)),
                Err(e) if self.falls_back("chat", &e) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(Synced::local(self.local_reply(message, session_id, user_id).await))
    }

    async fn local_reply(
        &self,
        message: &str,
        session_id: &str,
        user_id: Option<&str>,
    ) -> ChatTurnResponse {
        let profile = match user_id {
            Some(id) => match self.store.get(id).await {
                Ok(profile) => Some(profile),
                Err(e) => {
                    debug!(user_id = id, error = %e, "no local profile for chat context");
                    None
                }
            },
            None => None,
        };

        let (response, user_name) = match &profile {
            Some(p) => (
                format!(
                    "Hello {name}! I've received your message: \"{message}\". I am taking your \
                     accessibility needs and travel preferences into account while I find the \
                     perfect options for you.",
                    name = p.display_name()
                ),
                p.display_name().to_owned(),
            ),
            None => (
                format!("I have received your message: \"{message}\". I am processing your request."),
                FALLBACK_USER_NAME.to_owned(),
            ),
        };

        ChatTurnResponse {
            response,
            session_id: session_id.to_owned(),
            events: Vec::new(),
            user_context: Some(UserContext {
                user_id: user_id.unwrap_or_default().to_owned(),
                context_injected: user_id.is_some(),
                user_name,
                accessibility_needs: true,
            }),
        }
    }

    fn remote_enabled(&self, operation: &str) -> bool {
        let enabled = self.mode() != ConnectivityMode::LocalOnly;
        if !enabled {
            debug!(operation, "local-only mode; skipping backend");
        }
        enabled
    }

    fn falls_back(&self, operation: &str, error: &AuraError) -> bool {
        let fall_back = self.mode() == ConnectivityMode::Auto && error.is_fallback_trigger();
        if fall_back {
            warn!(operation, error = %error, "backend call failed, falling back to local");
        }
        fall_back
    }

    /// Cache a remote-confirmed profile, unless the local copy is newer.
    async fn reconcile(&self, remote: UserProfile) -> Synced<UserProfile> {
        if let Ok(cached) = self.store.get(&remote.user_id).await
            && cached.updated_at > remote.updated_at
        {
            warn!(
                user_id = remote.user_id.as_str(),
                local = %cached.updated_at,
                remote = %remote.updated_at,
                "local profile has edits the backend has not seen; keeping local copy"
            );
            return Synced::local(cached);
        }
        if let Err(e) = self.store.put(&remote.user_id, &remote).await {
            warn!(
                user_id = remote.user_id.as_str(),
                error = %e,
                "failed to cache remote profile locally"
            );
        }
        Synced::remote(remote)
    }
}

#[async_trait]
impl ChatService for ConnectivityDispatcher {
    async fn chat(
        &self,
        message: &str,
        session_id: &str,
        user_id: Option<&str>,
    ) -> Result<ChatTurnResponse> {
        ConnectivityDispatcher::chat(self, message, session_id, user_id)
            .await
            .map(Synced::into_value)
    }
}

fn mode_to_u8(mode: ConnectivityMode) -> u8 {
    match mode {
        ConnectivityMode::Auto => 0,
        ConnectivityMode::LocalOnly => 1,
        ConnectivityMode::RemoteOnly => 2,
    }
}

fn mode_from_u8(raw: u8) -> ConnectivityMode {
    match raw {
        1 => ConnectivityMode::LocalOnly,
        2 => ConnectivityMode::RemoteOnly,
        _ => ConnectivityMode::Auto,
    }
}
