//! The signed-in traveller.
//!
//! [`ProfileHolder`] owns the active [`UserProfile`] for a client session and
//! remembers the active user id in the [`ProfileStore`] so the next launch
//! can resume it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use aura::account::ProfileHolder;
//! use aura::config::AuraConfig;
//! use aura::dispatch::ConnectivityDispatcher;
//! use aura::remote::HttpGateway;
//! use aura::store::open_store;
//!
//! # async fn run() -> aura::Result<()> {
//! let config = AuraConfig::default();
//! let store = open_store(&config.storage)?;
//! let gateway = Arc::new(HttpGateway::new(&config.backend)?);
//! let dispatcher = Arc::new(ConnectivityDispatcher::new(
//!     gateway,
//!     store,
//!     config.connectivity.mode,
//!     config.profile_defaults.clone(),
//! ));
//!
//! let mut holder = ProfileHolder::new(dispatcher);
//! if holder.resume().await?.is_none() {
//!     holder.create_profile("Jane", "jane@example.com").await?;
//! }
//! assert!(holder.needs_onboarding());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tracing::{info, warn};

use crate::dispatch::{ConnectivityDispatcher, Origin};
use crate::error::{AuraError, Result};
use crate::profile::{ProfilePatch, UserProfile};

/// Session-level owner of the active profile.
pub struct ProfileHolder {
    dispatcher: Arc<ConnectivityDispatcher>,
    profile: Option<UserProfile>,
    unsynced: bool,
}

impl ProfileHolder {
    pub fn new(dispatcher: Arc<ConnectivityDispatcher>) -> Self {
        Self {
            dispatcher,
            profile: None,
            unsynced: false,
        }
    }

    pub fn dispatcher(&self) -> &Arc<ConnectivityDispatcher> {
        &self.dispatcher
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    /// `true` when the held profile reflects changes the backend has not
    /// confirmed.
    pub fn is_unsynced(&self) -> bool {
        self.unsynced
    }

    /// `true` when a profile exists but onboarding has not been completed.
    #[must_use]
    pub fn needs_onboarding(&self) -> bool {
        self.profile.as_ref().is_some_and(|p| !p.onboarding_completed)
    }

    /// Restore the previous session's traveller, if any.
    ///
    /// A remembered id that neither the backend nor the local cache knows
    /// resets the session (see [`logout`](Self::logout)) and yields `None`.
    pub async fn resume(&mut self) -> Result<Option<&UserProfile>> {
        self.dispatcher.probe().await;

        let Some(user_id) = self.dispatcher.store().active_user_id().await? else {
            return Ok(None);
        };
        match self.dispatcher.fetch_profile(&user_id).await {
            Ok(synced) => {
                info!(user_id = user_id.as_str(), origin = ?synced.origin, "session resumed");
                self.unsynced = synced.origin == Origin::Local;
                self.profile = Some(synced.value);
                Ok(self.profile.as_ref())
            }
            Err(AuraError::NotFound(_)) => {
                warn!(user_id = user_id.as_str(), "remembered profile is gone; logging out");
                self.logout().await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Register a new traveller and make them the active user.
    ///
    /// # Errors
    ///
    /// Blank `name` or `email` is rejected as [`AuraError::Validation`]
    /// before any network attempt.
    pub async fn create_profile(&mut self, name: &str, email: &str) -> Result<&UserProfile> {
        let synced = self.dispatcher.create_profile(name, email).await?;
        let profile = synced.value;
        self.dispatcher
            .store()
            .set_active_user_id(&profile.user_id)
            .await?;
        self.unsynced = synced.origin == Origin::Local;
        Ok(&*self.profile.insert(profile))
    }

    /// Apply a partial update to the held profile.
    pub async fn update_profile(&mut self, patch: ProfilePatch) -> Result<&UserProfile> {
        let user_id = self
            .profile
            .as_ref()
            .map(|p| p.user_id.clone())
            .ok_or_else(|| AuraError::Validation("no active profile to update".into()))?;

        let synced = self.dispatcher.update_profile(&user_id, &patch).await?;
        self.unsynced = synced.origin == Origin::Local;
        Ok(&*self.profile.insert(synced.value))
    }

    /// Save the onboarding answers and mark the profile complete.
    pub async fn complete_onboarding(&mut self, patch: ProfilePatch) -> Result<&UserProfile> {
        let patch = patch.onboarding_completed(true).profile_complete(true);
        let profile = self.update_profile(patch).await?;
        info!(user_id = profile.user_id.as_str(), "onboarding completed");
        Ok(profile)
    }

    /// Forget the active traveller.
    pub async fn logout(&mut self) -> Result<()> {
        self.dispatcher.store().clear_active_user_id().await?;
        self.profile = None;
        self.unsynced = false;
        Ok(())
    }
}
