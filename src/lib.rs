//! Aura: connectivity-aware client engine for an accessible-travel assistant.
//!
//! The crate keeps a traveller's profile usable whether or not the backend
//! is reachable, relays chat turns, and coordinates voice input and output:
//!
//! - **Store**: local key-value cache of profile snapshots ([`store`])
//! - **Merge**: partial-update policy shared by every offline write ([`profile`])
//! - **Remote**: HTTP/JSON access to the travel-agent backend ([`remote`])
//! - **Dispatch**: remote-first routing with local fallback ([`dispatch`])
//! - **Speech**: listen/speak state machine over a platform engine ([`speech`])
//! - **Session**: conversation log, busy flag and error surface ([`session`])
//! - **Account**: the signed-in traveller and onboarding ([`account`])

pub mod account;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod profile;
pub mod remote;
pub mod session;
pub mod speech;
pub mod store;
pub mod testing;

pub use account::ProfileHolder;
pub use config::{AuraConfig, ConnectivityMode};
pub use dispatch::{ChatService, ConnectivityDispatcher, Origin, Synced};
pub use error::{AuraError, Result};
pub use profile::{ProfilePatch, UserProfile};
pub use remote::{HttpGateway, RemoteGateway};
pub use session::{ConversationSession, SessionContext, SubmitOutcome};
pub use speech::{SpeechBackend, SpeechCoordinator, SpeechEvent, SpeechState};
pub use store::{ProfileStore, open_store};
