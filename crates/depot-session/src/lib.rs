#![allow(clippy::pedantic)]
#![allow(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![allow(clippy::missing_errors_doc)]

//! Client-side session and trust-context management for the depot API.
//!
//! The [`SessionManager`] owns the current [`Session`], attaches bearer tokens
//! to outbound calls, refreshes expired credentials with at most one exchange
//! in flight, and merges assertions from an external identity proxy.

pub mod api;
pub mod config;
pub mod credential;
pub mod error;
pub mod guard;
pub mod manager;
pub mod pipeline;
pub mod reconcile;
pub mod refresh;
pub mod state;
pub mod storage;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{AuthApi, HttpAuthApi};
pub use config::ClientConfig;
pub use credential::CertificateInfo;
pub use error::{RefreshFailed, SessionError, StorageError};
pub use guard::{GuardDecision, RouteGuard};
pub use manager::SessionManager;
pub use pipeline::{ApiRequest, Pipeline};
pub use reconcile::{merge_assertion, ReconcileOutcome, Reconciler};
pub use refresh::RefreshCoordinator;
pub use state::{SessionEvent, SessionMachine, SessionNotice, SessionPhase};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
pub use store::TokenStore;
pub use types::{AuthResponse, Credentials, IdentityAssertion, Session, SessionSource, User};
