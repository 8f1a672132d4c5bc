//! Client state adapter for the CSP Study Hub
//!
//! One contract for accounts, sessions and study documents, served either by
//! the HTTP API ([`RemoteBackend`]) or by a local file store
//! ([`LocalBackend`]). The implementation is chosen once at startup from
//! [`ClientConfig`].

pub mod backend;
pub mod context;
pub mod error;
pub mod local;
pub mod remote;

pub use backend::{BackendMode, StudyBackend};
pub use context::{ClientConfig, ClientContext, connect};
pub use error::{ClientError, ClientResult};
pub use local::LocalBackend;
pub use remote::RemoteBackend;
