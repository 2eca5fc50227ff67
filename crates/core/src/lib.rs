//! Resilient session client for storage array REST management APIs.
//!
//! [`ArrayClient`] issues named operations against an array that authenticates
//! with a session token. It logs in against the first reachable of several base
//! URLs, logs in again when the token is rejected (once for any number of
//! concurrent callers), retries busy-controller codes with a fixed delay, and
//! bounds the number of requests in flight.
//!
//! ```ignore
//! use std::sync::Arc;
//! use stor::{ArrayClient, ClientConfig, Collaborators, MemoryStore, Secret, SecretRef, Args};
//!
//! let secret = SecretRef::new("storage", "array-admin");
//! let store = Arc::new(MemoryStore::new());
//! store.insert_secret(secret.clone(), Secret::new("password", None));
//!
//! let config = ClientConfig::new(["https://10.0.0.1:8088/deviceManager/rest"], "admin").with_secret(secret);
//! let client = ArrayClient::connect(config, Collaborators::new(store)).await?;
//! let luns = client.count("lun.count", Args::new()).await?;
//! ```

pub mod classify;
pub mod client;
pub mod config;
pub mod registry;
pub mod resources;
pub mod secrets;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use classify::{Verdict, classify};
pub use client::{ArrayClient, Request};
pub use config::{ClientConfig, RetryConfig};
pub use registry::{Args, EndpointRegistry, EndpointRegistryBuilder, EndpointTemplate, args};
pub use reqwest::Method;
pub use resources::{DEFAULT_PAGE_SIZE, LabelBinding, MAX_PAGES};
pub use secrets::{BackendDescriptor, CertificateStore, Collaborators, MemoryStore, Secret, SecretFuture, SecretRef, SecretStore, StaticBackend};
pub use session::{ClientSession, Route, SessionManager, SessionState, TokenSnapshot, resolve_tls};
pub use stor_protocol::{Envelope, Object, Payload, Status, codes};
pub use stor_runtime::{AdmissionGate, Error, HttpTransport, Result, RetryPolicy, TlsSettings, Transport, TransportFuture, TransportRequest};
