//! Storage array runtime - transport, admission, and retries
//!
//! This crate provides the request plumbing underneath the session layer:
//!
//! - **Transport**: HTTPS requests carrying the session token, returning raw JSON
//! - **TLS**: Trust pool construction and hot reload for the transport
//! - **Admission gate**: Bounded number of in-flight requests per client
//! - **Retry engine**: Fixed-delay redrive on retryable array codes
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │   stor-rs    │  Sessions, endpoint registry, classification
//! └──────┬───────┘
//!        │ Transport trait
//! ┌──────▼───────┐
//! │ stor-runtime │  This crate
//! │  ┌────────┐  │
//! │  │ Retry  │  │  Code-driven redrive
//! │  └────────┘  │
//! │  ┌────────┐  │
//! │  │ Gate   │  │  Concurrency bound
//! │  └────────┘  │
//! │  ┌────────┐  │
//! │  │ Trans  │  │  reqwest + rustls
//! │  └────────┘  │
//! └──────────────┘
//! ```

pub mod error;
pub mod gate;
pub mod retry;
pub mod tls;
pub mod transport;

pub use error::{Error, Result};
pub use gate::{AdmissionGate, AdmissionSlot};
pub use retry::{Attempt, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY, RetryPolicy, retry_call};
pub use tls::{TlsSettings, build_http_client, parse_trust_pool};
pub use transport::{HttpTransport, TOKEN_HEADER, Transport, TransportFuture, TransportRequest};
