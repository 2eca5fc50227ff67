//! Wire types for the storage array REST management API.
//!
//! - [`envelope`]: the `{error, data}` response wrapper and its validation
//! - [`codes`]: status codes the client layer classifies
//! - [`login`]: session bootstrap request/response

pub mod codes;
pub mod envelope;
pub mod login;

pub use envelope::{Envelope, EnvelopeError, Object, Payload, Status, integer_field, integer_value};
pub use login::{AccountState, LoginRequest, LoginResponse, LoginResponseError};
