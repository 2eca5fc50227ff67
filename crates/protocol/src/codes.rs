//! Status codes carried in the envelope's `error.code` field.

/// The only code that means success.
pub const SUCCESS: i64 = 0;

/// The session token is unknown or expired; a new login is required.
pub const NO_AUTHENTICATION: i64 = -401;

/// The system is busy.
pub const SYSTEM_BUSY: i64 = 1077949006;

/// The controller is busy processing other requests.
pub const CONTROLLER_BUSY: i64 = 1077948995;

/// The controller message queue timed out.
pub const MESSAGE_TIMEOUT: i64 = 1077949001;

/// Codes that indicate transient overload of the array.
pub const SYSTEM_BUSY_CODES: &[i64] = &[SYSTEM_BUSY, CONTROLLER_BUSY, MESSAGE_TIMEOUT];

/// The label is already associated with the resource.
pub const LABEL_ALREADY_ASSOCIATED: i64 = 1077950203;

/// The label is not associated with the resource.
pub const LABEL_NOT_ASSOCIATED: i64 = 1077950204;

/// The user name or password is incorrect.
pub const AUTH_FAILED: i64 = 1077987870;

/// The account is locked after too many failed logins.
pub const ACCOUNT_LOCKED: i64 = 1077949057;
