//! # shellpilot-error
//!
//! Unified error handling for shellpilot.
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what failed (e.g., NotFound, Timeout, ProtocolInvalid)
//! - **ErrorStatus**: Decide how to handle it (Permanent, Temporary, Persistent)
//! - **Error Context**: Assist in locating the cause with rich context
//! - **Error Source**: Wrap underlying errors without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use shellpilot_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::NotFound, "no such file 'notes.txt'")
//!         .with_operation("shell::read")
//!         .with_context("path", "notes.txt"))
//! }
//! ```
//!
//! ## Principles
//!
//! - All fallible functions return `Result<T, shellpilot_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - Same error handled once, subsequent ops only append context
//! - Don't abuse `From<OtherError>` to prevent raw error leakage

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using the shellpilot Error
pub type Result<T> = std::result::Result<T, Error>;
