//! ARBOR Core Types
//!
//! Pure types and token-level parsing shared by the log and replay crates.
//! Nothing in this crate performs I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod time;
pub mod token;

// Re-exports
pub use error::{CoreError, CoreResult};
pub use time::Timestamp;
pub use token::{bracketed_list, host_address, parse_ipv4};
