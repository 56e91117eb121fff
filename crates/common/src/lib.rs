//! Common utilities and types shared across hostinfo crates.

pub mod error;
pub mod host;
pub mod timestamp;

pub use error::{Error, Result};
pub use host::local_hostname;
pub use timestamp::Timestamp;
