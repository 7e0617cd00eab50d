pub type DateTime = chrono::DateTime<chrono::Utc>;
pub use bytes::Bytes;
pub use chrono::{Duration, Utc};

pub mod error;
pub mod job;
pub mod payload;
pub mod schedule;
pub mod topic;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;
