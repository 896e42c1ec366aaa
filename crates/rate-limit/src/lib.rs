//! Rate limiting functionality for NetGate.
//!
//! This crate provides fixed-window admission control per client identity:
//! each identity gets at most `limit` admissions per non-overlapping
//! `interval`-long window, with the window resetting on the first request
//! after expiry.
//!
//! Currently supports in-memory storage. The storage trait keeps the seam
//! open for distributed backends.

#![deny(missing_docs)]

mod error;
mod manager;
mod storage;

pub use error::RateLimitError;
pub use manager::RateLimitManager;
pub use storage::{FixedWindowStorage, QuotaStatus, RateLimitResult, RateLimitStorage, StorageError};
