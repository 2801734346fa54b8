#![warn(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Multi-turn completion support with per-user rolling history.
//!
//! # Key Features
//! - Bounded FIFO history per user, shared safely across concurrent requests
//! - Request construction per model family (chat messages or flat prompt)
//! - Retried dispatch with linear backoff
//! - Reply extraction that never fails on an empty response

mod history;
mod manager;

pub use history::{DEFAULT_CAPACITY, HistoryStats, InMemoryHistory};
pub use manager::CompletionClient;
