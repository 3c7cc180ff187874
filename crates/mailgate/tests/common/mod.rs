//! Shared test utilities for mailgate integration tests.
//!
//! This module provides:
//! - In-memory mailbox, storage and queue doubles that record every call
//! - Builders for message summaries and wired-up pipelines

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::*;
