// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Unit tests for the namespace limiter
//!
//! This module contains unit tests for:
//! - Admission decisions through the public limiter API
//! - The webhook endpoint, driven through the axum router

#[path = "../common/mod.rs"]
mod common;

mod limiter;
