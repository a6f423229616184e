//! Integration tests for multibackup
//!
//! These tests require Docker and the PostgreSQL client tools on PATH.
//! Run with: `cargo test -p multibackup-tests --test integration -- --ignored`

mod common;
mod postgres;
