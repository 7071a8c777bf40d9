//! Core types for parley
//!
//! This crate provides the in-memory session store, configuration loading
//! and logging setup shared by the other parley crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod session;

pub use error::{Error, Result};
