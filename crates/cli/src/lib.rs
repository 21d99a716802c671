//! bsync CLI library
//!
//! Exposes the command tree so the binary and integration tests share it.

pub mod commands;
pub mod exit_code;
pub mod output;
