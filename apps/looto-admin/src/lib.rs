//! # looto-admin
//!
//! Back-office server and command line for Ludo Looto.
//!
//! The HTTP API lives in [`api`], the commands in [`cli`]. All domain work is
//! delegated to [`looto_core`].

pub mod api;
pub mod cli;
pub mod config;

pub use looto_core;
