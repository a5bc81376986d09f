//! Vidi - video-on-demand media processing core
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod dump;
pub mod notificator;
pub mod processor;
pub mod reader;
pub mod session;
pub mod storage;
pub mod videoapi;
pub mod watch;
