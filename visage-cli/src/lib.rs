//! Terminal client for the visage recognition protocol.
//!
//! Thin glue around `visage-core`: configuration, a replay frame
//! source, and a log-line render sink.

pub mod config;
pub mod source;
pub mod ui;
