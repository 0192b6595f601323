//! Core types and protocol logic for warptty.
//!
//! This crate provides the runtime-free half of the proxy: the event
//! vocabulary, the world-model value types, and the byte/line level
//! interpretation of game server output. It has no opinion about sockets
//! or tasks; the CLI crate wires these pieces to the network.
//!
//! # Modules
//!
//! - [`error`]: bot error type with actionable hints
//! - [`event`]: typed event kinds, ids, and payloads
//! - [`models`]: sectors, planets, ports, player status
//! - [`text`]: ANSI stripping and numeric shorthand parsing
//! - [`prompt`]: game prompt classification
//! - [`scan`]: the byte-level line scanner state machine
//!
//! # Scanning
//!
//! Game output is consumed one byte at a time by [`scan::LineScanner`],
//! which recognizes complete lines plus three in-line signals that never
//! arrive with a terminator: command prompts (`?`), sub-bot prompts (`>`),
//! and deployed-fighter hit reports (`:`). Everything downstream of the
//! scanner works on clean text with ANSI sequences removed.

pub mod error;
pub mod event;
pub mod models;
pub mod prompt;
pub mod scan;
pub mod text;
