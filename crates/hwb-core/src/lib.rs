//! Core domain + application logic for the host-watch bot.
//!
//! This crate is framework-agnostic. Telegram, SSH and PostgreSQL live behind
//! ports (traits) implemented in adapter crates.

pub mod catalog;
pub mod config;
pub mod contacts;
pub mod conversation;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod password;
pub mod ports;
pub mod security;
pub mod state;

pub use errors::{Error, Result};
