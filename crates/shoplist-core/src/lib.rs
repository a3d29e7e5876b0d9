//! Core domain + application logic for the shopping-list bot.
//!
//! This crate is framework-agnostic. Telegram and the llama.cpp runtime live
//! behind ports (traits) implemented in adapter crates.

pub mod command;
pub mod config;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod inference;
pub mod localization;
pub mod logging;
pub mod mediator;
pub mod messaging;
pub mod strategy;

#[cfg(test)]
pub(crate) mod test_support;

pub use errors::{Error, Result};
