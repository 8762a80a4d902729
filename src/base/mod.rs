//! Core components, types, and utilities for the assistant bot.
//!
//! This module contains fundamental building blocks used throughout the application:
//! - Configuration handling and environment variables.
//! - The system directive for LLM interactions.
//! - Common types, the capability error set, and result handling.

pub mod config;
pub mod error;
pub mod prompts;
pub mod types;
