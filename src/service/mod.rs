//! Service integrations for external APIs and clients.
//!
//! This module contains implementations for the services used by the assistant:
//! - Chat services (e.g., Slack)
//! - Google credentials and the Gmail/Calendar workspace
//! - LLM services (e.g., OpenAI)
//!
//! Each service module defines both generic traits and concrete implementations,
//! allowing for extensibility and easy testing.

pub mod chat;
pub mod credential;
pub mod llm;
pub mod workspace;
