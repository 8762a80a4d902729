//! Event handling and user interactions for the assistant.
//!
//! This module turns inbound chat events into replies:
//! - @-mentions of the bot
//! - Direct messages
//! - The `/assistant` slash command
//!
//! Every `handle_*` function spawns one task per event. The matching
//! `process_*` function runs the event to completion and is what tests drive.

pub mod app_mention;
pub mod direct_message;
pub mod memory;
pub mod slash_command;
pub mod text;

use tracing::error;

use crate::{
    base::{
        prompts,
        types::{Res, Turn},
    },
    service::{chat::ChatClient, llm::LlmClient, workspace::WorkspaceClient},
};

use memory::ConversationMemory;

/// Everything a handler needs, shared by all events.
///
/// It is designed to be trivially cloneable.
#[derive(Clone)]
pub struct InteractionContext {
    pub llm: LlmClient,
    pub workspace: WorkspaceClient,
    pub chat: ChatClient,
    pub memory: ConversationMemory,
}

impl InteractionContext {
    pub fn new(llm: LlmClient, workspace: WorkspaceClient, chat: ChatClient, memory: ConversationMemory) -> Self {
        Self { llm, workspace, chat, memory }
    }

    /// Run a generic query for `user` in `channel`, remembering the exchange
    /// for that conversation only.
    pub async fn ask(&self, channel: &str, user: &str, prompt: &str) -> Res<String> {
        let conversation = ConversationMemory::key(channel, user);
        let history = self.memory.history(&conversation);
        let answer = self.llm.ask(&history, prompt).await?;

        self.memory.record(
            &conversation,
            Turn {
                user: prompt.to_string(),
                assistant: answer.clone(),
            },
        );

        Ok(answer)
    }

    /// Post the apology for a failed event; a failed delivery is only logged.
    pub(crate) async fn apologize(&self, channel: &str, thread_ts: Option<&str>, err: &anyhow::Error) {
        error!("Error while handling: {}", err);

        if let Err(err) = self.chat.send_message(channel, thread_ts, &prompts::apology(&err.to_string())).await {
            error!("Failed to deliver apology: {}", err);
        }
    }
}
