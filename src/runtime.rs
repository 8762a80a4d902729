//! Runtime services and shared state for the assistant.

use tracing::instrument;

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    interaction::memory::ConversationMemory,
    service::{
        chat::ChatClient,
        credential::CredentialManager,
        llm::{LlmClient, tools::Toolbox},
        workspace::WorkspaceClient,
    },
};

/// Runtime service context that can be shared across the application.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The mail and calendar client.
    pub workspace: WorkspaceClient,
    /// The LLM client instance.
    pub llm: LlmClient,
    /// Remembered exchanges per user.
    pub memory: ConversationMemory,
    /// The chat client instance.
    pub chat: ChatClient,
}

impl Runtime {
    /// Create a new runtime instance.
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> Res<Self> {
        // Initialize the Google workspace client.
        let http = reqwest::Client::new();
        let credentials = CredentialManager::new(&config, http.clone());
        let workspace = WorkspaceClient::google(&config, http, credentials);

        // Initialize the LLM client, with the workspace as its toolbox.
        let llm = LlmClient::openai(&config, Some(Toolbox::new(workspace.clone())));

        let memory = ConversationMemory::new(config.conversation_max_turns, config.conversation_max_users);

        // Initialize the slack client.
        let chat = ChatClient::slack(&config, llm.clone(), workspace.clone(), memory.clone()).await?;

        Ok(Self {
            config,
            workspace,
            llm,
            memory,
            chat,
        })
    }

    pub async fn start(&self) -> Void {
        self.chat.start().await
    }
}
