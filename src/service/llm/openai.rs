//! OpenAI implementation of the assistant model.
//!
//! Responses are streamed and concatenated. When the model asks for tools,
//! the calls are executed through the [`Toolbox`] and the model is queried
//! again with their results, for a bounded number of rounds.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionMessageToolCallChunk, ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs, ChatCompletionTool, ChatCompletionToolArgs,
        ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionCall, FunctionObjectArgs,
    },
};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::base::{
    config::Config,
    types::{Res, Turn},
};

use super::{GenericLlmClient, LlmClient, tools::Toolbox};

/// Tool-call rounds allowed before the model must answer in text.
const MAX_TOOL_ROUNDS: usize = 5;

// Extra methods on `LlmClient` applied by the openai implementation.

impl LlmClient {
    /// Creates a new OpenAI client; `toolbox` enables tool calls when configured.
    pub fn openai(config: &Config, toolbox: Option<Toolbox>) -> Self {
        let client = OpenAiLlmClient::new(config, toolbox);
        Self { inner: Arc::new(client) }
    }
}

// Specific implementations.

/// OpenAI LLM client implementation.
#[derive(Clone)]
pub struct OpenAiLlmClient {
    client: Client<OpenAIConfig>,
    config: Config,
    toolbox: Option<Toolbox>,
}

impl OpenAiLlmClient {
    /// Create a new OpenAI LLM client.
    #[instrument(name = "OpenAiLlmClient::new", skip_all)]
    pub fn new(config: &Config, toolbox: Option<Toolbox>) -> Self {
        let mut cfg = OpenAIConfig::new().with_api_key(config.openai_api_key.clone());

        if let Some(base_url) = &config.openai_base_url {
            cfg = cfg.with_api_base(base_url.clone());
        }

        let toolbox = toolbox.filter(|_| config.llm_tools_enabled);

        Self {
            client: Client::with_config(cfg),
            config: config.clone(),
            toolbox,
        }
    }

    /// Build the conversation: directive, prior turns, then the new prompt.
    fn build_messages(&self, history: &[Turn], prompt: &str) -> Res<Vec<ChatCompletionRequestMessage>> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(history.len() * 2 + 2);

        messages.push(ChatCompletionRequestSystemMessageArgs::default().content(self.config.assistant_system_directive.clone()).build()?.into());

        for turn in history {
            messages.push(ChatCompletionRequestUserMessageArgs::default().content(turn.user.clone()).build()?.into());
            messages.push(ChatCompletionRequestAssistantMessageArgs::default().content(turn.assistant.clone()).build()?.into());
        }

        messages.push(ChatCompletionRequestUserMessageArgs::default().content(prompt.to_string()).build()?.into());

        Ok(messages)
    }

    /// Convert the toolbox definitions into OpenAI tools.
    fn build_tools(&self) -> Res<Vec<ChatCompletionTool>> {
        let Some(toolbox) = &self.toolbox else {
            return Ok(Vec::new());
        };

        toolbox
            .specs()
            .iter()
            .map(|spec| -> Res<ChatCompletionTool> {
                let function = FunctionObjectArgs::default()
                    .name(spec.name)
                    .description(spec.description)
                    .parameters(spec.parameters.clone())
                    .build()?;

                Ok(ChatCompletionToolArgs::default().r#type(ChatCompletionToolType::Function).function(function).build()?)
            })
            .collect()
    }

    /// Stream one completion and collect its text and tool calls.
    async fn stream_round(&self, messages: &[ChatCompletionRequestMessage], tools: &[ChatCompletionTool]) -> Res<StreamedTurn> {
        let mut request = CreateChatCompletionRequestArgs::default();

        request
            .model(&self.config.openai_model)
            .messages(messages.to_vec())
            .temperature(self.config.openai_temperature)
            .max_completion_tokens(self.config.openai_max_tokens);

        if !tools.is_empty() {
            request.tools(tools.to_vec());
        }

        let mut stream = self.client.chat().create_stream(request.build()?).await?;
        let mut turn = StreamedTurn::default();

        while let Some(chunk) = stream.next().await {
            for choice in chunk?.choices {
                turn.absorb(choice.delta.content.as_deref(), choice.delta.tool_calls.as_deref());
            }
        }

        Ok(turn)
    }

    /// Run the query loop without a time limit.
    async fn ask_unbounded(&self, history: &[Turn], prompt: &str) -> Res<String> {
        let mut messages = self.build_messages(history, prompt)?;
        let tools = self.build_tools()?;

        for round in 0..=MAX_TOOL_ROUNDS {
            // The last round withholds tools so the model has to answer.
            let offered: &[ChatCompletionTool] = if round < MAX_TOOL_ROUNDS { &tools } else { &[] };

            let turn = self.stream_round(&messages, offered).await?;

            let (Some(toolbox), false) = (&self.toolbox, turn.tool_calls.is_empty()) else {
                return Ok(turn.content);
            };

            let calls = turn.tool_calls();
            info!("Model requested {} tool call(s) in round {}", calls.len(), round + 1);

            let mut assistant = ChatCompletionRequestAssistantMessageArgs::default();
            assistant.tool_calls(calls.clone());
            if !turn.content.is_empty() {
                assistant.content(turn.content.clone());
            }
            messages.push(assistant.build()?.into());

            for call in calls {
                let output = toolbox.call(&call.function.name, &call.function.arguments).await;

                messages.push(ChatCompletionRequestToolMessageArgs::default().content(output).tool_call_id(call.id).build()?.into());
            }
        }

        Err(anyhow::anyhow!("The model kept requesting tools after {MAX_TOOL_ROUNDS} rounds."))
    }
}

#[async_trait]
impl GenericLlmClient for OpenAiLlmClient {
    #[instrument(name = "OpenAiLlmClient::ask", skip_all)]
    async fn ask(&self, history: &[Turn], prompt: &str) -> Res<String> {
        let limit = Duration::from_secs(self.config.llm_timeout_secs);

        match timeout(limit, self.ask_unbounded(history, prompt)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Model query timed out after {:?}", limit);
                Err(anyhow::anyhow!("The assistant did not respond within {} seconds.", self.config.llm_timeout_secs))
            }
        }
    }
}

// Stream accumulation.

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Text and tool calls assembled from stream deltas.
#[derive(Debug, Default)]
struct StreamedTurn {
    content: String,
    tool_calls: BTreeMap<u32, PartialToolCall>,
}

impl StreamedTurn {
    /// Fold one delta into the turn; tool-call fragments are keyed by index.
    fn absorb(&mut self, content: Option<&str>, tool_calls: Option<&[ChatCompletionMessageToolCallChunk]>) {
        if let Some(content) = content {
            self.content.push_str(content);
        }

        for chunk in tool_calls.unwrap_or_default() {
            let call = self.tool_calls.entry(chunk.index).or_default();

            if let Some(id) = &chunk.id {
                call.id.push_str(id);
            }

            if let Some(function) = &chunk.function {
                if let Some(name) = &function.name {
                    call.name.push_str(name);
                }
                if let Some(arguments) = &function.arguments {
                    call.arguments.push_str(arguments);
                }
            }
        }
    }

    /// The completed tool calls, in index order.
    fn tool_calls(&self) -> Vec<ChatCompletionMessageToolCall> {
        self.tool_calls
            .values()
            .map(|call| ChatCompletionMessageToolCall {
                id: call.id.clone(),
                r#type: ChatCompletionToolType::Function,
                function: FunctionCall {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                },
            })
            .collect()
    }
}

// Tests.
