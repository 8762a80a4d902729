//! Slack integration over socket mode.
//!
//! Inbound Slack events are converted into the platform-neutral event types
//! and handed to the interaction handlers. Outbound messages go through the
//! Web API with the bot token.

use crate::{
    base::{
        config::Config,
        types::{DirectMessageEvent, MentionEvent, Res, SlashCommandEvent, Void},
    },
    interaction::{self, InteractionContext, memory::ConversationMemory},
    service::{llm::LlmClient, workspace::WorkspaceClient},
};
use async_trait::async_trait;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use serde::Serialize;
use slack_morphism::prelude::*;
use tracing::{info, instrument, warn};

use std::sync::Arc;

use super::{ChatClient, GenericChatClient};

// Type aliases.

type FullClient = slack_morphism::SlackClient<SlackClientHyperConnector<HttpsConnector<HttpConnector>>>;

// Extra methods on `ChatClient` applied by the slack implementation.

impl ChatClient {
    /// Creates a new Slack chat client.
    pub async fn slack(config: &Config, llm: LlmClient, workspace: WorkspaceClient, memory: ConversationMemory) -> Res<Self> {
        let client = SlackChatClient::new(config, llm, workspace, memory).await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

impl From<SlackChatClient> for ChatClient {
    fn from(client: SlackChatClient) -> Self {
        Self { inner: Arc::new(client) }
    }
}

// Structs.

/// User state for the slack socket client.
struct SlackUserState {
    context: InteractionContext,
}

/// Slack client implementation.
#[derive(Clone)]
struct SlackChatClient {
    app_token: SlackApiToken,
    bot_token: SlackApiToken,
    client: Arc<FullClient>,
    llm: LlmClient,
    workspace: WorkspaceClient,
    memory: ConversationMemory,
}

impl SlackChatClient {
    /// Create a new Slack chat client.
    #[instrument(name = "SlackChatClient::new", skip_all)]
    pub async fn new(config: &Config, llm: LlmClient, workspace: WorkspaceClient, memory: ConversationMemory) -> Res<Self> {
        // Initialize tokens.

        let app_token = SlackApiToken::new(SlackApiTokenValue(config.slack_app_token.clone()));
        let bot_token = SlackApiToken::new(SlackApiTokenValue(config.slack_bot_token.clone()));

        // Initialize the Slack client.

        let https_connector = HttpsConnector::<HttpConnector>::builder().with_native_roots()?.https_only().enable_all_versions().build();
        let connector = SlackClientHyperConnector::with_connector(https_connector);
        let client = Arc::new(slack_morphism::SlackClient::new(connector));

        // Check the bot token up front.

        let session = client.open_session(&bot_token);
        let bot_user = session.auth_test().await?;

        info!("Slack bot user ID: {}", bot_user.user_id.0);

        Ok(Self {
            app_token,
            bot_token,
            client,
            llm,
            workspace,
            memory,
        })
    }
}

#[async_trait]
impl GenericChatClient for SlackChatClient {
    async fn start(&self) -> Void {
        // Initialize the socket mode listener.

        let socket_mode_callbacks = SlackSocketModeListenerCallbacks::new()
            .with_command_events(handle_command_event)
            .with_push_events(handle_push_event);

        // Initialize the socket mode listener environment.

        let context = InteractionContext::new(self.llm.clone(), self.workspace.clone(), ChatClient::from(self.clone()), self.memory.clone());
        let listener_environment = Arc::new(SlackClientEventsListenerEnvironment::new(self.client.clone()).with_user_state(SlackUserState { context }));

        let socket_mode_listener = Arc::new(SlackClientSocketModeListener::new(
            &SlackClientSocketModeConfig::new(),
            listener_environment.clone(),
            socket_mode_callbacks,
        ));

        // Register the app token, then serve until Ctrl-C.

        socket_mode_listener.listen_for(&self.app_token).await?;

        info!("Assistant is listening for Slack events.");

        socket_mode_listener.serve().await;

        Ok(())
    }

    #[instrument(skip(self, text))]
    async fn send_message(&self, channel_id: &str, thread_ts: Option<&str>, text: &str) -> Void {
        let message = SlackMessageContent::new().with_text(text.to_string());

        let mut request = SlackApiChatPostMessageRequest::new(SlackChannelId(channel_id.to_string()), message).with_link_names(true);

        if let Some(thread_ts) = thread_ts {
            request = request.with_thread_ts(SlackTs(thread_ts.to_string()));
        }

        let session = self.client.open_session(&self.bot_token);

        let _ = session.chat_post_message(&request).await.map_err(|e| anyhow::anyhow!("Failed to send message: {}", e))?;

        Ok(())
    }

    #[instrument(skip(self, text))]
    async fn send_ephemeral(&self, channel_id: &str, user_id: &str, thread_ts: Option<&str>, text: &str) -> Void {
        let message = SlackMessageContent::new().with_text(text.to_string());

        let mut request = SlackApiChatPostEphemeralRequest::new(SlackChannelId(channel_id.to_string()), SlackUserId(user_id.to_string()), message);

        if let Some(thread_ts) = thread_ts {
            request = request.with_thread_ts(SlackTs(thread_ts.to_string()));
        }

        let session = self.client.open_session(&self.bot_token);

        let _ = session
            .chat_post_ephemeral(&request)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send ephemeral message: {}", e))?;

        Ok(())
    }
}

// Conversions into platform-neutral events.

impl From<SlackAppMentionEvent> for MentionEvent {
    fn from(event: SlackAppMentionEvent) -> Self {
        Self {
            channel: event.channel.0,
            user: event.user.0,
            text: event.content.text.unwrap_or_default(),
            ts: event.origin.ts.0,
        }
    }
}

impl From<SlackMessageEvent> for DirectMessageEvent {
    fn from(event: SlackMessageEvent) -> Self {
        Self {
            channel: event.origin.channel.map(|c| c.0).unwrap_or_default(),
            channel_type: event.origin.channel_type.map(|t| t.0),
            user: event.sender.user.map(|u| u.0),
            text: event.content.and_then(|c| c.text),
            subtype: event.subtype.as_ref().and_then(wire_name),
            bot_id: event.sender.bot_id.map(|b| b.0),
        }
    }
}

impl From<SlackCommandEvent> for SlashCommandEvent {
    fn from(event: SlackCommandEvent) -> Self {
        Self {
            channel: event.channel_id.0,
            user: event.user_id.0,
            text: event.text,
        }
    }
}

/// The serialized name of a unit enum value.
fn wire_name<T: Serialize>(value: &T) -> Option<String> {
    serde_json::to_value(value).ok().and_then(|v| v.as_str().map(str::to_string))
}

// Socket mode listener callbacks for Slack.

/// Acknowledges a slash command at once and processes it in the background.
#[instrument(skip_all)]
async fn handle_command_event(
    event: SlackCommandEvent,
    _client: Arc<SlackHyperClient>,
    states: SlackClientEventsUserState,
) -> Result<SlackCommandEventResponse, Box<dyn std::error::Error + Send + Sync>> {
    info!("Received slash command {} ...", event.command.0);

    let states = states.read().await;
    let user_state = states.get_user_state::<SlackUserState>().ok_or(anyhow::anyhow!("Failed to get user state"))?;

    interaction::slash_command::handle_slash_command(SlashCommandEvent::from(event), user_state.context.clone());

    Ok(SlackCommandEventResponse::new(SlackMessageContent::new()))
}

/// Handles push events from Slack.
#[instrument(skip_all)]
async fn handle_push_event(event_callback: SlackPushEventCallback, _client: Arc<SlackHyperClient>, states: SlackClientEventsUserState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let states = states.read().await;
    let user_state = states.get_user_state::<SlackUserState>().ok_or(anyhow::anyhow!("Failed to get user state"))?;

    match event_callback.event {
        SlackEventCallbackBody::Message(slack_message_event) => {
            info!("Received message event ...");
            interaction::direct_message::handle_direct_message(DirectMessageEvent::from(slack_message_event), user_state.context.clone());
        }
        SlackEventCallbackBody::AppMention(slack_app_mention_event) => {
            info!("Received app mention event ...");
            interaction::app_mention::handle_app_mention(MentionEvent::from(slack_app_mention_event), user_state.context.clone());
        }
        _ => {
            warn!("Received unhandled push event.")
        }
    }

    Ok(())
}

// Tests.
