use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

pub type Err = anyhow::Error;
pub type Res<T> = Result<T, Err>;
pub type Void = Res<()>;

// Capability results.

/// Tagged result of a capability call.
///
/// Serializes as `{"status": "success", ...payload}` or `{"status": "error", "message": "..."}`,
/// so callers branch on `status` instead of on error types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CapabilityResult<T> {
    Success(T),
    Error { message: String },
}

impl<T> CapabilityResult<T> {
    /// Returns the success payload, if any.
    pub fn success(&self) -> Option<&T> {
        match self {
            CapabilityResult::Success(value) => Some(value),
            CapabilityResult::Error { .. } => None,
        }
    }
}

impl<T, E> From<Result<T, E>> for CapabilityResult<T>
where
    E: std::fmt::Display,
{
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => CapabilityResult::Success(value),
            Err(err) => CapabilityResult::Error { message: err.to_string() },
        }
    }
}

/// Read-only projection of a fetched email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: String,
    pub subject: String,
    pub from: String,
    pub date: String,
    pub snippet: String,
}

/// Payload of a successful `fetch_messages` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MessageList {
    pub count: usize,
    pub emails: Vec<MessageSummary>,
}

impl From<Vec<MessageSummary>> for MessageList {
    fn from(emails: Vec<MessageSummary>) -> Self {
        Self { count: emails.len(), emails }
    }
}

/// Read projection of a calendar event.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub id: String,
    pub summary: String,
    pub start: String,
    pub end: String,
    pub location: String,
    pub description: String,
    pub attendees: Option<Vec<String>>,
}

/// Payload of a successful `fetch_scheduled_events` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EventList {
    pub count: usize,
    pub events: Vec<ScheduledEvent>,
}

impl From<Vec<ScheduledEvent>> for EventList {
    fn from(events: Vec<ScheduledEvent>) -> Self {
        Self { count: events.len(), events }
    }
}

/// Request to create a calendar event.
///
/// Times are ISO-8601 strings interpreted in UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NewScheduledEvent {
    pub summary: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub attendees: Option<Vec<String>>,
}

/// Payload of a successful `create_scheduled_event` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedEvent {
    pub event_id: String,
    pub event_link: String,
}

// Inbound chat events.

/// A message that @-mentions the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MentionEvent {
    pub channel: String,
    pub user: String,
    pub text: String,
    pub ts: String,
}

/// A plain message event, possibly from a direct-message channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DirectMessageEvent {
    pub channel: String,
    pub channel_type: Option<String>,
    pub user: Option<String>,
    pub text: Option<String>,
    pub subtype: Option<String>,
    pub bot_id: Option<String>,
}

/// A slash command invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SlashCommandEvent {
    pub channel: String,
    pub user: String,
    pub text: Option<String>,
}

// Conversation.

/// One exchange between a user and the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
}

// Tests.
