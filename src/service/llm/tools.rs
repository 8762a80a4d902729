//! Function tools the model may call to reach the mail and calendar capabilities.

use std::sync::OnceLock;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::{
    base::types::{CapabilityResult, NewScheduledEvent},
    service::workspace::WorkspaceClient,
};

pub const READ_EMAILS: &str = "read_emails";
pub const LIST_CALENDAR_EVENTS: &str = "list_calendar_events";
pub const CREATE_CALENDAR_EVENT: &str = "create_calendar_event";

fn default_max_results() -> u32 {
    10
}

// Types.

/// A provider-neutral function tool definition.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ReadEmailsArgs {
    #[serde(default = "default_max_results")]
    max_results: u32,
    #[serde(default)]
    query: String,
}

#[derive(Debug, Deserialize)]
struct ListCalendarEventsArgs {
    #[serde(default = "default_max_results")]
    max_results: u32,
}

// Statics.

static TOOL_SPECS: OnceLock<Vec<ToolSpec>> = OnceLock::new();

/// Get the tool definitions.
pub fn tool_specs() -> &'static [ToolSpec] {
    TOOL_SPECS.get_or_init(|| {
        vec![
            ToolSpec {
                name: READ_EMAILS,
                description: "Read emails from Gmail. Can filter by query (e.g., 'is:unread', 'from:someone@example.com').",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "max_results": {"type": "integer", "description": "Maximum number of emails to retrieve (default: 10)."},
                        "query": {"type": "string", "description": "Gmail search query for filtering emails."}
                    },
                    "additionalProperties": false
                }),
            },
            ToolSpec {
                name: LIST_CALENDAR_EVENTS,
                description: "List upcoming events from Google Calendar for the next seven days.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "max_results": {"type": "integer", "description": "Maximum number of events to retrieve (default: 10)."}
                    },
                    "additionalProperties": false
                }),
            },
            ToolSpec {
                name: CREATE_CALENDAR_EVENT,
                description: "Create a new event in Google Calendar. Times are interpreted in UTC.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "summary": {"type": "string", "description": "Event title."},
                        "start_time": {"type": "string", "description": "Start time in ISO format (e.g., '2025-10-24T10:00:00Z')."},
                        "end_time": {"type": "string", "description": "End time in ISO format."},
                        "description": {"type": "string", "description": "Event description."},
                        "location": {"type": "string", "description": "Event location."},
                        "attendees": {"type": "array", "items": {"type": "string"}, "description": "List of attendee email addresses."}
                    },
                    "required": ["summary", "start_time", "end_time"],
                    "additionalProperties": false
                }),
            },
        ]
    })
}

// Structs.

/// Executes model tool calls against the workspace.
///
/// This is trivially cloneable.
#[derive(Clone)]
pub struct Toolbox {
    workspace: WorkspaceClient,
}

impl Toolbox {
    pub fn new(workspace: WorkspaceClient) -> Self {
        Self { workspace }
    }

    /// The tools this toolbox can execute.
    pub fn specs(&self) -> &'static [ToolSpec] {
        tool_specs()
    }

    /// Run the named tool with JSON `arguments` and return its JSON result.
    ///
    /// Failures are reported in the result so the model can react to them.
    #[instrument(name = "Toolbox::call", skip(self, arguments))]
    pub async fn call(&self, name: &str, arguments: &str) -> String {
        info!("Executing tool call ...");

        // Some models send an empty string for a call without arguments.
        let arguments = if arguments.trim().is_empty() { "{}" } else { arguments };

        match name {
            READ_EMAILS => match serde_json::from_str::<ReadEmailsArgs>(arguments) {
                Ok(args) => to_json(&self.workspace.fetch_messages(args.max_results, &args.query).await),
                Err(e) => invalid_arguments(name, e),
            },
            LIST_CALENDAR_EVENTS => match serde_json::from_str::<ListCalendarEventsArgs>(arguments) {
                Ok(args) => to_json(&self.workspace.fetch_scheduled_events(args.max_results, Some(Utc::now()), None).await),
                Err(e) => invalid_arguments(name, e),
            },
            CREATE_CALENDAR_EVENT => match serde_json::from_str::<NewScheduledEvent>(arguments) {
                Ok(event) => to_json(&self.workspace.create_scheduled_event(&event).await),
                Err(e) => invalid_arguments(name, e),
            },
            _ => {
                warn!("Unknown tool requested.");
                to_json(&CapabilityResult::<()>::Error {
                    message: format!("Unknown tool `{name}`."),
                })
            }
        }
    }
}

// Helpers.

fn invalid_arguments(name: &str, error: serde_json::Error) -> String {
    warn!("Invalid arguments for {}: {}", name, error);

    to_json(&CapabilityResult::<()>::Error {
        message: format!("Invalid arguments for `{name}`: {error}"),
    })
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| json!({"status": "error", "message": e.to_string()}).to_string())
}

// Tests.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::DateTime;
    use mockall::mock;

    use super::*;
    use crate::{
        base::types::{CreatedEvent, EventList, MessageList},
        service::workspace::GenericWorkspaceClient,
    };

    mock! {
        pub Workspace {}

        #[async_trait]
        impl GenericWorkspaceClient for Workspace {
            async fn fetch_messages(&self, limit: u32, filter_query: &str) -> CapabilityResult<MessageList>;
            async fn fetch_scheduled_events(&self, limit: u32, time_min: Option<DateTime<Utc>>, time_max: Option<DateTime<Utc>>) -> CapabilityResult<EventList>;
            async fn create_scheduled_event(&self, event: &NewScheduledEvent) -> CapabilityResult<CreatedEvent>;
        }
    }

    fn toolbox(mock: MockWorkspace) -> Toolbox {
        Toolbox::new(WorkspaceClient::new(Arc::new(mock)))
    }

    #[test]
    fn test_specs_cover_three_capabilities() {
        let names = tool_specs().iter().map(|s| s.name).collect::<Vec<_>>();

        assert_eq!(names, vec![READ_EMAILS, LIST_CALENDAR_EVENTS, CREATE_CALENDAR_EVENT]);
        assert_eq!(tool_specs()[2].parameters["required"], json!(["summary", "start_time", "end_time"]));
    }

    #[tokio::test]
    async fn test_read_emails_defaults() {
        let mut mock = MockWorkspace::new();
        mock.expect_fetch_messages()
            .withf(|limit, query| *limit == 10 && query.is_empty())
            .times(1)
            .returning(|_, _| CapabilityResult::Success(MessageList::default()));

        let output = toolbox(mock).call(READ_EMAILS, "").await;

        assert_eq!(serde_json::from_str::<Value>(&output).unwrap(), json!({"status": "success", "count": 0, "emails": []}));
    }

    #[tokio::test]
    async fn test_read_emails_passes_query() {
        let mut mock = MockWorkspace::new();
        mock.expect_fetch_messages()
            .withf(|limit, query| *limit == 3 && query == "from:boss@example.com")
            .times(1)
            .returning(|_, _| CapabilityResult::Success(MessageList::default()));

        toolbox(mock).call(READ_EMAILS, r#"{"max_results": 3, "query": "from:boss@example.com"}"#).await;
    }

    #[tokio::test]
    async fn test_list_events_uses_limit() {
        let mut mock = MockWorkspace::new();
        mock.expect_fetch_scheduled_events()
            .withf(|limit, time_min, time_max| *limit == 4 && time_min.is_some() && time_max.is_none())
            .times(1)
            .returning(|_, _, _| CapabilityResult::Error { message: "no calendar".to_string() });

        let output = toolbox(mock).call(LIST_CALENDAR_EVENTS, r#"{"max_results": 4}"#).await;

        assert_eq!(serde_json::from_str::<Value>(&output).unwrap(), json!({"status": "error", "message": "no calendar"}));
    }

    #[tokio::test]
    async fn test_create_event_forwards_arguments() {
        let mut mock = MockWorkspace::new();
        mock.expect_create_scheduled_event()
            .withf(|event| event.summary == "Lunch" && event.attendees == Some(vec!["a@x.com".to_string()]) && event.description.is_none())
            .times(1)
            .returning(|_| {
                CapabilityResult::Success(CreatedEvent {
                    event_id: "evt".to_string(),
                    event_link: "https://calendar.example/evt".to_string(),
                })
            });

        let output = toolbox(mock)
            .call(
                CREATE_CALENDAR_EVENT,
                r#"{"summary": "Lunch", "start_time": "2025-10-24T12:00:00Z", "end_time": "2025-10-24T13:00:00Z", "attendees": ["a@x.com"]}"#,
            )
            .await;

        assert!(output.contains("\"event_id\":\"evt\""));
    }

    #[tokio::test]
    async fn test_missing_required_argument_is_reported() {
        let output = toolbox(MockWorkspace::new()).call(CREATE_CALENDAR_EVENT, r#"{"summary": "Lunch"}"#).await;

        let value = serde_json::from_str::<Value>(&output).unwrap();
        assert_eq!(value["status"], "error");
        assert!(value["message"].as_str().unwrap().contains("start_time"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported() {
        let output = toolbox(MockWorkspace::new()).call("search_web", "{}").await;

        assert_eq!(serde_json::from_str::<Value>(&output).unwrap(), json!({"status": "error", "message": "Unknown tool `search_web`."}));
    }
}
