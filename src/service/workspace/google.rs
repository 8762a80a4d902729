//! Gmail and Google Calendar implementation of the workspace capabilities.
//!
//! Every call acquires its own credential and opens a fresh authorized
//! session; nothing is pooled between calls.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_with::skip_serializing_none;
use tracing::{info, instrument};

use crate::{
    base::{
        config::Config,
        error::{AssistantError, CapabilityRes},
        types::{CapabilityResult, CreatedEvent, EventList, MessageList, MessageSummary, NewScheduledEvent, ScheduledEvent},
    },
    service::credential::{CapabilityScope, CredentialManager},
};

use super::{GenericWorkspaceClient, WorkspaceClient};

/// Length of the default event window.
const DEFAULT_WINDOW_DAYS: i64 = 7;

/// Timezone the create operation interprets its times in.
const EVENT_TIME_ZONE: &str = "UTC";

// Extra methods on `WorkspaceClient` applied by the google implementation.

impl WorkspaceClient {
    /// Creates a new Google workspace client.
    pub fn google(config: &Config, http: reqwest::Client, credentials: CredentialManager) -> Self {
        let client = GoogleWorkspaceClient::new(config, http, credentials);
        Self { inner: Arc::new(client) }
    }
}

// Wire types.

#[derive(Debug, Deserialize)]
struct ListMessagesResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GmailMessage {
    pub id: String,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub payload: Option<GmailPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GmailPayload {
    #[serde(default)]
    pub headers: Vec<GmailHeader>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GmailHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    items: Vec<CalendarEvent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CalendarEvent {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start: Option<CalendarEventTime>,
    #[serde(default)]
    pub end: Option<CalendarEventTime>,
    #[serde(default)]
    pub attendees: Option<Vec<CalendarAttendee>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CalendarEventTime {
    #[serde(default)]
    pub date_time: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CalendarAttendee {
    #[serde(default)]
    pub email: Option<String>,
}

/// Body of an `events.insert` request.
#[skip_serializing_none]
#[derive(Debug, Serialize)]
pub(crate) struct EventInsertBody {
    pub summary: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub start: EventTimeBody,
    pub end: EventTimeBody,
    pub attendees: Option<Vec<AttendeeBody>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EventTimeBody {
    pub date_time: String,
    pub time_zone: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttendeeBody {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertedEvent {
    id: String,
    #[serde(default)]
    html_link: Option<String>,
}

// Specific implementations.

/// Google workspace client implementation.
#[derive(Clone)]
pub struct GoogleWorkspaceClient {
    http: reqwest::Client,
    credentials: CredentialManager,
    config: Config,
}

/// An authorized view of the Google REST API for one call.
struct GoogleSession<'a> {
    http: &'a reqwest::Client,
    base_url: &'a str,
    access_token: String,
}

impl GoogleSession<'_> {
    fn endpoint(&self, segments: &[&str]) -> CapabilityRes<reqwest::Url> {
        let mut url = reqwest::Url::parse(self.base_url).map_err(|e| AssistantError::Configuration(format!("invalid Google API base URL `{}`: {e}", self.base_url)))?;

        url.path_segments_mut()
            .map_err(|_| AssistantError::Configuration(format!("Google API base URL `{}` cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str], query: &[(&str, String)]) -> CapabilityRes<T> {
        let response = self.http.get(self.endpoint(segments)?).bearer_auth(&self.access_token).query(query).send().await?;
        read_json(response).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(&self, segments: &[&str], body: &B) -> CapabilityRes<T> {
        let response = self.http.post(self.endpoint(segments)?).bearer_auth(&self.access_token).json(body).send().await?;
        read_json(response).await
    }
}

impl GoogleWorkspaceClient {
    /// Create a new Google workspace client.
    pub fn new(config: &Config, http: reqwest::Client, credentials: CredentialManager) -> Self {
        Self {
            http,
            credentials,
            config: config.clone(),
        }
    }

    /// Acquire a credential for `scope` and open a session with it.
    async fn session(&self, scope: CapabilityScope) -> CapabilityRes<GoogleSession<'_>> {
        let path = scope.token_path(&self.config);
        let credential = self.credentials.acquire(scope, &path).await?;

        Ok(GoogleSession {
            http: &self.http,
            base_url: &self.config.google_api_base_url,
            access_token: credential.access_token,
        })
    }

    /// Typed form of `fetch_messages`.
    #[instrument(name = "GoogleWorkspaceClient::try_fetch_messages", skip(self))]
    pub async fn try_fetch_messages(&self, limit: u32, filter_query: &str) -> CapabilityRes<MessageList> {
        let session = self.session(CapabilityScope::ReadMessages).await?;

        let listed: ListMessagesResponse = session
            .get(
                &["gmail", "v1", "users", "me", "messages"],
                &[("maxResults", limit.to_string()), ("q", filter_query.to_string())],
            )
            .await?;

        // One detail call per listed message.
        let mut emails = Vec::with_capacity(listed.messages.len());
        for message in &listed.messages {
            let detail: GmailMessage = session
                .get(&["gmail", "v1", "users", "me", "messages", message.id.as_str()], &[("format", "full".to_string())])
                .await?;

            emails.push(summarize_message(&detail));
        }

        info!("Fetched {} messages", emails.len());

        Ok(MessageList::from(emails))
    }

    /// Typed form of `fetch_scheduled_events`.
    #[instrument(name = "GoogleWorkspaceClient::try_fetch_scheduled_events", skip(self))]
    pub async fn try_fetch_scheduled_events(&self, limit: u32, time_min: Option<DateTime<Utc>>, time_max: Option<DateTime<Utc>>) -> CapabilityRes<EventList> {
        let (time_min, time_max) = resolve_window(time_min, time_max, Utc::now());
        let session = self.session(CapabilityScope::ScheduledEvents).await?;

        let listed: EventsResponse = session
            .get(
                &["calendar", "v3", "calendars", self.config.calendar_id.as_str(), "events"],
                &[
                    ("timeMin", time_min.to_rfc3339_opts(SecondsFormat::Secs, true)),
                    ("timeMax", time_max.to_rfc3339_opts(SecondsFormat::Secs, true)),
                    ("maxResults", limit.to_string()),
                    ("singleEvents", "true".to_string()),
                    ("orderBy", "startTime".to_string()),
                ],
            )
            .await?;

        let events = listed.items.into_iter().map(project_event).collect::<Vec<_>>();

        info!("Fetched {} events", events.len());

        Ok(EventList::from(events))
    }

    /// Typed form of `create_scheduled_event`.
    #[instrument(name = "GoogleWorkspaceClient::try_create_scheduled_event", skip_all)]
    pub async fn try_create_scheduled_event(&self, event: &NewScheduledEvent) -> CapabilityRes<CreatedEvent> {
        validate_event_times(&event.start_time, &event.end_time)?;

        let body = build_insert_body(event);
        let session = self.session(CapabilityScope::ScheduledEvents).await?;

        let inserted: InsertedEvent = session.post(&["calendar", "v3", "calendars", self.config.calendar_id.as_str(), "events"], &body).await?;

        info!("Created event {}", inserted.id);

        Ok(CreatedEvent {
            event_id: inserted.id,
            event_link: inserted.html_link.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl GenericWorkspaceClient for GoogleWorkspaceClient {
    async fn fetch_messages(&self, limit: u32, filter_query: &str) -> CapabilityResult<MessageList> {
        self.try_fetch_messages(limit, filter_query).await.into()
    }

    async fn fetch_scheduled_events(&self, limit: u32, time_min: Option<DateTime<Utc>>, time_max: Option<DateTime<Utc>>) -> CapabilityResult<EventList> {
        self.try_fetch_scheduled_events(limit, time_min, time_max).await.into()
    }

    async fn create_scheduled_event(&self, event: &NewScheduledEvent) -> CapabilityResult<CreatedEvent> {
        self.try_create_scheduled_event(event).await.into()
    }
}

// Helpers.

/// Decode a successful JSON response, or surface the status and body.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> CapabilityRes<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(AssistantError::Service { status: status.as_u16(), body });
    }

    Ok(serde_json::from_str(&body)?)
}

/// First header whose name matches, ignoring ASCII case.
pub(crate) fn header_value<'a>(headers: &'a [GmailHeader], name: &str) -> Option<&'a str> {
    headers.iter().find(|h| h.name.eq_ignore_ascii_case(name)).map(|h| h.value.as_str())
}

/// Project a full Gmail message into a summary.
pub(crate) fn summarize_message(message: &GmailMessage) -> MessageSummary {
    let headers = message.payload.as_ref().map(|p| p.headers.as_slice()).unwrap_or_default();

    MessageSummary {
        id: message.id.clone(),
        subject: header_value(headers, "Subject").unwrap_or("No Subject").to_string(),
        from: header_value(headers, "From").unwrap_or("Unknown").to_string(),
        date: header_value(headers, "Date").unwrap_or("Unknown").to_string(),
        snippet: message.snippet.clone().unwrap_or_default(),
    }
}

/// Timed events carry `dateTime`; all-day events only `date`.
fn event_time(time: Option<&CalendarEventTime>) -> String {
    time.and_then(|t| t.date_time.clone().or_else(|| t.date.clone())).unwrap_or_default()
}

/// Project a calendar event into its read form.
pub(crate) fn project_event(event: CalendarEvent) -> ScheduledEvent {
    let attendees = event.attendees.map(|list| list.into_iter().filter_map(|a| a.email).collect::<Vec<_>>());

    ScheduledEvent {
        start: event_time(event.start.as_ref()),
        end: event_time(event.end.as_ref()),
        id: event.id,
        summary: event.summary.unwrap_or_else(|| "No Title".to_string()),
        location: event.location.unwrap_or_default(),
        description: event.description.unwrap_or_default(),
        attendees,
    }
}

/// Fill in the default query window.
pub(crate) fn resolve_window(time_min: Option<DateTime<Utc>>, time_max: Option<DateTime<Utc>>, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let time_min = time_min.unwrap_or(now);
    let time_max = time_max.unwrap_or(time_min + Duration::days(DEFAULT_WINDOW_DAYS));

    (time_min, time_max)
}

/// Build the insert body; empty or absent attendee lists leave the key out.
pub(crate) fn build_insert_body(event: &NewScheduledEvent) -> EventInsertBody {
    let attendees = event
        .attendees
        .as_ref()
        .filter(|list| !list.is_empty())
        .map(|list| list.iter().map(|email| AttendeeBody { email: email.clone() }).collect());

    EventInsertBody {
        summary: event.summary.clone(),
        location: event.location.clone(),
        description: event.description.clone(),
        start: EventTimeBody {
            date_time: event.start_time.clone(),
            time_zone: EVENT_TIME_ZONE.to_string(),
        },
        end: EventTimeBody {
            date_time: event.end_time.clone(),
            time_zone: EVENT_TIME_ZONE.to_string(),
        },
        attendees,
    }
}

/// Parse an ISO-8601 timestamp; offset-less values are taken as UTC.
pub(crate) fn parse_event_time(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

/// Both times must be well-formed and in order.
pub(crate) fn validate_event_times(start_time: &str, end_time: &str) -> CapabilityRes<()> {
    let start = parse_event_time(start_time).ok_or_else(|| AssistantError::Validation(format!("start time `{start_time}` is not an ISO-8601 timestamp")))?;
    let end = parse_event_time(end_time).ok_or_else(|| AssistantError::Validation(format!("end time `{end_time}` is not an ISO-8601 timestamp")))?;

    if end <= start {
        return Err(AssistantError::Validation(format!("end time `{end_time}` must be after start time `{start_time}`")));
    }

    Ok(())
}

// Tests.
