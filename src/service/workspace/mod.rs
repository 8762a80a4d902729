pub mod google;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::base::types::{CapabilityResult, CreatedEvent, EventList, MessageList, NewScheduledEvent};

// Traits.

/// Generic "workspace" trait covering the mail and calendar capabilities.
///
/// Every method returns a tagged `CapabilityResult` and never fails outright:
/// authorization, transport and validation failures all come back as the
/// `Error` variant.
#[async_trait]
pub trait GenericWorkspaceClient: Send + Sync + 'static {
    /// List up to `limit` messages matching `filter_query` (service-defined syntax, e.g. `is:unread`).
    async fn fetch_messages(&self, limit: u32, filter_query: &str) -> CapabilityResult<MessageList>;

    /// List up to `limit` events in `[time_min, time_max)`, ordered by start time.
    ///
    /// `time_min` defaults to now and `time_max` to seven days after `time_min`.
    async fn fetch_scheduled_events(&self, limit: u32, time_min: Option<DateTime<Utc>>, time_max: Option<DateTime<Utc>>) -> CapabilityResult<EventList>;

    /// Create an event and return its identifier and shareable link.
    async fn create_scheduled_event(&self, event: &NewScheduledEvent) -> CapabilityResult<CreatedEvent>;
}

// Structs.

/// Workspace client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct WorkspaceClient {
    inner: Arc<dyn GenericWorkspaceClient>,
}

impl Deref for WorkspaceClient {
    type Target = dyn GenericWorkspaceClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl WorkspaceClient {
    pub fn new(inner: Arc<dyn GenericWorkspaceClient>) -> Self {
        Self { inner }
    }
}
