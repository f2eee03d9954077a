//! Google Calendar Client
//!
//! Reads upcoming events through the Calendar v3 REST API (`events.list`).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;

use super::{CalendarClient, CalendarEvent, CredentialProvider};
use crate::error::{ConciergeError, Result};

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Upper bound on events returned per lookup
const MAX_RESULTS: u32 = 10;

#[derive(Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<EventItem>,
}

#[derive(Deserialize)]
struct EventItem {
    summary: Option<String>,
    #[serde(default)]
    start: EventTime,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: Option<String>,
    date: Option<String>,
}

impl From<EventItem> for CalendarEvent {
    fn from(item: EventItem) -> Self {
        Self {
            summary: item.summary.unwrap_or_else(|| "(no title)".into()),
            start: item.start.date_time.or(item.start.date).unwrap_or_default(),
        }
    }
}

/// Calendar client for a single Google calendar
pub struct GoogleCalendarClient {
    http: reqwest::Client,
    credentials: Arc<CredentialProvider>,
    base_url: String,
    calendar_id: String,
}

impl GoogleCalendarClient {
    pub fn new(credentials: Arc<CredentialProvider>) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
            base_url: DEFAULT_BASE_URL.into(),
            calendar_id: "primary".into(),
        }
    }

    /// Credentials plus `GOOGLE_CALENDAR_ID` from the environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let calendar_id = lookup("GOOGLE_CALENDAR_ID").unwrap_or_else(|| "primary".into());
        Self::new(Arc::new(CredentialProvider::from_lookup(lookup))).with_calendar_id(calendar_id)
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_calendar_id(mut self, calendar_id: impl Into<String>) -> Self {
        self.calendar_id = calendar_id.into();
        self
    }

    pub fn credentials(&self) -> &CredentialProvider {
        &self.credentials
    }

    fn events_url(&self) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ConciergeError::Config(format!("invalid calendar base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| ConciergeError::Config("calendar base URL cannot have a path".into()))?
            .pop_if_empty()
            .extend(["calendars", self.calendar_id.as_str(), "events"]);
        Ok(url)
    }
}

#[async_trait]
impl CalendarClient for GoogleCalendarClient {
    async fn list_events(&self, time_min: DateTime<Utc>, time_max: DateTime<Utc>) -> Result<Vec<CalendarEvent>> {
        let token = self.credentials.access_token().await?;
        let url = self.events_url()?;

        tracing::debug!(calendar = %self.calendar_id, %time_min, %time_max, "Listing calendar events");

        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(&[
                ("timeMin", time_min.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("timeMax", time_max.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("maxResults", MAX_RESULTS.to_string()),
                ("singleEvents", "true".into()),
                ("orderBy", "startTime".into()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConciergeError::CalendarApi(format!("{status}: {body}")));
        }

        let list: EventList = response.json().await?;
        Ok(list.items.into_iter().map(CalendarEvent::from).collect())
    }

    fn name(&self) -> &str {
        "GoogleCalendar"
    }
}
