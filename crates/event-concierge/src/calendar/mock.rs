//! Static Calendar
//!
//! For testing and local demos. Serves a fixed list of events.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{CalendarClient, CalendarEvent};
use crate::error::{ConciergeError, Result};

/// Calendar backed by an in-memory event list
pub struct StaticCalendar {
    events: Vec<(DateTime<Utc>, String)>,
    authenticated: bool,
}

impl Default for StaticCalendar {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticCalendar {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            authenticated: true,
        }
    }

    /// A calendar that behaves like one without credentials
    pub fn unauthenticated() -> Self {
        Self {
            events: Vec::new(),
            authenticated: false,
        }
    }

    /// Add an event
    pub fn with_event(mut self, start: DateTime<Utc>, summary: impl Into<String>) -> Self {
        self.events.push((start, summary.into()));
        self.events.sort_by_key(|(start, _)| *start);
        self
    }
}

#[async_trait]
impl CalendarClient for StaticCalendar {
    async fn list_events(&self, time_min: DateTime<Utc>, time_max: DateTime<Utc>) -> Result<Vec<CalendarEvent>> {
        if !self.authenticated {
            return Err(ConciergeError::NotAuthenticated("no calendar credential configured".into()));
        }

        Ok(self
            .events
            .iter()
            .filter(|(start, _)| *start >= time_min && *start <= time_max)
            .map(|(start, summary)| CalendarEvent {
                summary: summary.clone(),
                start: start.to_rfc3339(),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "StaticCalendar"
    }
}
