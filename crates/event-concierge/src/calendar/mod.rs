//! Calendar Integration
//!
//! Abstractions and implementations for calendar backends.

mod credentials;
mod google;
mod mock;

pub use credentials::{AuthorizedUser, CredentialProvider};
pub use google::GoogleCalendarClient;
pub use mock::StaticCalendar;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// An upcoming calendar entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub summary: String,

    /// ISO-8601 date-time, or a bare date for all-day events
    pub start: String,
}

/// Calendar client trait (Strategy pattern)
///
/// Missing or unusable credentials are reported as
/// [`crate::ConciergeError::NotAuthenticated`] so callers can degrade
/// gracefully.
#[async_trait]
pub trait CalendarClient: Send + Sync {
    /// Events starting between the two instants, in start order
    async fn list_events(&self, time_min: DateTime<Utc>, time_max: DateTime<Utc>) -> Result<Vec<CalendarEvent>>;

    /// Backend name
    fn name(&self) -> &str;
}
