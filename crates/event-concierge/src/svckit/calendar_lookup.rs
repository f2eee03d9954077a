//! Calendar Lookup Tool
//!
//! Lists the owner's upcoming calendar events so the assistant can talk
//! about availability.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use agent_core::{AgentError, Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema, tool::ParameterSchema};

use crate::calendar::CalendarClient;
use crate::error::ConciergeError;

pub const TOOL_NAME: &str = "get_calendar_events";

pub const NOT_AUTHENTICATED_REPLY: &str =
    "Error: The user is not authenticated. Please authorize access to your calendar.";

/// Tool for listing upcoming calendar events
pub struct CalendarLookupTool {
    calendar: Arc<dyn CalendarClient>,
}

impl CalendarLookupTool {
    pub fn new(calendar: Arc<dyn CalendarClient>) -> Self {
        Self { calendar }
    }
}

/// `days_from_now` as a non-negative day count; numeric strings are accepted
fn days_argument(call: &ToolCall) -> CoreResult<i64> {
    let value = call
        .arguments
        .get("days_from_now")
        .ok_or_else(|| AgentError::ToolValidation("Missing required parameter: days_from_now".into()))?;

    #[allow(clippy::cast_possible_truncation)]
    let days = value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| AgentError::ToolValidation(format!("days_from_now must be an integer, got {value}")))?;

    if days < 0 {
        return Err(AgentError::ToolValidation(format!(
            "days_from_now must not be negative, got {days}"
        )));
    }
    Ok(days)
}

#[async_trait]
impl Tool for CalendarLookupTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: TOOL_NAME.into(),
            description: "List calendar events from now until the given number of days ahead. \
                          Use it to check availability for a date."
                .into(),
            parameters: vec![ParameterSchema {
                name: "days_from_now".into(),
                param_type: "integer".into(),
                description: "How many days ahead to look (0 or more)".into(),
                required: true,
                default: None,
                enum_values: None,
            }],
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let days = days_argument(call)?;
        let span = Duration::try_days(days)
            .ok_or_else(|| AgentError::ToolValidation(format!("days_from_now is too large: {days}")))?;

        let now = Utc::now();
        let until = now
            .checked_add_signed(span)
            .ok_or_else(|| AgentError::ToolValidation(format!("days_from_now is too large: {days}")))?;

        match self.calendar.list_events(now, until).await {
            Ok(events) if events.is_empty() => Ok(ToolResult::success(
                TOOL_NAME,
                format!("No events found in the next {days} days."),
            )),
            Ok(events) => {
                let lines: Vec<String> = events
                    .iter()
                    .map(|e| format!("- {} (Start: {})", e.summary, e.start))
                    .collect();
                Ok(ToolResult::success(TOOL_NAME, format!("Found events:\n{}", lines.join("\n"))))
            }
            Err(ConciergeError::NotAuthenticated(reason)) => {
                tracing::warn!(%reason, calendar = self.calendar.name(), "Calendar not authorized");
                Ok(ToolResult::success(TOOL_NAME, NOT_AUTHENTICATED_REPLY))
            }
            Err(e) => {
                tracing::error!(error = %e, calendar = self.calendar.name(), "Calendar lookup failed");
                Ok(ToolResult::failure(
                    TOOL_NAME,
                    format!("An error occurred with the calendar API: {e}"),
                ))
            }
        }
    }
}
