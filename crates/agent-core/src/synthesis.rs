//! Response Synthesis
//!
//! Builds the final prompt (reply + lead extraction) and decodes the model's
//! answer into a [`Generation`]. Decoding is strict; anything that does not
//! match the two-key contract falls back to a default generation instead of
//! failing the turn.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::message::Turn;

/// Reply used when the model produced nothing usable.
pub const APOLOGY_REPLY: &str = "I could not process your request. Could you try again?";

/// Context line used when the decision step requested no tools.
pub const NO_TOOLS_NOTICE: &str = "No tools were used in this turn.";

/// Extraction schema and output contract appended to the persona prompt.
pub const EXTRACTION_CONTRACT: &str = r#"**Data extraction instructions:**
-   `name`: The user's full name.
-   `email`: The user's email address.
-   `phone`: The user's phone number.
-   `eventType`: The type of event. Must be one of: "Wedding", "Birthday / Social", "Corporate", "Other".
-   `message`: A concise summary of the user's request in 1-2 short sentences.

**Required Output Format:**
Your final answer MUST be a single valid JSON object with exactly two keys:
1.  `reply`: (string) Your conversational response to the user.
2.  `formData`: (JSON object) Only the fields above that you have extracted. If a field is not yet known, omit it or set it to null."#;

const FINAL_INSTRUCTION: &str = "**Your Answer (only the JSON object):**";

/// Event category captured in the lead form
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "Wedding")]
    Wedding,
    #[serde(rename = "Birthday / Social")]
    BirthdaySocial,
    #[serde(rename = "Corporate")]
    Corporate,
    #[serde(rename = "Other")]
    Other,
}

/// Lead-capture fields extracted from the conversation
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FormData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,

    /// Short summary of the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FormData {
    /// True when no field has been extracted yet
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Final output of one graph invocation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Generation {
    pub reply: String,

    #[serde(rename = "formData")]
    pub form_data: FormData,
}

impl Generation {
    /// Generation carrying only a reply
    pub fn reply_only(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            form_data: FormData::default(),
        }
    }
}

/// Assemble the synthesis prompt.
///
/// Order: instructions, prior history, tool context, question, output reminder.
pub fn build_prompt(
    persona: &str,
    history: &[Turn],
    question: &str,
    tool_output: Option<&BTreeMap<String, String>>,
) -> Vec<Turn> {
    let mut turns = Vec::with_capacity(history.len() + 4);
    turns.push(Turn::system(format!("{persona}\n\n{EXTRACTION_CONTRACT}")));
    turns.extend_from_slice(history);
    turns.push(Turn::system(render_tool_output(tool_output)));
    turns.push(Turn::user(question));
    turns.push(Turn::system(FINAL_INSTRUCTION));
    turns
}

/// Labeled list of tool results, or the "no tools" notice.
pub fn render_tool_output(tool_output: Option<&BTreeMap<String, String>>) -> String {
    match tool_output {
        Some(outputs) if !outputs.is_empty() => {
            let lines: Vec<String> = outputs
                .iter()
                .map(|(tool, output)| format!("- {tool}: {output}"))
                .collect();
            format!("Tools used:\n{}", lines.join("\n"))
        }
        _ => NO_TOOLS_NOTICE.to_string(),
    }
}

/// Remove a code fence wrapped around the whole answer.
pub fn strip_code_fence(raw: &str) -> &str {
    let text = raw.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };

    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Strictly decode a synthesis answer.
pub fn decode_generation(raw: &str) -> Result<Generation> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(AgentError::MalformedSynthesis("empty answer".into()));
    }

    let generation: Generation = serde_json::from_str(body)
        .map_err(|e| AgentError::MalformedSynthesis(e.to_string()))?;

    if generation.reply.trim().is_empty() {
        return Err(AgentError::MalformedSynthesis("empty reply".into()));
    }

    Ok(generation)
}

/// Decode a synthesis answer, falling back instead of failing.
///
/// Empty answers become [`APOLOGY_REPLY`]; anything else that does not decode
/// is passed through verbatim as the reply. `formData` is empty in both cases.
pub fn parse_generation(raw: &str) -> Generation {
    match decode_generation(raw) {
        Ok(generation) => generation,
        Err(e) => {
            tracing::warn!(error = %e, "Synthesis answer did not match the reply contract");
            if strip_code_fence(raw).is_empty() {
                Generation::reply_only(APOLOGY_REPLY)
            } else {
                Generation::reply_only(raw)
            }
        }
    }
}
