//! Routing human replies to pending prompts.
//!
//! Replies reach the hub either as a form submission (`{"perm_x":
//! "allow_once"}`) or as free text that names the prompt (`perm_x
//! allow_once`). Prompt ids carry a fixed prefix, so both shapes can be
//! recognized without asking the coordinator which prompts exist.

use parley_approval::{AnswerReceipt, EscalationCoordinator};
use serde_json::Value;
use tracing::debug;

use crate::error::{RuntimeError, RuntimeResult};

/// Pull `(prompt_id, answer)` out of a reply.
///
/// Returns `None` when no token carries `prefix` followed by at least one
/// more character, or when the id is not followed by an answer.
#[must_use]
pub fn extract_answer(reply: &str, prefix: &str) -> Option<(String, String)> {
    if prefix.is_empty() {
        return None;
    }
    let trimmed = reply.trim();
    if trimmed.starts_with('{')
        && let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(trimmed)
    {
        return fields.into_iter().find_map(|(key, value)| match value {
            Value::String(answer) if is_prompt_id(&key, prefix) => Some((key, answer)),
            _ => None,
        });
    }

    let mut tokens = trimmed.split_whitespace().map(|token| {
        token.trim_matches(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
    });
    let prompt_id = tokens.find(|token| is_prompt_id(token, prefix))?;
    let answer = tokens.find(|token| !token.is_empty())?;
    Some((prompt_id.to_string(), answer.to_string()))
}

fn is_prompt_id(token: &str, prefix: &str) -> bool {
    token.len() > prefix.len() && token.starts_with(prefix)
}

/// Extract an answer from a reply and deliver it.
///
/// # Errors
///
/// Returns [`RuntimeError::NoAnswer`] if the reply names no prompt, or the
/// coordinator's error (for example an unknown prompt).
pub fn route_reply(
    coordinator: &EscalationCoordinator,
    reply: &str,
) -> RuntimeResult<AnswerReceipt> {
    let (prompt_id, answer) =
        extract_answer(reply, coordinator.prompt_prefix()).ok_or(RuntimeError::NoAnswer)?;
    debug!(%prompt_id, %answer, "routing reply to prompt");
    Ok(coordinator.submit_answer(&prompt_id, &answer)?)
}
