//! Message normalization: caller-supplied messages to the canonical turn sequence.

use serde::{Deserialize, Serialize};

use crate::types::{ContentPart, Role, ToolResult, ToolUseRequest, Turn, TurnContent};

/// A message as supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InboundMessage {
    pub role: Role,
    pub content: InboundContent,
}

/// Caller content: a plain string or a list of typed parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum InboundContent {
    Text(String),
    Parts(Vec<InboundPart>),
}

/// A caller content part. Kinds the model API does not accept are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundPart {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse(ToolUseRequest),
    ToolResult(ToolResult),
    #[serde(other)]
    Unsupported,
}

impl InboundMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: InboundContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: InboundContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: InboundContent::Text(text.into()),
        }
    }
}

/// Output of [`normalize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedConversation {
    /// The last non-empty system instruction, if any.
    pub system: Option<String>,
    pub turns: Vec<Turn>,
}

/// Split system instructions from conversational turns.
///
/// Later system messages replace earlier ones. Turns whose content is empty
/// after normalization are dropped.
pub fn normalize(messages: &[InboundMessage]) -> NormalizedConversation {
    let mut system = None;
    let mut turns = Vec::with_capacity(messages.len());

    for message in messages {
        if message.role == Role::System {
            let text = inbound_text(&message.content);
            if !text.trim().is_empty() {
                system = Some(text);
            }
            continue;
        }
        if let Some(content) = normalize_content(&message.content) {
            turns.push(Turn {
                role: message.role,
                content,
            });
        }
    }

    NormalizedConversation { system, turns }
}

/// Keep the most recent `window` turns, starting at a plain user turn.
///
/// When the window holds no plain user turn, it is widened back to the
/// latest one before the cut. A window of `0` keeps the whole history.
pub fn apply_history_window(mut turns: Vec<Turn>, window: usize) -> Vec<Turn> {
    if window == 0 || turns.len() <= window {
        return turns;
    }
    let cut = turns.len() - window;
    let is_plain_user = |turn: &Turn| turn.role == Role::User && !turn.is_tool_result_turn();
    let start = turns[cut..]
        .iter()
        .position(is_plain_user)
        .map(|offset| cut + offset)
        .or_else(|| turns[..cut].iter().rposition(is_plain_user))
        .unwrap_or(0);
    turns.split_off(start)
}

fn inbound_text(content: &InboundContent) -> String {
    match content {
        InboundContent::Text(text) => text.clone(),
        InboundContent::Parts(parts) => parts
            .iter()
            .filter_map(|part| match part {
                InboundPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(""),
    }
}

fn normalize_content(content: &InboundContent) -> Option<TurnContent> {
    match content {
        InboundContent::Text(text) => {
            (!text.trim().is_empty()).then(|| TurnContent::Text(text.clone()))
        }
        InboundContent::Parts(parts) => {
            let kept: Vec<ContentPart> = parts
                .iter()
                .filter_map(|part| match part {
                    InboundPart::Text { text } if !text.trim().is_empty() => {
                        Some(ContentPart::Text { text: text.clone() })
                    }
                    InboundPart::ToolUse(request) => Some(ContentPart::ToolUse(request.clone())),
                    InboundPart::ToolResult(result) => Some(ContentPart::ToolResult(result.clone())),
                    _ => None,
                })
                .collect();
            if kept.is_empty() {
                return None;
            }
            if kept.iter().all(|part| matches!(part, ContentPart::Text { .. })) {
                let text = kept
                    .iter()
                    .filter_map(|part| match part {
                        ContentPart::Text { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("");
                return Some(TurnContent::Text(text));
            }
            Some(TurnContent::Parts(kept))
        }
    }
}
