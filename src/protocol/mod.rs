pub mod adapter;
mod lenient;
pub mod upstream;

pub use adapter::{adapt_payload, AdaptedChoice, AdaptedPayload, UpstreamShape};
pub use upstream::{UpstreamChoice, UpstreamMessage, UpstreamPayload};

use serde::{Deserialize, Serialize};

/// Which upstream endpoint a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    Chat,
    Completions,
}

impl EndpointKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EndpointKind::Chat => "chat",
            EndpointKind::Completions => "completions",
        }
    }
}

/// Incremental chat content carried by one choice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatDelta {
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub role: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::content",
        skip_serializing_if = "Option::is_none"
    )]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatChoice {
    pub index: u32,
    pub delta: ChatDelta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionChoice {
    pub index: u32,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// A partial-completion event in its one canonical shape.
///
/// Every choice list is non-empty. Consumers never need to look at how the
/// upstream originally shaped the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum NormalizedEvent {
    Chat {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        choices: Vec<ChatChoice>,
    },
    Completion {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        choices: Vec<CompletionChoice>,
    },
}

impl NormalizedEvent {
    #[must_use]
    pub fn endpoint(&self) -> EndpointKind {
        match self {
            NormalizedEvent::Chat { .. } => EndpointKind::Chat,
            NormalizedEvent::Completion { .. } => EndpointKind::Completions,
        }
    }

    /// Index of the first choice.
    #[must_use]
    pub fn index(&self) -> u32 {
        match self {
            NormalizedEvent::Chat { choices, .. } => choices.first().map_or(0, |c| c.index),
            NormalizedEvent::Completion { choices, .. } => choices.first().map_or(0, |c| c.index),
        }
    }

    /// Text carried by the first choice, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            NormalizedEvent::Chat { choices, .. } => {
                choices.first().and_then(|c| c.delta.content.as_deref())
            }
            NormalizedEvent::Completion { choices, .. } => {
                choices.first().map(|c| c.text.as_str())
            }
        }
    }

    #[must_use]
    pub fn finish_reason(&self) -> Option<&str> {
        match self {
            NormalizedEvent::Chat { choices, .. } => {
                choices.first().and_then(|c| c.finish_reason.as_deref())
            }
            NormalizedEvent::Completion { choices, .. } => {
                choices.first().and_then(|c| c.finish_reason.as_deref())
            }
        }
    }
}
