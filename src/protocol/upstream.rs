//! Wire types for the payloads carried by upstream `data:` lines.
//!
//! Every field is optional: the upstream mixes chat-delta, full-message and
//! completion-text shapes on the same endpoints, and the adapter decides which
//! one a payload actually is. Fields decode leniently, see [`super::lenient`].

use serde::Deserialize;

use super::{lenient, ChatDelta};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamPayload {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub choices: Option<Vec<UpstreamChoice>>,
    /// Mid-stream error object some providers emit instead of a chunk.
    #[serde(default, deserialize_with = "lenient::object")]
    pub error: Option<UpstreamStreamError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamChoice {
    /// Raw index as sent; may be negative or out of range.
    #[serde(default, deserialize_with = "lenient::index")]
    pub index: Option<i64>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub delta: Option<ChatDelta>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub message: Option<UpstreamMessage>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamMessage {
    #[serde(default, deserialize_with = "lenient::string")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient::content")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamStreamError {
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub message: Option<String>,
}

impl UpstreamPayload {
    #[must_use]
    pub fn choices(&self) -> &[UpstreamChoice] {
        self.choices.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn first_choice(&self) -> Option<&UpstreamChoice> {
        self.choices().first()
    }
}
