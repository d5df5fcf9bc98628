//! Normalization of heterogeneous upstream payload shapes.
//!
//! The upstream answers chat requests with either streaming `delta` chunks or
//! whole `message` objects, and completion requests with either `text` or
//! `message.content`. [`adapt_payload`] recognizes that closed set of shapes
//! and rewrites the message-shaped ones into the delta/text form. Anything
//! else is rejected.

use super::upstream::{UpstreamChoice, UpstreamPayload};
use super::{ChatDelta, EndpointKind};

/// Recognized upstream payload shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamShape {
    /// `choices[].delta`, already canonical for chat.
    ChatDelta,
    /// `choices[].message` on the chat endpoint.
    ChatMessage,
    /// `choices[].text`, already canonical for completions.
    CompletionText,
    /// `choices[].message.content` on the completions endpoint.
    CompletionMessage,
}

/// One choice after adaptation. Fields stay optional until the stream
/// processor's completeness check turns the payload into a `NormalizedEvent`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdaptedChoice {
    pub index: Option<u32>,
    pub delta: Option<ChatDelta>,
    pub text: Option<String>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdaptedPayload {
    pub id: Option<String>,
    pub model: Option<String>,
    pub shape: UpstreamShape,
    pub choices: Vec<AdaptedChoice>,
}

/// Classify a payload by looking at its first choice.
#[must_use]
pub fn classify(payload: &UpstreamPayload, endpoint: EndpointKind) -> Option<UpstreamShape> {
    let first = payload.first_choice()?;
    match endpoint {
        EndpointKind::Chat => match (&first.delta, &first.message) {
            (Some(_), _) => Some(UpstreamShape::ChatDelta),
            (None, Some(_)) => Some(UpstreamShape::ChatMessage),
            (None, None) => None,
        },
        EndpointKind::Completions => match (first.text.as_deref(), &first.message) {
            (Some(text), _) if !text.is_empty() => Some(UpstreamShape::CompletionText),
            (_, Some(_)) => Some(UpstreamShape::CompletionMessage),
            (Some(_), None) => Some(UpstreamShape::CompletionText),
            (None, None) => None,
        },
    }
}

/// Rewrite a parsed payload into the canonical delta/text form.
///
/// Returns `None` when the payload matches none of the recognized shapes.
/// Message-shaped payloads are re-indexed by choice position, which is the
/// position the upstream listed them in, so candidate order is unchanged.
#[must_use]
pub fn adapt_payload(payload: UpstreamPayload, endpoint: EndpointKind) -> Option<AdaptedPayload> {
    let shape = classify(&payload, endpoint)?;
    let UpstreamPayload {
        id, model, choices, ..
    } = payload;
    let choices = choices.unwrap_or_default();

    let choices = match shape {
        UpstreamShape::ChatDelta | UpstreamShape::CompletionText => {
            choices
                .into_iter()
                .enumerate()
                .map(|(position, choice)| passthrough_choice(position, choice))
                .collect()
        }
        UpstreamShape::ChatMessage => {
            tracing::debug!(choices = choices.len(), "adapting message-shaped chat payload");
            choices
                .into_iter()
                .enumerate()
                .map(|(position, choice)| message_to_delta(position, choice))
                .collect()
        }
        UpstreamShape::CompletionMessage => {
            tracing::debug!(
                choices = choices.len(),
                "adapting message-shaped completions payload"
            );
            choices
                .into_iter()
                .enumerate()
                .map(|(position, choice)| message_to_text(position, choice))
                .collect()
        }
    };

    Some(AdaptedPayload {
        id,
        model,
        shape,
        choices,
    })
}

/// A present index that does not fit `u32` (negative, too large) still counts
/// as present and is replaced by the choice's position.
fn passthrough_choice(position: usize, choice: UpstreamChoice) -> AdaptedChoice {
    AdaptedChoice {
        index: choice
            .index
            .map(|raw| u32::try_from(raw).unwrap_or_else(|_| position_index(position))),
        delta: choice.delta,
        text: choice.text,
        finish_reason: choice.finish_reason,
    }
}

fn message_to_delta(position: usize, choice: UpstreamChoice) -> AdaptedChoice {
    let delta = match choice.message {
        Some(message) => Some(ChatDelta {
            role: message.role,
            content: message.content,
        }),
        None => choice.delta,
    };
    AdaptedChoice {
        index: Some(position_index(position)),
        delta,
        text: None,
        finish_reason: choice.finish_reason,
    }
}

fn message_to_text(position: usize, choice: UpstreamChoice) -> AdaptedChoice {
    let text = match choice.message {
        Some(message) => message.content,
        None => choice.text,
    };
    AdaptedChoice {
        index: Some(position_index(position)),
        delta: None,
        text,
        finish_reason: choice.finish_reason,
    }
}

fn position_index(position: usize) -> u32 {
    u32::try_from(position).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: &str) -> UpstreamPayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_chat_delta_passes_through() {
        let adapted = adapt_payload(
            payload(r#"{"id":"gen-1","choices":[{"index":0,"delta":{"content":"Hi"}}]}"#),
            EndpointKind::Chat,
        )
        .unwrap();
        assert_eq!(adapted.shape, UpstreamShape::ChatDelta);
        assert_eq!(adapted.id.as_deref(), Some("gen-1"));
        assert_eq!(adapted.choices[0].index, Some(0));
        assert_eq!(
            adapted.choices[0].delta.as_ref().unwrap().content.as_deref(),
            Some("Hi")
        );
    }

    #[test]
    fn test_chat_delta_keeps_missing_index() {
        let adapted = adapt_payload(
            payload(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#),
            EndpointKind::Chat,
        )
        .unwrap();
        assert_eq!(adapted.choices[0].index, None);
    }

    #[test]
    fn test_chat_message_becomes_delta() {
        let adapted = adapt_payload(
            payload(
                r#"{"choices":[
                    {"message":{"role":"assistant","content":"hi"}},
                    {"message":{"role":"assistant","content":"there"}}
                ]}"#,
            ),
            EndpointKind::Chat,
        )
        .unwrap();
        assert_eq!(adapted.shape, UpstreamShape::ChatMessage);
        assert_eq!(adapted.choices.len(), 2);
        assert_eq!(adapted.choices[0].index, Some(0));
        assert_eq!(
            adapted.choices[0].delta,
            Some(ChatDelta {
                role: Some("assistant".to_string()),
                content: Some("hi".to_string()),
            })
        );
        assert_eq!(adapted.choices[1].index, Some(1));
        assert_eq!(
            adapted.choices[1].delta.as_ref().unwrap().content.as_deref(),
            Some("there")
        );
    }

    #[test]
    fn test_completion_text_passes_through() {
        let adapted = adapt_payload(
            payload(r#"{"choices":[{"index":0,"text":"once upon"}]}"#),
            EndpointKind::Completions,
        )
        .unwrap();
        assert_eq!(adapted.shape, UpstreamShape::CompletionText);
        assert_eq!(adapted.choices[0].text.as_deref(), Some("once upon"));
    }

    #[test]
    fn test_completion_message_becomes_text() {
        let adapted = adapt_payload(
            payload(r#"{"choices":[{"index":0,"message":{"content":"hi"}}]}"#),
            EndpointKind::Completions,
        )
        .unwrap();
        assert_eq!(adapted.shape, UpstreamShape::CompletionMessage);
        assert_eq!(adapted.choices[0].index, Some(0));
        assert_eq!(adapted.choices[0].text.as_deref(), Some("hi"));
    }

    #[test]
    fn test_empty_completion_text_prefers_message() {
        let adapted = adapt_payload(
            payload(r#"{"choices":[{"text":"","message":{"content":"hi"}}]}"#),
            EndpointKind::Completions,
        )
        .unwrap();
        assert_eq!(adapted.shape, UpstreamShape::CompletionMessage);
        assert_eq!(adapted.choices[0].text.as_deref(), Some("hi"));
    }

    #[test]
    fn test_empty_completion_text_without_message_is_canonical() {
        let adapted = adapt_payload(
            payload(r#"{"choices":[{"index":0,"text":""}]}"#),
            EndpointKind::Completions,
        )
        .unwrap();
        assert_eq!(adapted.shape, UpstreamShape::CompletionText);
        assert_eq!(adapted.choices[0].text.as_deref(), Some(""));
    }

    #[test]
    fn test_unrecognized_shapes_rejected() {
        assert!(adapt_payload(payload(r#"{"choices":[]}"#), EndpointKind::Chat).is_none());
        assert!(adapt_payload(payload(r#"{"id":"x"}"#), EndpointKind::Chat).is_none());
        assert!(adapt_payload(
            payload(r#"{"choices":[{"index":0,"finish_reason":"stop"}]}"#),
            EndpointKind::Chat
        )
        .is_none());
        assert!(adapt_payload(
            payload(r#"{"choices":[{"delta":{"content":"x"}}]}"#),
            EndpointKind::Completions
        )
        .is_none());
    }

    #[test]
    fn test_negative_index_counts_as_present() {
        let adapted = adapt_payload(
            payload(r#"{"choices":[{"index":-1,"delta":{"content":"x"}}]}"#),
            EndpointKind::Chat,
        )
        .unwrap();
        assert_eq!(adapted.choices[0].index, Some(0));
    }

    #[test]
    fn test_content_parts_message_becomes_delta() {
        let adapted = adapt_payload(
            payload(
                r#"{"choices":[{"message":{"role":"assistant","content":[{"type":"text","text":"Hi"}]}}]}"#,
            ),
            EndpointKind::Chat,
        )
        .unwrap();
        assert_eq!(adapted.shape, UpstreamShape::ChatMessage);
        assert_eq!(
            adapted.choices[0].delta.as_ref().unwrap().content.as_deref(),
            Some("Hi")
        );
    }
}
