//! Decoding of the chat endpoint's server-sent event stream

use crate::error::{Error, Result};
use crate::stream::{FailureKind, StreamEvent};
use async_stream::stream;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// Raw transport frames, already stripped of SSE framing.
#[derive(Debug)]
pub(crate) enum Frame {
    /// Connection established
    Open,
    /// One `data:` payload
    Data(String),
    /// Server closed the connection
    Closed,
    /// Connection or status failure
    Failed(Error),
}

/// Chunk payloads sent by the chat endpoint
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum WireChunk {
    TextDelta {
        #[serde(default)]
        delta: String,
    },
    ReasoningDelta {
        #[serde(default)]
        delta: String,
    },
    Finish {
        #[serde(default)]
        model: Option<String>,
    },
    Error {
        #[serde(default, alias = "errorText")]
        message: String,
    },
    #[serde(other)]
    Unknown,
}

/// Decode one `data:` payload.
///
/// Returns `Ok(None)` for chunks that carry nothing for us: unknown chunk
/// types and the `[DONE]` sentinel some servers append.
pub(crate) fn decode_chunk(data: &str, requested_model: &str) -> Result<Option<StreamEvent>> {
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }

    let chunk: WireChunk = serde_json::from_str(data)?;
    let event = match chunk {
        WireChunk::TextDelta { delta } => StreamEvent::TextDelta(delta),
        WireChunk::ReasoningDelta { delta } => StreamEvent::ReasoningDelta(delta),
        WireChunk::Finish { model } => StreamEvent::Finish {
            model: model
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| requested_model.to_string()),
        },
        WireChunk::Error { message } => StreamEvent::Error {
            kind: FailureKind::Transport,
            message: if message.is_empty() {
                "The model returned an error".to_string()
            } else {
                message
            },
        },
        WireChunk::Unknown => {
            tracing::debug!("Skipping unknown chunk: {}", data);
            return Ok(None);
        }
    };
    Ok(Some(event))
}

/// Turn raw frames into stream events.
///
/// Emits exactly one terminal event and then ends. Cancellation wins over any
/// frame that is ready at the same time and produces [`StreamEvent::Abort`].
pub(crate) fn decode_frames<S>(
    frames: S,
    cancel: CancellationToken,
    requested_model: String,
) -> impl Stream<Item = StreamEvent> + Send
where
    S: Stream<Item = Frame> + Send + 'static,
{
    stream! {
        let mut frames = Box::pin(frames);
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                frame = frames.next() => Some(frame),
            };

            let Some(frame) = next else {
                tracing::debug!("Stream cancelled");
                yield StreamEvent::Abort;
                return;
            };

            match frame {
                Some(Frame::Open) => {
                    tracing::debug!("Stream opened");
                }
                Some(Frame::Data(data)) => match decode_chunk(&data, &requested_model) {
                    Ok(Some(event)) => {
                        let terminal = event.is_terminal();
                        yield event;
                        if terminal {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::debug!("Malformed chunk {:?}: {}", data, e);
                        yield StreamEvent::failure(&e);
                        return;
                    }
                },
                Some(Frame::Failed(e)) => {
                    yield StreamEvent::failure(&e);
                    return;
                }
                Some(Frame::Closed) | None => {
                    yield StreamEvent::Error {
                        kind: FailureKind::Transport,
                        message: "connection closed before the response finished".to_string(),
                    };
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(json: &str) -> Frame {
        Frame::Data(json.to_string())
    }

    async fn collect(frames: Vec<Frame>, cancel: CancellationToken) -> Vec<StreamEvent> {
        decode_frames(futures::stream::iter(frames), cancel, "requested/model".into())
            .collect()
            .await
    }

    #[test]
    fn test_decode_deltas() {
        assert_eq!(
            decode_chunk(r#"{"type":"text-delta","delta":"hi"}"#, "m").unwrap(),
            Some(StreamEvent::TextDelta("hi".into()))
        );
        assert_eq!(
            decode_chunk(r#"{"type":"reasoning-delta","delta":"hmm"}"#, "m").unwrap(),
            Some(StreamEvent::ReasoningDelta("hmm".into()))
        );
    }

    #[test]
    fn test_finish_without_model_uses_requested() {
        assert_eq!(
            decode_chunk(r#"{"type":"finish"}"#, "openai/gpt-4o").unwrap(),
            Some(StreamEvent::Finish {
                model: "openai/gpt-4o".into()
            })
        );
        assert_eq!(
            decode_chunk(r#"{"type":"finish","model":"openai/gpt-4o-2024"}"#, "x").unwrap(),
            Some(StreamEvent::Finish {
                model: "openai/gpt-4o-2024".into()
            })
        );
    }

    #[test]
    fn test_unknown_chunk_is_skipped() {
        assert_eq!(
            decode_chunk(r#"{"type":"step-start","id":"s1"}"#, "m").unwrap(),
            None
        );
        assert_eq!(decode_chunk("[DONE]", "m").unwrap(), None);
    }

    #[test]
    fn test_malformed_chunk_is_error() {
        assert!(decode_chunk("{not json", "m").is_err());
    }

    #[tokio::test]
    async fn test_stream_ends_after_finish() {
        let events = collect(
            vec![
                Frame::Open,
                data(r#"{"type":"reasoning-delta","delta":"Let me think"}"#),
                data(r#"{"type":"text-delta","delta":"The answer is 4"}"#),
                data(r#"{"type":"finish","model":"m1"}"#),
                data(r#"{"type":"text-delta","delta":"late"}"#),
            ],
            CancellationToken::new(),
        )
        .await;

        assert_eq!(
            events,
            vec![
                StreamEvent::ReasoningDelta("Let me think".into()),
                StreamEvent::TextDelta("The answer is 4".into()),
                StreamEvent::Finish { model: "m1".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_close_without_finish_is_error() {
        let events = collect(
            vec![data(r#"{"type":"text-delta","delta":"partial"}"#), Frame::Closed],
            CancellationToken::new(),
        )
        .await;

        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[1],
            StreamEvent::Error {
                kind: FailureKind::Transport,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_exhausted_frames_is_error() {
        let events = collect(vec![Frame::Open], CancellationToken::new()).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], StreamEvent::Error { .. }));
    }

    #[tokio::test]
    async fn test_auth_failure() {
        let events = collect(
            vec![Frame::Failed(Error::from_status(401, ""))],
            CancellationToken::new(),
        )
        .await;
        assert!(matches!(
            events.as_slice(),
            [StreamEvent::Error {
                kind: FailureKind::Auth,
                ..
            }]
        ));
    }

    #[tokio::test]
    async fn test_server_error_chunk_is_terminal() {
        let events = collect(
            vec![
                data(r#"{"type":"error","message":"rate limited"}"#),
                data(r#"{"type":"finish"}"#),
            ],
            CancellationToken::new(),
        )
        .await;
        assert_eq!(
            events,
            vec![StreamEvent::Error {
                kind: FailureKind::Transport,
                message: "rate limited".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start_yields_single_abort() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let events = collect(
            vec![data(r#"{"type":"text-delta","delta":"x"}"#)],
            cancel,
        )
        .await;
        assert_eq!(events, vec![StreamEvent::Abort]);
    }

    #[tokio::test]
    async fn test_cancel_mid_stream() {
        let cancel = CancellationToken::new();
        let frames = futures::stream::iter(vec![data(r#"{"type":"text-delta","delta":"a"}"#)])
            .chain(futures::stream::pending());
        let mut events = Box::pin(decode_frames(frames, cancel.clone(), "m".into()));

        assert_eq!(
            events.next().await,
            Some(StreamEvent::TextDelta("a".into()))
        );
        cancel.cancel();
        assert_eq!(events.next().await, Some(StreamEvent::Abort));
        assert_eq!(events.next().await, None);
    }
}
