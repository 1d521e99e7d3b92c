//! SSE streaming response parser and chunk accumulator.
//!
//! Reads a `reqwest::Response` as a byte stream, splits on SSE boundaries
//! (`data: …\n\n`), parses each event as JSON, and folds the chunk sequence
//! into a final [`ChatResult`] — accumulating text fragments and indexed
//! tool-call fragments across deltas.

use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::ChatError;
use crate::types::{ChatCompletionChunk, ChatResult, ChunkDelta, ToolCall};

// ─── SSE event stream ────────────────────────────────────────────────────────

/// Parse raw SSE bytes into [`ChatCompletionChunk`]s.
///
/// Splits the HTTP body into SSE events, parses each `data:` payload, skips
/// keep-alives and comments, and ends the stream on `[DONE]`. A trailing
/// unterminated event at EOF is still processed. Malformed chunk JSON is
/// yielded as an error item; the stream continues past it.
pub fn sse_stream(
    response: reqwest::Response,
) -> impl Stream<Item = Result<ChatCompletionChunk, ChatError>> {
    let byte_stream = response.bytes_stream();

    // Buffer holds incomplete SSE lines across chunk boundaries.
    stream::unfold(
        (byte_stream, String::new(), false),
        |(mut byte_stream, mut buffer, done)| async move {
            if done {
                return None;
            }
            loop {
                // A complete SSE event ends at a blank line.
                if let Some(event_end) = buffer.find("\n\n") {
                    let event = buffer[..event_end].to_string();
                    buffer = buffer[event_end + 2..].to_string();

                    match parse_event(&event) {
                        Ok(SseEvent::Chunk(chunk)) => {
                            return Some((Ok(chunk), (byte_stream, buffer, false)));
                        }
                        Ok(SseEvent::Skip) => continue,
                        Ok(SseEvent::Done) => return None,
                        Err(e) => return Some((Err(e), (byte_stream, buffer, false))),
                    }
                }

                // Need more data from the transport.
                match byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                    }
                    Some(Err(e)) => {
                        return Some((
                            Err(ChatError::Stream {
                                reason: format!("stream read error: {e}"),
                            }),
                            (byte_stream, buffer, true),
                        ));
                    }
                    None => {
                        // EOF — process any unterminated trailing event.
                        if !buffer.trim().is_empty() {
                            let event = std::mem::take(&mut buffer);
                            return match parse_event(event.trim()) {
                                Ok(SseEvent::Chunk(chunk)) => {
                                    Some((Ok(chunk), (byte_stream, buffer, true)))
                                }
                                Ok(_) => None,
                                Err(e) => Some((Err(e), (byte_stream, buffer, true))),
                            };
                        }
                        return None;
                    }
                }
            }
        },
    )
}

/// Outcome of parsing one SSE event.
enum SseEvent {
    Chunk(ChatCompletionChunk),
    /// Keep-alive, comment, or event with no data payload.
    Skip,
    /// The `[DONE]` sentinel — end of stream.
    Done,
}

/// Parse a single SSE event string (may contain multiple `data:` lines).
fn parse_event(event: &str) -> Result<SseEvent, ChatError> {
    let mut data = String::new();

    for line in event.lines() {
        if let Some(rest) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) {
            let rest = rest.trim();
            if rest == "[DONE]" {
                return Ok(SseEvent::Done);
            }
            data.push_str(rest);
        }
        // Non-data lines (comments, event types) are ignored.
    }

    if data.is_empty() {
        return Ok(SseEvent::Skip);
    }

    let chunk = serde_json::from_str(&data).map_err(|e| ChatError::Stream {
        reason: format!("failed to parse SSE chunk: {e} (data: {data})"),
    })?;
    Ok(SseEvent::Chunk(chunk))
}

// ─── Accumulator ─────────────────────────────────────────────────────────────

/// Running state folded over the chunk sequence.
///
/// Two accumulators: the content string and the in-flight tool-call list,
/// addressed by the stream-assigned index. The list grows lazily — a fragment
/// for an unseen index appends empty placeholders until the index is covered,
/// so entries are never inserted mid-list, reordered, or dropped.
#[derive(Debug, Default)]
pub struct ChatAccumulator {
    content: String,
    pending: Vec<PendingToolCall>,
}

/// An in-flight tool call, built incrementally across deltas.
#[derive(Debug, Clone, Default)]
struct PendingToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

impl ChatAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one chunk delta.
    ///
    /// Returns the text fragment this delta carried, if any, so the caller can
    /// echo it as it arrives. A missing or empty content field contributes
    /// zero characters. For tool-call fragments: an id or name fragment
    /// overwrites the entry's field, an arguments fragment is concatenated —
    /// argument JSON routinely spans multiple chunks.
    pub fn absorb<'d>(&mut self, delta: &'d ChunkDelta) -> Option<&'d str> {
        if let Some(calls) = &delta.tool_calls {
            for tc in calls {
                let index = tc.index.unwrap_or(0) as usize;
                while self.pending.len() <= index {
                    self.pending.push(PendingToolCall::default());
                }
                let entry = &mut self.pending[index];
                if let Some(id) = &tc.id {
                    entry.id = Some(id.clone());
                }
                if let Some(function) = &tc.function {
                    if let Some(name) = &function.name {
                        entry.name = name.clone();
                    }
                    if let Some(args) = &function.arguments {
                        entry.arguments.push_str(args);
                    }
                }
            }
        }

        let fragment = delta.content.as_deref().filter(|c| !c.is_empty())?;
        self.content.push_str(fragment);
        Some(fragment)
    }

    /// Number of in-flight tool-call entries, placeholders included.
    pub fn pending_tool_calls(&self) -> usize {
        self.pending.len()
    }

    /// Finalize after the stream is exhausted.
    ///
    /// Entries whose id never arrived get a generated `call_<uuid>` id. No
    /// entry is dropped — an index once seen stays in the result.
    pub fn finish(self) -> ChatResult {
        let tool_calls = self
            .pending
            .into_iter()
            .map(|p| ToolCall {
                id: p.id.unwrap_or_else(|| format!("call_{}", Uuid::new_v4())),
                name: p.name,
                arguments: p.arguments,
            })
            .collect();

        ChatResult {
            content: self.content,
            tool_calls,
        }
    }

    /// Fold an entire chunk stream into a [`ChatResult`].
    pub async fn collect<S>(chunks: S) -> Result<ChatResult, ChatError>
    where
        S: Stream<Item = Result<ChatCompletionChunk, ChatError>>,
    {
        futures::pin_mut!(chunks);
        let mut acc = Self::new();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            if let Some(choice) = chunk.choices.first() {
                acc.absorb(&choice.delta);
            }
        }
        Ok(acc.finish())
    }
}

// ─── Non-streaming response ──────────────────────────────────────────────────

/// Parse a complete (non-streaming) response body into a [`ChatResult`].
///
/// Used by the one-shot completion path when streaming is not wanted or not
/// supported by the endpoint.
pub fn parse_completion_response(body: &str) -> Result<ChatResult, ChatError> {
    #[derive(Deserialize)]
    struct CompletionResponse {
        choices: Vec<CompletionChoice>,
    }

    #[derive(Deserialize)]
    struct CompletionChoice {
        message: CompletionMessage,
    }

    #[derive(Deserialize)]
    struct CompletionMessage {
        content: Option<String>,
        tool_calls: Option<Vec<CompletionToolCall>>,
    }

    #[derive(Deserialize)]
    struct CompletionToolCall {
        id: Option<String>,
        function: CompletionFunction,
    }

    #[derive(Deserialize)]
    struct CompletionFunction {
        name: String,
        arguments: String,
    }

    let resp: CompletionResponse =
        serde_json::from_str(body).map_err(|e| ChatError::Stream {
            reason: format!("failed to parse completion response: {e}"),
        })?;

    let choice = resp.choices.into_iter().next().ok_or(ChatError::Stream {
        reason: "empty choices array".into(),
    })?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCall {
            id: tc.id.unwrap_or_else(|| format!("call_{}", Uuid::new_v4())),
            name: tc.function.name,
            arguments: tc.function.arguments,
        })
        .collect();

    Ok(ChatResult {
        content: choice.message.content.unwrap_or_default(),
        tool_calls,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkChoice;

    fn delta(json: serde_json::Value) -> ChunkDelta {
        serde_json::from_value(json).unwrap()
    }

    fn chunk(deltas: serde_json::Value) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: None,
            choices: vec![ChunkChoice {
                delta: delta(deltas),
                finish_reason: None,
            }],
        }
    }

    // ── Accumulator ──

    #[test]
    fn test_content_concatenated_in_arrival_order() {
        let mut acc = ChatAccumulator::new();
        assert_eq!(acc.absorb(&delta(serde_json::json!({"content": "Hel"}))), Some("Hel"));
        assert_eq!(acc.absorb(&delta(serde_json::json!({"content": "lo, "}))), Some("lo, "));
        assert_eq!(acc.absorb(&delta(serde_json::json!({"content": "world"}))), Some("world"));

        let result = acc.finish();
        assert_eq!(result.content, "Hello, world");
        assert!(result.tool_calls.is_empty());
    }

    #[test]
    fn test_missing_content_contributes_nothing() {
        let mut acc = ChatAccumulator::new();
        acc.absorb(&delta(serde_json::json!({"content": "a"})));
        assert_eq!(acc.absorb(&delta(serde_json::json!({}))), None);
        assert_eq!(acc.absorb(&delta(serde_json::json!({"content": ""}))), None);
        acc.absorb(&delta(serde_json::json!({"content": "b"})));

        let result = acc.finish();
        assert_eq!(result.content, "ab");
        assert!(!result.content.contains("null"));
    }

    #[test]
    fn test_tool_call_fields_arrive_across_chunks() {
        let mut acc = ChatAccumulator::new();
        acc.absorb(&delta(serde_json::json!({
            "tool_calls": [{"index": 0, "id": "a", "function": {"name": "foo"}}]
        })));
        acc.absorb(&delta(serde_json::json!({
            "tool_calls": [{"index": 0, "function": {"arguments": "{}"}}]
        })));

        let result = acc.finish();
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].id, "a");
        assert_eq!(result.tool_calls[0].name, "foo");
        assert_eq!(result.tool_calls[0].arguments, "{}");
    }

    #[test]
    fn test_arguments_concatenated_across_chunks() {
        let mut acc = ChatAccumulator::new();
        acc.absorb(&delta(serde_json::json!({
            "tool_calls": [{"index": 0, "id": "a", "function": {"name": "get_weather", "arguments": "{\"ci"}}]
        })));
        acc.absorb(&delta(serde_json::json!({
            "tool_calls": [{"index": 0, "function": {"arguments": "ty\":\"Os"}}]
        })));
        acc.absorb(&delta(serde_json::json!({
            "tool_calls": [{"index": 0, "function": {"arguments": "lo\"}"}}]
        })));

        let result = acc.finish();
        assert_eq!(result.tool_calls[0].arguments, r#"{"city":"Oslo"}"#);
    }

    #[test]
    fn test_sparse_index_backfills_placeholders() {
        let mut acc = ChatAccumulator::new();
        acc.absorb(&delta(serde_json::json!({
            "tool_calls": [{"index": 2, "id": "c", "function": {"name": "third"}}]
        })));
        assert_eq!(acc.pending_tool_calls(), 3);

        let result = acc.finish();
        assert_eq!(result.tool_calls.len(), 3);
        assert_eq!(result.tool_calls[2].id, "c");
        assert_eq!(result.tool_calls[2].name, "third");
        // Placeholders are kept, with generated ids.
        assert!(result.tool_calls[0].name.is_empty());
        assert!(result.tool_calls[0].id.starts_with("call_"));
    }

    #[test]
    fn test_out_of_order_index_fills_existing_entry() {
        let mut acc = ChatAccumulator::new();
        acc.absorb(&delta(serde_json::json!({
            "tool_calls": [{"index": 1, "id": "b", "function": {"name": "second"}}]
        })));
        acc.absorb(&delta(serde_json::json!({
            "tool_calls": [{"index": 0, "id": "a", "function": {"name": "first"}}]
        })));
        assert_eq!(acc.pending_tool_calls(), 2);

        let result = acc.finish();
        assert_eq!(result.tool_calls[0].name, "first");
        assert_eq!(result.tool_calls[1].name, "second");
    }

    #[test]
    fn test_id_and_name_overwrite_not_append() {
        let mut acc = ChatAccumulator::new();
        acc.absorb(&delta(serde_json::json!({
            "tool_calls": [{"index": 0, "id": "tmp", "function": {"name": "draft"}}]
        })));
        acc.absorb(&delta(serde_json::json!({
            "tool_calls": [{"index": 0, "id": "final", "function": {"name": "get_weather"}}]
        })));

        let result = acc.finish();
        assert_eq!(result.tool_calls[0].id, "final");
        assert_eq!(result.tool_calls[0].name, "get_weather");
    }

    #[test]
    fn test_missing_index_defaults_to_zero() {
        let mut acc = ChatAccumulator::new();
        acc.absorb(&delta(serde_json::json!({
            "tool_calls": [{"id": "a", "function": {"name": "foo", "arguments": "{}"}}]
        })));

        let result = acc.finish();
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].name, "foo");
    }

    #[tokio::test]
    async fn test_collect_folds_chunk_stream() {
        let chunks = vec![
            Ok(chunk(serde_json::json!({"content": "The weather"}))),
            Ok(chunk(serde_json::json!({"content": " is sunny."}))),
            Ok(chunk(serde_json::json!({
                "tool_calls": [{"index": 0, "id": "call_x", "function": {"name": "get_weather", "arguments": "{\"city\":"}}]
            }))),
            Ok(chunk(serde_json::json!({
                "tool_calls": [{"index": 0, "function": {"arguments": "\"Oslo\"}"}}]
            }))),
        ];
        let result = ChatAccumulator::collect(stream::iter(chunks)).await.unwrap();
        assert_eq!(result.content, "The weather is sunny.");
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].arguments, r#"{"city":"Oslo"}"#);
    }

    #[tokio::test]
    async fn test_collect_propagates_stream_error() {
        let chunks: Vec<Result<ChatCompletionChunk, ChatError>> = vec![
            Ok(chunk(serde_json::json!({"content": "partial"}))),
            Err(ChatError::Stream {
                reason: "connection reset".into(),
            }),
        ];
        let result = ChatAccumulator::collect(stream::iter(chunks)).await;
        assert!(matches!(result, Err(ChatError::Stream { .. })));
    }

    // ── SSE event parsing ──

    #[test]
    fn test_parse_event_data_line() {
        let event = r#"data: {"id":"x","choices":[{"delta":{"content":"hi"},"finish_reason":null}]}"#;
        match parse_event(event).unwrap() {
            SseEvent::Chunk(chunk) => {
                assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("hi"));
            }
            _ => panic!("expected a chunk"),
        }
    }

    #[test]
    fn test_parse_event_done_sentinel() {
        assert!(matches!(parse_event("data: [DONE]").unwrap(), SseEvent::Done));
        // No space after the colon is also valid SSE.
        assert!(matches!(parse_event("data:[DONE]").unwrap(), SseEvent::Done));
    }

    #[test]
    fn test_parse_event_skips_comments_and_keepalives() {
        assert!(matches!(parse_event(": keep-alive").unwrap(), SseEvent::Skip));
        assert!(matches!(parse_event("event: ping").unwrap(), SseEvent::Skip));
        assert!(matches!(parse_event("").unwrap(), SseEvent::Skip));
    }

    #[test]
    fn test_parse_event_concatenates_multiple_data_lines() {
        let event = "data: {\"choices\":[{\"delta\":\ndata: {\"content\":\"hi\"},\"finish_reason\":null}]}";
        match parse_event(event).unwrap() {
            SseEvent::Chunk(chunk) => {
                assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("hi"));
            }
            _ => panic!("expected a chunk"),
        }
    }

    #[test]
    fn test_parse_event_malformed_json_is_error() {
        let result = parse_event("data: {not json");
        assert!(matches!(result, Err(ChatError::Stream { .. })));
    }

    // ── Non-streaming parse ──

    #[test]
    fn test_parse_completion_with_content() {
        let body = r#"{
            "choices": [{
                "message": {"role": "assistant", "content": "Hello, world!"},
                "finish_reason": "stop"
            }]
        }"#;
        let result = parse_completion_response(body).unwrap();
        assert_eq!(result.content, "Hello, world!");
        assert!(result.tool_calls.is_empty());
    }

    #[test]
    fn test_parse_completion_with_tool_calls() {
        let body = r#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {
                            "name": "get_weather",
                            "arguments": "{\"city\": \"Oslo\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }"#;
        let result = parse_completion_response(body).unwrap();
        assert_eq!(result.content, "");
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].id, "call_abc");
        assert_eq!(result.tool_calls[0].name, "get_weather");
        assert_eq!(result.tool_calls[0].arguments, "{\"city\": \"Oslo\"}");
    }

    #[test]
    fn test_parse_completion_generates_missing_id() {
        let body = r#"{
            "choices": [{
                "message": {
                    "content": "",
                    "tool_calls": [{"function": {"name": "foo", "arguments": "{}"}}]
                }
            }]
        }"#;
        let result = parse_completion_response(body).unwrap();
        assert!(result.tool_calls[0].id.starts_with("call_"));
    }

    #[test]
    fn test_parse_completion_empty_choices_is_error() {
        let result = parse_completion_response(r#"{"choices": []}"#);
        assert!(matches!(result, Err(ChatError::Stream { .. })));
    }
}
