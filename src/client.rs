//! OpenAI-compatible chat client.
//!
//! Holds the configuration, tool descriptors, and conversation history for
//! one chat session, and performs one request/response exchange per call.
//! The streaming exchange consumes the SSE stream to completion — it is not
//! designed for partial or cancelable consumption, and two exchanges must
//! not run concurrently against the same client.

use std::io::Write;
use std::time::Duration;

use futures::StreamExt;
use reqwest::Client as HttpClient;

use crate::config::ClientConfig;
use crate::errors::ChatError;
use crate::history::Conversation;
use crate::streaming::{parse_completion_response, sse_stream, ChatAccumulator};
use crate::types::{ChatCompletionRequest, ChatResult, ToolDefinition, ToolDescriptor};

/// TCP connection timeout. Applies to connection establishment only — an
/// in-flight stream has no deadline; it ends when the provider closes it.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ─── ChatClient ──────────────────────────────────────────────────────────────

/// Client for an OpenAI-compatible chat completion endpoint.
///
/// Created from a [`ClientConfig`]; owns the mutable conversation history.
/// Each [`chat`](ChatClient::chat) call appends the exchange to history, so
/// the full conversation rides along on every request.
pub struct ChatClient {
    http: HttpClient,
    config: ClientConfig,
    tools: Vec<ToolDescriptor>,
    history: Conversation,
}

impl ChatClient {
    /// Create a client with no tools registered.
    pub fn new(config: ClientConfig) -> Result<Self, ChatError> {
        Self::with_tools(config, Vec::new())
    }

    /// Create a client with a set of callable tools.
    ///
    /// Seeds the history from the config's system prompt and context. Does
    /// NOT check connectivity — that happens on the first request.
    pub fn with_tools(
        config: ClientConfig,
        tools: Vec<ToolDescriptor>,
    ) -> Result<Self, ChatError> {
        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ChatError::Connection {
                endpoint: config.base_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let history =
            Conversation::new(config.system_prompt.as_deref(), config.context.as_deref());

        Ok(Self {
            http,
            config,
            tools,
            history,
        })
    }

    /// The model identifier requests are sent with.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// The conversation history accumulated so far.
    pub fn history(&self) -> &Conversation {
        &self.history
    }

    // ─── Chat (streaming) ────────────────────────────────────────────────

    /// Perform one streaming exchange.
    ///
    /// A present, non-empty prompt is appended to history as a user message
    /// before the request. The SSE stream is consumed to completion, echoing
    /// each text fragment to standard output as it arrives. After the stream
    /// ends, the assistant turn (content + finalized tool calls) is appended
    /// to history and the accumulated result returned.
    ///
    /// Transport and stream failures propagate unmodified; content
    /// accumulated before a mid-stream failure is not returned.
    pub async fn chat(&mut self, prompt: Option<&str>) -> Result<ChatResult, ChatError> {
        self.push_prompt(prompt);

        let body = self.build_request(true);
        let response = self.send(&body).await?;

        let chunks = sse_stream(response);
        futures::pin_mut!(chunks);

        let mut acc = ChatAccumulator::new();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            let Some(choice) = chunk.choices.first() else {
                continue;
            };
            if let Some(fragment) = acc.absorb(&choice.delta) {
                echo(fragment);
            }
        }

        let result = acc.finish();
        tracing::debug!(
            content_len = result.content.len(),
            tool_calls = result.tool_calls.len(),
            "stream complete"
        );

        self.history.push_assistant(&result.content, &result.tool_calls);
        Ok(result)
    }

    // ─── Chat (non-streaming) ────────────────────────────────────────────

    /// Perform one non-streaming exchange.
    ///
    /// One-shot variant of [`chat`](ChatClient::chat) for endpoints without
    /// SSE support: the complete response body is parsed in one piece and
    /// nothing is echoed. History semantics are identical.
    pub async fn chat_completion(
        &mut self,
        prompt: Option<&str>,
    ) -> Result<ChatResult, ChatError> {
        self.push_prompt(prompt);

        let body = self.build_request(false);
        let response = self.send(&body).await?;

        let text = response.text().await.map_err(|e| ChatError::Stream {
            reason: format!("failed to read response body: {e}"),
        })?;
        let result = parse_completion_response(&text)?;

        self.history.push_assistant(&result.content, &result.tool_calls);
        Ok(result)
    }

    // ─── Request plumbing ────────────────────────────────────────────────

    /// Append the prompt to history, if present and non-empty.
    fn push_prompt(&mut self, prompt: Option<&str>) {
        if let Some(prompt) = prompt {
            if !prompt.is_empty() {
                self.history.push_user(prompt);
            }
        }
    }

    /// Build the request body from the held history and tool descriptors.
    fn build_request(&self, stream: bool) -> ChatCompletionRequest {
        let tools: Option<Vec<ToolDefinition>> = if self.tools.is_empty() {
            None
        } else {
            Some(self.tools.iter().map(ToolDefinition::from).collect())
        };

        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: self.history.messages().to_vec(),
            tool_choice: tools.as_ref().map(|_| "auto".to_string()),
            tools,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream,
        }
    }

    /// POST the request and check the response status.
    async fn send(&self, body: &ChatCompletionRequest) -> Result<reqwest::Response, ChatError> {
        let url = format!("{}/chat/completions", self.config.base_url);

        // Log request metadata, not the full body — it can be huge.
        tracing::info!(
            url = %url,
            model = %body.model,
            message_count = body.messages.len(),
            tool_count = body.tools.as_ref().map(|t| t.len()).unwrap_or(0),
            stream = body.stream,
            "=== CHAT REQUEST ==="
        );

        let mut request = self.http.post(&url).bearer_auth(&self.config.api_key).json(body);
        if body.stream {
            request = request.header("Accept", "text/event-stream");
        }

        let response = request.send().await.map_err(|e| ChatError::Connection {
            endpoint: url.clone(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ChatError::Http {
                status: status.as_u16(),
                body: body_text,
            });
        }

        Ok(response)
    }
}

/// Write a text fragment to stdout immediately.
///
/// Echo is best-effort: a failed stdout write never fails the exchange.
fn echo(fragment: &str) {
    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(fragment.as_bytes());
    let _ = stdout.flush();
}

// ─── Tests ───────────────────────────────────────────────────────────────────
