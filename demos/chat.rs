//! Minimal programmatic demonstration of the chat client.
//!
//! Reads `OPENAI_API_KEY` / `OPENAI_API_BASE` from the environment, performs
//! one streaming exchange, and prints the result. Run with:
//!
//! ```sh
//! OPENAI_API_KEY=sk-… cargo run --example chat
//! ```

use anyhow::Result;
use chatwire::{ChatClient, ClientConfig, ToolDescriptor};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("chatwire=info")),
        )
        .init();

    let config = ClientConfig::from_env("gpt-4o-mini")
        .map(|c| c.with_system_prompt("You are a concise assistant."))?;

    let tools = vec![ToolDescriptor {
        name: "get_weather".into(),
        description: "Look up the current weather for a city".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "city": {"type": "string", "description": "City name"}
            },
            "required": ["city"]
        }),
    }];

    let mut client = ChatClient::with_tools(config, tools)?;

    // The reply streams to stdout as it arrives; the return value holds the
    // accumulated content and any tool calls the model emitted.
    let reply = client.chat(Some("Hello, how are you?")).await?;
    println!();

    for call in &reply.tool_calls {
        println!("tool call {}: {}({})", call.id, call.name, call.arguments);
    }
    println!("history length: {}", client.history().len());

    Ok(())
}
