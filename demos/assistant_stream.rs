//! Plain assistant-run session, no functions, streamed answers.
//!
//! Prerequisites:
//! - Set `OPENAI_API_KEY`
//!
//! Run:
//!   OPENAI_API_KEY=your_key cargo run --example assistant_stream

use tokio_util::sync::CancellationToken;
use turnflow::conversation::{RunSession, SessionConfig, StdinLineSource};
use turnflow::registry::FunctionRegistry;
use turnflow::streaming::StdoutSink;
use turnflow::transport::OpenAiTransport;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let api_key = match std::env::var("OPENAI_API_KEY") {
        Ok(key) => key,
        Err(_) => {
            eprintln!("Error: OPENAI_API_KEY environment variable is not set.");
            eprintln!("Run with: OPENAI_API_KEY=your_key cargo run --example assistant_stream");
            std::process::exit(1);
        }
    };

    let registry = FunctionRegistry::new();
    let transport = OpenAiTransport::new(api_key)?;
    let config = SessionConfig::new("gpt-4-turbo")
        .with_assistant_name("geo-politics-tutor")
        .with_instructions("You are a skilled tutor on geo-politic topics.");

    println!("Assistant session started. Type 'exit' to quit.\n");
    let session = RunSession::new(&transport, &registry, config);
    session
        .run(
            &mut StdinLineSource,
            &mut StdoutSink,
            &CancellationToken::new(),
        )
        .await?;
    println!("Bye.");
    Ok(())
}
