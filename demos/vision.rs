//! One-shot multimodal turn: describe an image from a URL or a local file.
//!
//! Local files are inlined as base64 data URLs; anything starting with
//! `http` is passed through as-is.
//!
//! Prerequisites:
//! - Set `OPENAI_API_KEY`
//!
//! Run:
//!   OPENAI_API_KEY=your_key cargo run --example vision -- ./photo.jpg

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use turnflow::streaming::{collect_turn, StdoutSink};
use turnflow::transport::{ChatTransport, OpenAiTransport};
use turnflow::types::{ContentPart, Message, TurnRequest};

const DEFAULT_IMAGE: &str =
    "https://upload.wikimedia.org/wikipedia/commons/e/e8/Machu_Picchu%2C_Peru.jpg";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let api_key = match std::env::var("OPENAI_API_KEY") {
        Ok(key) => key,
        Err(_) => {
            eprintln!("Error: OPENAI_API_KEY environment variable is not set.");
            eprintln!("Run with: OPENAI_API_KEY=your_key cargo run --example vision");
            std::process::exit(1);
        }
    };

    let image = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_IMAGE.to_string());
    let part = if image.starts_with("http") {
        ContentPart::image_url(&image)
    } else {
        ContentPart::image_from_file(&image)?
    };

    let request = TurnRequest::new("gpt-4-turbo")
        .with_messages(vec![Message::user_parts(vec![
            ContentPart::text("What do you see in this image?"),
            part,
        ])])
        .with_max_tokens(300);

    let transport = OpenAiTransport::new(api_key)?;
    let deltas = transport.stream_turn(&request).await?;
    let outcome = collect_turn(deltas, &mut StdoutSink, &CancellationToken::new()).await?;
    println!("\n\n[finish: {}]", outcome.finish_reason);
    Ok(())
}
