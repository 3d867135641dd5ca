//! Interactive chat with streamed answers and live function calls.
//!
//! This example verifies that:
//! - registered functions are advertised on every request
//! - a turn that pauses for tools is resumed with their outputs
//! - the final answer streams to the terminal fragment by fragment
//!
//! Prerequisites:
//! - Set `OPENAI_API_KEY`
//!
//! Run:
//!   OPENAI_API_KEY=your_key cargo run --example chat_function_stream

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use turnflow::conversation::{ChatSession, SessionConfig, StdinLineSource};
use turnflow::registry::{
    FunctionRegistry, FunctionSchema, FunctionSpec, HandlerFn, ParameterSpec,
};
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
            eprintln!(
                "Run with: OPENAI_API_KEY=your_key cargo run --example chat_function_stream"
            );
            std::process::exit(1);
        }
    };

    let registry = weather_registry()?;
    let transport = OpenAiTransport::new(api_key)?;
    let config = SessionConfig::new("gpt-4-turbo")
        .with_instructions("You are a skilled tutor on geo-politic topics.")
        .with_temperature(0.2);

    println!("Chat started. Ask about the weather somewhere; type 'exit' to quit.\n");
    let mut session = ChatSession::new(&transport, &registry, config);
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

fn weather_registry() -> Result<FunctionRegistry, Box<dyn std::error::Error>> {
    let mut registry = FunctionRegistry::new();
    registry.register(
        FunctionSpec::new(
            "get_current_temperature",
            "Get the current temperature for a specific location",
        )
        .schema(
            FunctionSchema::object()
                .parameter(
                    ParameterSpec::string("location")
                        .description("The city and state, e.g., San Francisco, CA")
                        .required(),
                )
                .parameter(
                    ParameterSpec::string("unit")
                        .description("The temperature unit to use")
                        .one_of(&["Celsius", "Fahrenheit"])
                        .required(),
                ),
        ),
        HandlerFn(|args: Value| async move {
            let unit = args["unit"].as_str().unwrap_or("Celsius").to_string();
            let temperature = (pseudo_random(&args.to_string(), -10.0, 35.0) * 10.0).round() / 10.0;
            Ok(json!({ "temperature": temperature, "unit": unit }))
        }),
    )?;
    registry.register(
        FunctionSpec::new(
            "get_rain_probability",
            "Get the probability of rain for a specific location",
        )
        .schema(
            FunctionSchema::object().parameter(
                ParameterSpec::string("location")
                    .description("The city and state, e.g., San Francisco, CA")
                    .required(),
            ),
        ),
        HandlerFn(|args: Value| async move {
            let location = args["location"].as_str().unwrap_or_default().to_string();
            let probability = pseudo_random(&location, 0.0, 100.0).round();
            Ok(json!({ "location": location, "probability": probability }))
        }),
    )?;
    Ok(registry)
}

// Stand-in for a real weather backend.
fn pseudo_random(seed: &str, lo: f64, hi: f64) -> f64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos()
        .hash(&mut hasher);
    let unit = (hasher.finish() % 1000) as f64 / 1000.0;
    lo + unit * (hi - lo)
}
