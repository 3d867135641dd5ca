//! OpenAiTransport against a local mock server: header contract, SSE
//! decoding over real HTTP, and error status mapping.

use tokio_util::sync::CancellationToken;

use turnflow::registry::FunctionRegistry;
use turnflow::runs::RunDispatcher;
use turnflow::streaming::{collect_turn, BufferSink};
use turnflow::transport::{OpenAiTransport, TransportError};
use turnflow::types::{AssistantSpec, FinishReason, Message, RunStatus, TurnRequest};
use turnflow::{ChatTransport, Error, RunTransport};

const CHAT_SSE: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"\"},\"finish_reason\":null}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"},\"finish_reason\":null}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\" from mock\"},\"finish_reason\":null}]}\n\n",
    "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
    "data: [DONE]\n\n",
);

const RUN_SSE: &str = concat!(
    "event: thread.run.created\n",
    "data: {\"id\":\"run_9\",\"thread_id\":\"thread_9\",\"status\":\"queued\"}\n\n",
    "event: thread.run.step.created\n",
    "data: {\"id\":\"step_1\"}\n\n",
    "event: thread.message.delta\n",
    "data: {\"id\":\"msg_1\",\"delta\":{\"content\":[{\"index\":0,\"type\":\"text\",\"text\":{\"value\":\"Hi\"}}]}}\n\n",
    "event: thread.message.completed\n",
    "data: {\"id\":\"msg_1\"}\n\n",
    "event: thread.run.completed\n",
    "data: {\"id\":\"run_9\",\"thread_id\":\"thread_9\",\"status\":\"completed\"}\n\n",
    "event: done\n",
    "data: [DONE]\n\n",
);

fn transport_for(server: &mockito::Server) -> OpenAiTransport {
    OpenAiTransport::new("sk-test")
        .unwrap()
        .with_base_url(server.url())
}

#[tokio::test]
async fn chat_stream_decodes_over_http() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_header("accept", "text/event-stream")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(CHAT_SSE)
        .create_async()
        .await;

    let transport = transport_for(&server);
    let request = TurnRequest::new("gpt-4-turbo").with_messages(vec![Message::user("Hi")]);
    let deltas = transport.stream_turn(&request).await.unwrap();

    let mut sink = BufferSink::new();
    let outcome = collect_turn(deltas, &mut sink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.message.text_content(), Some("Hello from mock"));
    assert_eq!(outcome.finish_reason, FinishReason::Stop);
    assert_eq!(sink.text(), "Hello from mock");
    mock.assert_async().await;
}

#[tokio::test]
async fn error_status_carries_the_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(401)
        .with_body("{\"error\":{\"code\":\"invalid_api_key\"}}")
        .create_async()
        .await;

    let transport = transport_for(&server);
    let request = TurnRequest::new("gpt-4-turbo").with_messages(vec![Message::user("Hi")]);
    let Err(err) = transport.stream_turn(&request).await else {
        panic!("expected an error status");
    };

    match err {
        Error::Transport(TransportError::Status { status, body }) => {
            assert_eq!(status, 401);
            assert!(body.contains("invalid_api_key"));
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn assistant_crud_uses_the_beta_header() {
    let mut server = mockito::Server::new_async().await;
    let create = server
        .mock("POST", "/assistants")
        .match_header("openai-beta", "assistants=v2")
        .with_status(200)
        .with_body("{\"id\":\"asst_9\",\"object\":\"assistant\"}")
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/assistants/asst_9")
        .match_header("openai-beta", "assistants=v2")
        .with_status(200)
        .with_body("{\"id\":\"asst_9\",\"deleted\":true}")
        .create_async()
        .await;

    let transport = transport_for(&server);
    let spec = AssistantSpec::new("tutor", "gpt-4-turbo", "Be brief.");
    let assistant_id = transport.create_assistant(&spec).await.unwrap();
    assert_eq!(assistant_id, "asst_9");
    assert!(transport.delete_assistant(&assistant_id).await.unwrap());

    create.assert_async().await;
    delete.assert_async().await;
}

#[tokio::test]
async fn run_stream_decodes_named_events_over_http() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/threads/thread_9/runs")
        .match_header("openai-beta", "assistants=v2")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(RUN_SSE)
        .create_async()
        .await;

    let transport = transport_for(&server);
    let events = transport.stream_run("thread_9", "asst_9").await.unwrap();

    let registry = FunctionRegistry::new();
    let mut sink = BufferSink::new();
    let outcome = RunDispatcher::new(&transport, &registry, &mut sink)
        .dispatch(events, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.tool_submissions, 0);
    assert_eq!(sink.completed_messages(), ["Hi"]);
    mock.assert_async().await;
}
