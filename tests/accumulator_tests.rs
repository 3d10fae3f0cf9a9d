//! Integration tests for the stream accumulator, driven by a scripted upstream.

use futures::StreamExt;
use plan_stream::mocks::ScriptedUpstream;
use plan_stream::{
    AccumulatorConfig, ChunkEvent, Completion, FinalizedMessage, HistoryMessage, PlanStreamError,
    Role, RunOutcome, StepStatus, StreamAccumulator, ToolFragment, UpstreamChunk, UpstreamMessage,
    WireRecord,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn accumulator(upstream: &Arc<ScriptedUpstream>) -> StreamAccumulator {
    StreamAccumulator::new(upstream.clone())
}

async fn drain(
    accumulator: &StreamAccumulator,
    history: &[HistoryMessage],
) -> (Vec<Result<ChunkEvent, PlanStreamError>>, RunOutcome) {
    let (events, finalized) = accumulator.run(history, None).into_parts();
    let events = events.collect().await;
    (events, finalized.wait().await)
}

fn finalized(outcome: RunOutcome) -> FinalizedMessage {
    outcome.into_message().expect("run was not cancelled")
}

fn ok_events(events: Vec<Result<ChunkEvent, PlanStreamError>>) -> Vec<ChunkEvent> {
    events
        .into_iter()
        .map(|e| e.expect("unexpected error item"))
        .collect()
}

fn text(s: &str) -> ChunkEvent {
    ChunkEvent::Text(s.to_string())
}

fn tool(s: &str) -> ChunkEvent {
    ChunkEvent::ToolFragment(s.to_string())
}

#[tokio::test]
async fn test_text_only_stream() {
    let upstream = Arc::new(ScriptedUpstream::text(["Hello", ", ", "world!"]));

    let (events, outcome) = drain(&accumulator(&upstream), &[HistoryMessage::user("hi")]).await;

    assert_eq!(ok_events(events), vec![text("Hello"), text(", "), text("world!")]);
    let message = finalized(outcome);
    assert_eq!(message.role, Role::Assistant);
    assert_eq!(message.text, "Hello, world!");
    assert!(message.tool_call.is_none());
    assert_eq!(message.completion, Completion::Complete);
}

#[tokio::test]
async fn test_tool_only_stream_with_valid_json() {
    let upstream = Arc::new(ScriptedUpstream::tool([
        r#"{"title":"#,
        r#""Test Plan","#,
        r#""steps": []}"#,
    ]));

    let (events, outcome) = drain(&accumulator(&upstream), &[]).await;

    assert_eq!(
        ok_events(events),
        vec![tool(r#"{"title":"#), tool(r#""Test Plan","#), tool(r#""steps": []}"#)]
    );

    let message = finalized(outcome);
    assert_eq!(message.text, "");
    let tool_call = message.tool_call.expect("tool call present");
    assert_eq!(tool_call.name, "manage_plan");
    assert_eq!(tool_call.raw_arguments, r#"{"title":"Test Plan","steps": []}"#);
    assert_eq!(
        serde_json::Value::Object(tool_call.parsed.as_object().cloned().unwrap()),
        json!({"title": "Test Plan", "steps": []})
    );

    let plan = tool_call.plan().unwrap();
    assert_eq!(plan.title, "Test Plan");
    assert!(plan.steps.is_empty());
}

#[tokio::test]
async fn test_mixed_text_then_tool() {
    let upstream = Arc::new(
        ScriptedUpstream::text(["I'll create that plan."])
            .chunk(UpstreamChunk::tool(r#"{"title":"Launch","steps":[{"id":"1","title":"Draft"}]}"#)),
    );

    let (events, outcome) = drain(&accumulator(&upstream), &[]).await;

    let events = ok_events(events);
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], ChunkEvent::Text(_)));
    assert!(matches!(events[1], ChunkEvent::ToolFragment(_)));

    let message = finalized(outcome);
    assert_eq!(message.text, "I'll create that plan.");
    let plan = message.tool_call.unwrap().plan().unwrap();
    assert_eq!(plan.steps[0].status, StepStatus::Pending);
}

#[tokio::test]
async fn test_truncated_tool_json_is_parse_failure() {
    let upstream = Arc::new(ScriptedUpstream::tool([r#"{"title":"#]));

    let (events, outcome) = drain(&accumulator(&upstream), &[]).await;

    assert_eq!(ok_events(events), vec![tool(r#"{"title":"#)]);
    let message = finalized(outcome);
    assert_eq!(message.completion, Completion::Complete);
    let tool_call = message.tool_call.unwrap();
    assert_eq!(tool_call.raw_arguments, r#"{"title":"#);
    assert!(tool_call.parsed.failure().is_some());
    assert!(tool_call.plan().is_err());
}

#[tokio::test]
async fn test_empty_chunks_emit_nothing() {
    let upstream = Arc::new(ScriptedUpstream::with_chunks([
        UpstreamChunk::empty(),
        UpstreamChunk::text("a"),
        UpstreamChunk::text(""),
        UpstreamChunk {
            content: None,
            tool_fragments: Some(vec![ToolFragment::default()]),
        },
        UpstreamChunk::text("b"),
    ]));

    let (events, outcome) = drain(&accumulator(&upstream), &[]).await;

    assert_eq!(ok_events(events), vec![text("a"), text("b")]);
    let message = finalized(outcome);
    assert_eq!(message.text, "ab");
    assert!(message.tool_call.is_none());
    assert_eq!(message.stats.chunks_seen, 5);
    assert_eq!(message.stats.empty_chunks, 3);
    assert_eq!(message.stats.events_forwarded(), 2);
}

#[tokio::test]
async fn test_multiple_fragments_in_one_chunk_keep_order() {
    let upstream = Arc::new(ScriptedUpstream::with_chunks([UpstreamChunk {
        content: None,
        tool_fragments: Some(vec![
            ToolFragment::arguments(r#"{"title":"A","#),
            ToolFragment::default(),
            ToolFragment::arguments(r#""steps":[]}"#),
        ]),
    }]));

    let (events, outcome) = drain(&accumulator(&upstream), &[]).await;

    assert_eq!(
        ok_events(events),
        vec![tool(r#"{"title":"A","#), tool(r#""steps":[]}"#)]
    );
    assert!(finalized(outcome).tool_call.unwrap().is_parsed());
}

#[tokio::test]
async fn test_replay_is_deterministic() {
    let upstream = Arc::new(
        ScriptedUpstream::text(["Plan:", " below"])
            .chunks([UpstreamChunk::tool("{\"title\":\"X\","), UpstreamChunk::tool("\"steps\":[]}")]),
    );
    let accumulator = accumulator(&upstream);

    let (first_events, first) = drain(&accumulator, &[]).await;
    let (second_events, second) = drain(&accumulator, &[]).await;

    assert_eq!(ok_events(first_events), ok_events(second_events));
    let (first, second) = (finalized(first), finalized(second));
    assert_eq!(first.text, second.text);
    assert_eq!(first.tool_call, second.tool_call);
}

#[tokio::test]
async fn test_concatenated_events_match_buffers() {
    let upstream = Arc::new(ScriptedUpstream::with_chunks([
        UpstreamChunk::text("Let me "),
        UpstreamChunk::tool("{\"title\""),
        UpstreamChunk::text("think."),
        UpstreamChunk::tool(":\"T\",\"steps\":[]}"),
    ]));

    let (events, outcome) = drain(&accumulator(&upstream), &[]).await;
    let events = ok_events(events);
    let message = finalized(outcome);

    let live_text: String = events
        .iter()
        .filter(|e| !e.is_tool_fragment())
        .map(ChunkEvent::content)
        .collect();
    let live_tool: String = events
        .iter()
        .filter(|e| e.is_tool_fragment())
        .map(ChunkEvent::content)
        .collect();

    assert_eq!(message.text, live_text);
    assert_eq!(message.tool_call.unwrap().raw_arguments, live_tool);
}

#[tokio::test]
async fn test_mid_stream_failure_yields_error_and_partial_message() {
    let upstream = Arc::new(
        ScriptedUpstream::text(["Working on it"])
            .chunk(UpstreamChunk::tool("{\"title\":\"Half"))
            .fail(PlanStreamError::Network {
                message: "connection reset".to_string(),
            })
            .chunk(UpstreamChunk::text("never seen")),
    );

    let (events, outcome) = drain(&accumulator(&upstream), &[]).await;

    assert_eq!(events.len(), 3);
    assert!(events[0].is_ok());
    assert!(events[1].is_ok());
    assert!(matches!(events[2], Err(PlanStreamError::Network { .. })));

    let message = finalized(outcome);
    assert!(message.is_partial());
    assert_eq!(message.text, "Working on it");
    let tool_call = message.tool_call.unwrap();
    assert_eq!(tool_call.raw_arguments, "{\"title\":\"Half");
    assert!(!tool_call.is_parsed());
    assert_eq!(
        message.completion,
        Completion::Partial {
            error: "Network error: connection reset".to_string()
        }
    );
}

#[tokio::test]
async fn test_open_failure_yields_error_and_empty_partial_message() {
    let upstream =
        Arc::new(ScriptedUpstream::new().fail_on_open(PlanStreamError::server(503, "overloaded")));

    let (events, outcome) = drain(&accumulator(&upstream), &[]).await;

    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        Err(PlanStreamError::Server { status_code: 503, .. })
    ));

    let message = finalized(outcome);
    assert!(message.is_partial());
    assert_eq!(message.text, "");
    assert!(message.tool_call.is_none());
}

#[tokio::test]
async fn test_cancellation_stops_upstream_and_skips_finalize() {
    let upstream = Arc::new(ScriptedUpstream::text(["one", "two", "three", "four"]));
    let (mut events, finalized) = accumulator(&upstream).run(&[], None).into_parts();

    let first = events.next().await.unwrap().unwrap();
    assert_eq!(first, text("one"));
    drop(events);

    assert_eq!(finalized.wait().await, RunOutcome::Cancelled);
    assert_eq!(upstream.chunks_pulled(), 1);
}

#[tokio::test]
async fn test_events_are_forwarded_before_stream_ends() {
    let upstream = Arc::new(ScriptedUpstream::text(["early", " bird"]).stall());
    let (mut events, mut finalized) = accumulator(&upstream).run(&[], None).into_parts();

    assert_eq!(events.next().await.unwrap().unwrap(), text("early"));
    assert_eq!(events.next().await.unwrap().unwrap(), text(" bird"));

    let third = tokio::time::timeout(Duration::from_millis(50), events.next()).await;
    assert!(third.is_err(), "stream should still be waiting on the upstream");
    assert!(finalized.try_outcome().is_none());

    drop(events);
    assert!(finalized.wait().await.is_cancelled());
}

#[tokio::test]
async fn test_dropping_finalize_handle_does_not_disturb_live_stream() {
    let upstream = Arc::new(ScriptedUpstream::text(["a", "b"]));
    let (events, finalized) = accumulator(&upstream).run(&[], None).into_parts();
    drop(finalized);

    let events: Vec<_> = events.collect().await;
    assert_eq!(ok_events(events), vec![text("a"), text("b")]);
}

#[tokio::test]
async fn test_request_strips_history_and_attaches_tool() {
    let upstream = Arc::new(ScriptedUpstream::text(["ok"]));
    let accumulator = StreamAccumulator::with_config(
        upstream.clone(),
        AccumulatorConfig::new().with_preamble("You plan things."),
    );
    let history = vec![
        HistoryMessage::user("Draft a plan")
            .with_timestamp(chrono::Utc::now())
            .with_extra("message_id", json!("m1")),
        HistoryMessage::assistant("Sure"),
    ];

    let _ = drain(&accumulator, &history).await;

    let request = upstream.last_request().unwrap();
    assert_eq!(
        request.messages,
        vec![
            UpstreamMessage::system("You plan things."),
            UpstreamMessage::user("Draft a plan"),
            UpstreamMessage::assistant("Sure"),
        ]
    );
    assert_eq!(request.tools.len(), 1);
    assert_eq!(request.tools[0].function.name, "manage_plan");
}

#[tokio::test]
async fn test_context_augments_preamble() {
    let upstream = Arc::new(ScriptedUpstream::text(["ok"]));
    let accumulator = StreamAccumulator::with_config(
        upstream.clone(),
        AccumulatorConfig::new()
            .with_preamble("You plan things.")
            .with_context_heading("Current plan:"),
    );

    let (events, _) = accumulator
        .run(&[HistoryMessage::user("Add a step")], Some("Launch: 1. Draft"))
        .into_parts();
    let _: Vec<_> = events.collect().await;

    let request = upstream.last_request().unwrap();
    assert_eq!(
        request.messages[0].content,
        "You plan things.\n\nCurrent plan:\nLaunch: 1. Draft"
    );
    assert_eq!(request.messages.len(), 2);
}

#[tokio::test]
async fn test_custom_tool_name_flows_to_finalized_call() {
    let upstream = Arc::new(ScriptedUpstream::tool(["{\"title\":\"T\",\"steps\":[]}"]));
    let accumulator = StreamAccumulator::with_config(
        upstream.clone(),
        AccumulatorConfig::new().with_tool_name("update_plan"),
    );

    let (_, outcome) = drain(&accumulator, &[]).await;

    assert_eq!(finalized(outcome).tool_call.unwrap().name, "update_plan");
    let request = upstream.last_request().unwrap();
    assert_eq!(request.tools[0].function.name, "update_plan");
    assert!(request.messages[0].content.contains("`update_plan`"));
    assert!(!request.messages[0].content.contains("manage_plan"));
}

#[tokio::test]
async fn test_ndjson_lines() {
    let upstream = Arc::new(
        ScriptedUpstream::text(["Hi"]).chunk(UpstreamChunk::tool("{\"title\":")),
    );
    let (events, _) = accumulator(&upstream).run(&[], None).into_parts();

    let lines: Vec<String> = events
        .into_ndjson()
        .map(|b| String::from_utf8(b.to_vec()).unwrap())
        .collect()
        .await;

    assert_eq!(
        lines,
        vec![
            "{\"type\":\"text\",\"content\":\"Hi\"}\n".to_string(),
            "{\"type\":\"tool_chunk\",\"content\":\"{\\\"title\\\":\"}\n".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_ndjson_meta_and_error_records() {
    let upstream = Arc::new(
        ScriptedUpstream::text(["partial"]).fail(PlanStreamError::stream("upstream closed")),
    );
    let (events, finalized) = accumulator(&upstream).run(&[], None).into_parts();

    let mut meta = serde_json::Map::new();
    meta.insert("plan_id".to_string(), json!("p-42"));

    let records: Vec<WireRecord> = events
        .with_meta(meta.clone())
        .into_ndjson()
        .map(|b| WireRecord::parse_line(&String::from_utf8_lossy(&b)).unwrap())
        .collect()
        .await;

    assert_eq!(
        records,
        vec![
            WireRecord::Meta(meta),
            WireRecord::Text("partial".to_string()),
            WireRecord::Error {
                message: "Stream error: upstream closed".to_string()
            },
        ]
    );
    assert!(finalized.wait().await.into_message().unwrap().is_partial());
}

#[tokio::test]
async fn test_history_message_from_finalized_run() {
    let upstream = Arc::new(
        ScriptedUpstream::text(["Updated."]).chunk(UpstreamChunk::tool("{\"title\":\"T\",\"steps\":[]}")),
    );

    let (_, outcome) = drain(&accumulator(&upstream), &[]).await;
    let history = finalized(outcome).to_history_message();

    assert_eq!(history.role, Role::Assistant);
    assert_eq!(history.content, "Updated.");
    assert!(history.timestamp.is_some());
    assert_eq!(history.extra["tool_call"]["name"], json!("manage_plan"));
    assert!(!history.extra.contains_key("partial"));
}
