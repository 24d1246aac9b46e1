use chatstream::api::FrameDecoder;
use chatstream::state::{dispatch, StreamAccumulator};
use chatstream::types::Frame;
use serde_json::json;

#[test]
fn test_fragmented_frames() {
    let mut decoder = FrameDecoder::new();

    let chunk1 = b"event: token\ndata: {\"tok";
    assert!(decoder.process(chunk1).is_empty());

    let chunk2 = b"en\":\"Hi\"}\n";
    assert!(decoder.process(chunk2).is_empty());

    let frames = decoder.process(b"\nevent: done\ndata: {}\n\n");
    assert_eq!(
        frames,
        vec![
            Frame::new("token", json!({"token": "Hi"})),
            Frame::new("done", json!({})),
        ]
    );
}

#[test]
fn test_parse_error_does_not_stop_following_frames() {
    let mut decoder = FrameDecoder::new();

    let frames = decoder.process(
        b"event: token\ndata: {invalid json}\n\nevent: token\ndata: {\"token\":\"ok\"}\n\n",
    );
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].payload, json!({}));

    let mut acc = StreamAccumulator::live();
    for frame in &frames {
        dispatch(&mut acc, frame);
    }
    assert_eq!(acc.draft_text, "ok");
}

#[test]
fn test_analytics_server_stream_shape() {
    let body = concat!(
        "event: ready\ndata: {}\n\n",
        "event: thought\ndata: {\"log\": \"AgentExecutor\"}\n\n",
        "event: tool_start\ndata: {\"tool\": \"read\", \"input\": \"{'sql': 'select 1'}\"}\n\n",
        "event: tool_end\ndata: {\"columns\": [\"n\"], \"rows\": [[1]]}\n\n",
        "event: token\ndata: {\"token\": \"One row\"}\n\n",
        "event: final\ndata: {\"answer\": \"One row.\", \"route\": {\"tool\": \"read\"}, ",
        "\"data_preview\": {\"columns\": [\"n\"], \"rows\": [[1]]}}\n\n",
        "event: done\ndata: {}\n\n",
    );

    let frames = FrameDecoder::new().process(body.as_bytes());
    let mut acc = StreamAccumulator::live();
    for frame in &frames {
        dispatch(&mut acc, frame);
    }

    assert_eq!(acc.thoughts, vec!["AgentExecutor".to_string()]);
    assert_eq!(acc.tool_events.len(), 2);
    assert_eq!(acc.tool_events[0].tool, "read");
    assert_eq!(acc.tool_events[1].tool, "tool");
    assert_eq!(acc.draft_text, "One row");
    assert_eq!(acc.display_text(), "One row.");
    let final_answer = acc.final_answer.as_ref().unwrap();
    assert_eq!(final_answer.route.as_ref().unwrap().tool.as_deref(), Some("read"));
    assert_eq!(final_answer.data_preview.as_ref().unwrap().columns, vec!["n"]);
    assert!(!acc.is_live);
}
