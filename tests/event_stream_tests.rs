use serde_json::json;

use selflayer_tui::gateway::{EventStream, StreamEvent};
use selflayer_tui::models::stream_chunk_text;
use selflayer_tui::utils::error::{ApiError, ApiResult};

fn byte_chunks(body: &str) -> Vec<ApiResult<Vec<u8>>> {
    body.bytes().map(|b| Ok(vec![b])).collect()
}

#[test]
fn test_two_chunks_then_done() {
    let body = "data: {\"content\":\"a\"}\ndata: {\"content\":\"b\"}\ndata: [DONE]\n";
    let chunks = tokio_test::block_on(EventStream::from_body(body).collect_chunks()).unwrap();

    assert_eq!(chunks, vec![json!({"content": "a"}), json!({"content": "b"})]);
}

#[test]
fn test_one_byte_at_a_time_with_crlf() {
    let body = "data: {\"data\":{\"response\":\"Hel\"}}\r\n\r\ndata:{\"data\":{\"response\":\"lo\"}}\r\ndata: [DONE]\r\n";
    let mut stream = EventStream::from_chunks(byte_chunks(body));

    let text = tokio_test::block_on(async {
        let mut text = String::new();
        while let StreamEvent::Chunk(chunk) = stream.next_event().await.unwrap() {
            text.push_str(stream_chunk_text(&chunk).unwrap());
        }
        text
    });

    assert_eq!(text, "Hello");
    assert!(stream.is_finished());
}

#[test]
fn test_malformed_lines_are_skipped() {
    let body = "data: {\"content\":\"a\"}\ndata: {broken\n: keep-alive\ndata: {\"content\":\"b\"}\n";
    let chunks = tokio_test::block_on(EventStream::from_body(body).collect_chunks()).unwrap();

    assert_eq!(chunks.len(), 2);
}

#[test]
fn test_error_after_content_is_reported_once() {
    let mut chunks = byte_chunks("data: {\"content\":\"partial\"}\n");
    chunks.push(Err(ApiError::Timeout("Request timeout for exocortex/ask".to_string())));
    let mut stream = EventStream::from_chunks(chunks);

    tokio_test::block_on(async {
        assert!(matches!(stream.next_event().await, Ok(StreamEvent::Chunk(_))));
        assert!(matches!(stream.next_event().await, Err(ApiError::Timeout(_))));
        assert_eq!(stream.next_event().await.unwrap(), StreamEvent::Done);
        assert_eq!(stream.next_event().await.unwrap(), StreamEvent::Done);
    });
}

#[test]
fn test_empty_body_is_done_immediately() {
    let mut stream = EventStream::from_body(Vec::<u8>::new());
    assert_eq!(tokio_test::block_on(stream.next_event()).unwrap(), StreamEvent::Done);
}
