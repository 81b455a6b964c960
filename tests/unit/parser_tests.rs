/*!
 * Tests for response parsing and stream decoding
 */

use linebatch::translation::parse_translation_map;
use linebatch::translation::parser::{SseDecoder, StreamEvent};

/// A typical model answer mixes chatter, blank lines and ids
#[test]
fn test_parse_translation_map_with_chatty_answer_should_keep_only_ids() {
    let payload = "Here you go:\n\n1:::Xin chào\n\n2 ::: Thế giới {name}\n3. Ba\nThanks!";
    let mapping = parse_translation_map(payload);

    assert_eq!(mapping.len(), 3);
    assert_eq!(mapping["1"], "Xin chào");
    assert_eq!(mapping["2"], "Thế giới {name}");
    assert_eq!(mapping["3"], "Ba");
}

/// Only the first delimiter splits; the rest belongs to the text
#[test]
fn test_parse_translation_map_with_delimiter_in_text_should_split_once() {
    let mapping = parse_translation_map("9:::a:::b");
    assert_eq!(mapping["9"], "a:::b");
}

/// Ids need not be numeric when the delimiter is present
#[test]
fn test_parse_translation_map_with_text_ids_should_accept_them() {
    let mapping = parse_translation_map("Quest_01_Title:::Khởi đầu");
    assert_eq!(mapping["Quest_01_Title"], "Khởi đầu");
}

/// The fallback requires a leading integer and a separator
#[test]
fn test_parse_translation_map_fallback_should_reject_other_shapes() {
    let mapping = parse_translation_map("A. not numeric\n12 no separator\n-3. negative");
    assert!(mapping.is_empty());
}

/// An empty translation is still a mapping entry
#[test]
fn test_parse_translation_map_with_empty_text_should_map_to_empty_string() {
    let mapping = parse_translation_map("4:::");
    assert_eq!(mapping.get("4").map(String::as_str), Some(""));
}

/// Frames split byte by byte still decode
#[test]
fn test_sse_decoder_fed_one_byte_at_a_time_should_decode_every_frame() {
    let body = concat!(
        ": comment\n",
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"1:::Thế \"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"giới\"}}]}\r\n\r\n",
        "data: [DONE]\n\n",
    );

    let mut decoder = SseDecoder::new();
    let mut events = Vec::new();
    for byte in body.as_bytes() {
        events.extend(decoder.push(std::slice::from_ref(byte)));
    }

    assert_eq!(
        events,
        vec![
            StreamEvent::Delta("1:::Thế ".to_string()),
            StreamEvent::Delta("giới".to_string()),
            StreamEvent::Done,
        ]
    );
}

/// Malformed frames are skipped without ending the stream
#[test]
fn test_sse_decoder_with_malformed_frame_should_skip_it() {
    let mut decoder = SseDecoder::new();
    let events = decoder.push(
        b"data: {broken\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n",
    );
    assert_eq!(events, vec![StreamEvent::Delta("ok".to_string())]);
}
