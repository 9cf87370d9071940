//! Property-based tests for the NDJSON stream decoder
//!
//! However the transport splits the body into reads, decoding must yield the
//! same chunks in the same order.

use super::ndjson::NdjsonDecoder;
use super::types::ChatChunk;
use proptest::prelude::*;

fn body_for(deltas: &[String]) -> Vec<u8> {
    let mut body = String::new();
    for delta in deltas {
        let line = serde_json::json!({
            "model": "tinyllama",
            "message": { "role": "assistant", "content": delta },
            "done": false,
        });
        body.push_str(&line.to_string());
        body.push('\n');
    }
    body.push_str(
        r#"{"model":"tinyllama","message":{"role":"assistant","content":""},"done":true,"done_reason":"stop","eval_count":3}"#,
    );
    body.push('\n');
    body.into_bytes()
}

/// Cut `body` at the given offsets, wrapped to its length
fn split<'a>(body: &'a [u8], cuts: &[usize]) -> Vec<&'a [u8]> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (body.len() + 1)).collect();
    points.sort_unstable();
    points.dedup();

    let mut pieces = Vec::new();
    let mut start = 0;
    for p in points {
        pieces.push(&body[start..p]);
        start = p;
    }
    pieces.push(&body[start..]);
    pieces
}

fn decode(pieces: &[&[u8]]) -> Vec<ChatChunk> {
    let mut decoder = NdjsonDecoder::default();
    let mut out = Vec::new();
    for piece in pieces {
        out.extend(decoder.push(piece));
    }
    out.extend(decoder.finish());
    out.into_iter().map(|r| r.expect("valid stream")).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn prop_read_boundaries_do_not_change_output(
        deltas in proptest::collection::vec("[a-zA-Z0-9 .,!?éü日本\\n\"]{0,12}", 0..8),
        cuts in proptest::collection::vec(any::<usize>(), 0..12),
    ) {
        let body = body_for(&deltas);
        let whole = decode(&[&body]);
        let pieces = split(&body, &cuts);
        let chunked = decode(&pieces);

        prop_assert_eq!(&chunked, &whole);

        let text: String = chunked.iter().filter_map(|c| c.content.clone()).collect();
        prop_assert_eq!(text, deltas.concat());

        let last = chunked.last().expect("done chunk");
        prop_assert!(last.done);
        prop_assert_eq!(chunked.iter().filter(|c| c.done).count(), 1);
        prop_assert_eq!(last.usage.as_ref().map(|u| u.completion_tokens), Some(3));
    }
}
