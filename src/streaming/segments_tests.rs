use super::test_utils::growing_prefixes;
use super::{split_segments, Segment};

fn prose(text: &str) -> Segment {
    Segment::Prose {
        text: text.to_string(),
    }
}

fn thought(text: &str, closed: bool) -> Segment {
    Segment::Thought {
        text: text.to_string(),
        closed,
    }
}

const MIXED: &str = "Intro <think>reasoning here</think> done. ```js\nconsole.log(1)\n``` <file path=\"a/b.js\">content</file>";

#[test]
fn test_splits_prose_and_thoughts() {
    let segments = split_segments(MIXED, true);
    assert_eq!(
        segments,
        vec![
            prose("Intro "),
            thought("reasoning here", true),
            prose(" done. ```js\nconsole.log(1)\n``` <file path=\"a/b.js\">content</file>"),
        ]
    );
}

#[test]
fn test_empty_buffer_has_no_segments() {
    assert!(split_segments("", false).is_empty());
    assert!(split_segments("", true).is_empty());
}

#[test]
fn test_open_thought_runs_to_end_of_buffer() {
    assert_eq!(
        split_segments("Plan: <think>step one", false),
        vec![prose("Plan: "), thought("step one", false)]
    );
    // Finishing does not invent an end marker
    assert_eq!(
        split_segments("<think>step one", true),
        vec![thought("step one", false)]
    );
}

#[test]
fn test_just_opened_thought_is_reported() {
    assert_eq!(split_segments("<think>", false), vec![thought("", false)]);
}

#[test]
fn test_consecutive_thoughts() {
    assert_eq!(
        split_segments("<think>a</think><think>b</think>c", true),
        vec![thought("a", true), thought("b", true), prose("c")]
    );
}

#[test]
fn test_partial_start_marker_is_held_back() {
    assert_eq!(split_segments("Hello <thi", false), vec![prose("Hello ")]);
    assert_eq!(split_segments("Hello <", false), vec![prose("Hello ")]);
    assert_eq!(
        split_segments("Hello <thi", true),
        vec![prose("Hello <thi")]
    );
}

#[test]
fn test_partial_end_marker_is_held_back() {
    assert_eq!(
        split_segments("<think>abc</th", false),
        vec![thought("abc", false)]
    );
    assert_eq!(
        split_segments("<think>abc</th", true),
        vec![thought("abc</th", false)]
    );
}

#[test]
fn test_text_that_only_looks_like_a_marker_is_kept() {
    assert_eq!(
        split_segments("a < b and <thing>", false),
        vec![prose("a < b and <thing>")]
    );
}

#[test]
fn test_settled_segments_never_change_while_streaming() {
    let prefixes = growing_prefixes(MIXED, 1);
    let mut previous: Vec<Segment> = Vec::new();

    for prefix in &prefixes {
        let current = split_segments(prefix, false);

        assert!(
            current.len() <= previous.len() + 1,
            "more than one new segment after {prefix:?}"
        );
        assert!(current.len() >= previous.len());

        if let Some((last, settled)) = previous.split_last() {
            assert_eq!(&current[..settled.len()], settled);
            assert!(
                current[settled.len()].text().starts_with(last.text()),
                "trailing segment shrank after {prefix:?}"
            );
            assert_eq!(current[settled.len()].is_thought(), last.is_thought());
        }
        previous = current;
    }

    assert_eq!(previous, split_segments(MIXED, true));
}

#[test]
fn test_chunk_size_does_not_change_the_result() {
    for chunk_size in 1..12 {
        let prefixes = growing_prefixes(MIXED, chunk_size);
        let last = prefixes.last().unwrap();
        assert_eq!(
            split_segments(last, false),
            split_segments(MIXED, true),
            "chunk size {chunk_size}"
        );
    }
}
