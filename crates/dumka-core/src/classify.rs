//! Text classification.
//!
//! A note's raw text is the sole source of its derived kind. Task detection
//! tries the bracket form first (`[]` or `[ ]` at the very start, stripped
//! once for display), then a standalone trigger keyword with Unicode-letter
//! boundaries on both sides. Question detection is a literal `?` anywhere.

use once_cell::sync::Lazy;
use regex::Regex;

/// How a task was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Brackets,
    Keywords,
}

/// Byte range of the highlighted trigger within `display_text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskInfo {
    pub is_task: bool,
    pub kind: Option<TaskKind>,
    pub display_text: String,
    pub highlight: Option<Span>,
}

impl TaskInfo {
    fn plain(text: &str) -> Self {
        Self {
            is_task: false,
            kind: None,
            display_text: text.to_string(),
            highlight: None,
        }
    }
}

/// A piece of `display_text`, split around the highlighted trigger so the
/// renderer can draw the middle as a pill. Empty pieces are skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub highlighted: bool,
}

static BRACKET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\[\s*\]\s*").unwrap());
static KEYWORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(task|todo|задача|завдання|зробити)").unwrap());

/// Classify `text` as a task or not.
///
/// Classification is idempotent on its own output: the bracket marker is
/// stripped exactly once, so re-running on `display_text` does not
/// double-strip (unless the remaining text itself starts a new bracket,
/// which is expected).
pub fn classify_task(text: &str) -> TaskInfo {
    if text.is_empty() {
        return TaskInfo::plain(text);
    }

    if let Some(m) = BRACKET_RE.find(text) {
        let display_text = text[m.end()..].to_string();
        let highlight = first_token_span(&display_text);
        return TaskInfo {
            is_task: true,
            kind: Some(TaskKind::Brackets),
            display_text,
            highlight,
        };
    }

    if let Some(highlight) = keyword_span(text) {
        return TaskInfo {
            is_task: true,
            kind: Some(TaskKind::Keywords),
            display_text: text.to_string(),
            highlight: Some(highlight),
        };
    }

    TaskInfo::plain(text)
}

/// A note is a question iff its text contains a literal `?`.
pub fn is_question(text: &str) -> bool {
    text.contains('?')
}

/// The first whitespace-delimited token, if any. May be absent when the
/// stripped text is empty or all whitespace.
fn first_token_span(text: &str) -> Option<Span> {
    let start = text.find(|c: char| !c.is_whitespace())?;
    let len = text[start..]
        .find(char::is_whitespace)
        .unwrap_or(text.len() - start);
    Some(Span { start, len })
}

/// A standalone trigger word, optionally with a trailing colon. The trigger
/// must not be adjacent to other letters; a colon is only swallowed into the
/// highlight when the character after it is itself on a boundary.
fn keyword_span(text: &str) -> Option<Span> {
    for m in KEYWORD_RE.find_iter(text) {
        if text[..m.start()]
            .chars()
            .next_back()
            .is_some_and(char::is_alphabetic)
        {
            continue;
        }
        let mut rest = text[m.end()..].chars();
        match rest.next() {
            Some(':') => {
                let len = match rest.next() {
                    Some(c) if c.is_alphabetic() => m.len(),
                    _ => m.len() + 1,
                };
                return Some(Span { start: m.start(), len });
            }
            Some(c) if c.is_alphabetic() => continue,
            _ => return Some(Span { start: m.start(), len: m.len() }),
        }
    }
    None
}

/// Split `display_text` into before / highlighted / after segments.
/// Pure string work; not coupled to any render target.
pub fn highlight_segments(display_text: &str, highlight: Option<Span>) -> Vec<Segment> {
    let span = match highlight {
        Some(s) if s.len > 0 && s.start + s.len <= display_text.len() => s,
        _ => {
            if display_text.is_empty() {
                return Vec::new();
            }
            return vec![Segment {
                text: display_text.to_string(),
                highlighted: false,
            }];
        }
    };

    let mut segments = Vec::new();
    let before = &display_text[..span.start];
    let word = &display_text[span.start..span.start + span.len];
    let after = &display_text[span.start + span.len..];

    if !before.is_empty() {
        segments.push(Segment {
            text: before.to_string(),
            highlighted: false,
        });
    }
    segments.push(Segment {
        text: word.to_string(),
        highlighted: true,
    });
    if !after.is_empty() {
        segments.push(Segment {
            text: after.to_string(),
            highlighted: false,
        });
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn highlighted(info: &TaskInfo) -> Option<&str> {
        info.highlight
            .map(|s| &info.display_text[s.start..s.start + s.len])
    }

    #[test]
    fn test_bracket_form_strips_once() {
        for raw in ["[] buy milk", "[ ] buy milk", "  [  ] buy milk"] {
            let info = classify_task(raw);
            assert!(info.is_task, "{:?}", raw);
            assert_eq!(info.kind, Some(TaskKind::Brackets));
            assert_eq!(info.display_text, "buy milk");
            assert_eq!(highlighted(&info), Some("buy"));
        }
    }

    #[test]
    fn test_bracket_form_empty_remainder() {
        let info = classify_task("[]");
        assert!(info.is_task);
        assert_eq!(info.display_text, "");
        assert_eq!(info.highlight, None);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let first = classify_task("[] buy milk");
        let second = classify_task(&first.display_text);
        // the marker was already stripped, so no second bracket detection
        assert!(!second.is_task);
        assert_eq!(second.display_text, "buy milk");
    }

    #[test]
    fn test_keyword_form_keeps_text_unstripped() {
        let info = classify_task("todo: water the plants");
        assert!(info.is_task);
        assert_eq!(info.kind, Some(TaskKind::Keywords));
        assert_eq!(info.display_text, "todo: water the plants");
        assert_eq!(highlighted(&info), Some("todo:"));
    }

    #[test]
    fn test_keyword_mid_text_and_case() {
        let info = classify_task("remember the TASK for tomorrow");
        assert!(info.is_task);
        assert_eq!(highlighted(&info), Some("TASK"));
    }

    #[test]
    fn test_keyword_cyrillic() {
        let info = classify_task("завдання: полити квіти");
        assert!(info.is_task);
        assert_eq!(highlighted(&info), Some("завдання:"));
    }

    #[test]
    fn test_keyword_requires_letter_boundaries() {
        assert!(!classify_task("todos are piling up").is_task);
        assert!(!classify_task("multitask").is_task);
        assert!(!classify_task("задачах багато").is_task);
    }

    #[test]
    fn test_colon_followed_by_letter_not_swallowed() {
        let info = classify_task("todo:x");
        assert!(info.is_task);
        assert_eq!(highlighted(&info), Some("todo"));
    }

    #[test]
    fn test_empty_text() {
        let info = classify_task("");
        assert!(!info.is_task);
        assert_eq!(info.display_text, "");
    }

    #[test]
    fn test_is_question() {
        assert!(is_question("what?"));
        assert!(is_question("a?b?c?"));
        assert!(is_question("?"));
        assert!(!is_question(""));
        assert!(!is_question("no question here"));
    }

    #[test]
    fn test_segments() {
        let info = classify_task("todo: call mom");
        let segments = highlight_segments(&info.display_text, info.highlight);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "todo:");
        assert!(segments[0].highlighted);
        assert_eq!(segments[1].text, " call mom");
        assert!(!segments[1].highlighted);
    }

    #[test]
    fn test_segments_without_highlight() {
        let segments = highlight_segments("plain", None);
        assert_eq!(segments.len(), 1);
        assert!(!segments[0].highlighted);
        assert!(highlight_segments("", None).is_empty());
    }
}
