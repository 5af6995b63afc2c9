//! Related-note suggestion by keyword overlap.
//!
//! Tokens shorter than three characters and a fixed stop-word list are
//! ignored; a note needs at least two keywords of its own and at least two
//! shared keywords with a strictly earlier entry to get a suggestion.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

const MIN_KEYWORDS: usize = 2;
const MIN_SCORE: usize = 2;

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "і", "та", "що", "як", "це", "але", "для", "від", "до", "не", "у", "в", "на", "з", "по",
        "чи", "або", "ще", "вже", "бо", "коли", "де", "хто", "так", "ні", "все", "мені", "його",
        "цей", "той", "він", "вона", "воно", "вони", "ми", "ви", "їх", "мій", "має", "був",
        "буде", "було", "були", "тут", "там", "дуже", "при", "про", "під", "над", "без", "між",
        "через", "після", "перед", "лише", "тільки", "також", "можна", "треба", "потім", "а",
        "б", "й", "о", "е", "i",
    ]
    .into_iter()
    .collect()
});

static TOKEN_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").unwrap());

pub fn extract_keywords(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    TOKEN_BOUNDARY
        .split(&lowered)
        .filter(|t| !t.is_empty())
        .filter(|t| t.chars().count() >= 3)
        .filter(|t| !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedMatch {
    /// Index of the best-scoring earlier entry.
    pub index: usize,
    pub score: usize,
}

/// Keyword sets for one pass over a feed, built once so every row's lookup
/// stays a linear scan over earlier entries.
pub struct RelatedIndex {
    keywords: Vec<HashSet<String>>,
}

impl RelatedIndex {
    pub fn new<'a, I: IntoIterator<Item = &'a str>>(texts: I) -> Self {
        Self {
            keywords: texts.into_iter().map(extract_keywords).collect(),
        }
    }

    /// Best earlier entry sharing keywords with the entry at `index`.
    pub fn best_match(&self, index: usize) -> Option<RelatedMatch> {
        let current = self.keywords.get(index)?;
        if current.len() < MIN_KEYWORDS {
            return None;
        }

        let mut best: Option<RelatedMatch> = None;
        for (i, candidate) in self.keywords[..index].iter().enumerate() {
            let (smaller, larger) = if current.len() <= candidate.len() {
                (current, candidate)
            } else {
                (candidate, current)
            };
            let score = smaller.iter().filter(|w| larger.contains(*w)).count();
            if score > best.as_ref().map_or(0, |b| b.score) {
                best = Some(RelatedMatch { index: i, score });
            }
        }

        best.filter(|b| b.score >= MIN_SCORE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_keywords_filters_noise() {
        let kw = extract_keywords("Купити молоко і хліб у маркеті");
        assert!(kw.contains("купити"));
        assert!(kw.contains("молоко"));
        assert!(kw.contains("маркеті"));
        // stop word and short token dropped
        assert!(!kw.contains("і"));
        assert!(!kw.contains("у"));
    }

    #[test]
    fn test_best_match_needs_two_shared_keywords() {
        let index = RelatedIndex::new([
            "купити молоко та хліб",
            "полити квіти ввечері",
            "молоко та хліб закінчились",
        ]);
        let related = index.best_match(2).unwrap();
        assert_eq!(related.index, 0);
        assert!(related.score >= 2);
        // only one shared keyword with the flowers note
        assert_eq!(index.best_match(1), None);
    }

    #[test]
    fn test_only_earlier_entries_considered() {
        let index = RelatedIndex::new(["молоко та хліб закінчились", "купити молоко та хліб"]);
        assert_eq!(index.best_match(0), None);
        assert!(index.best_match(1).is_some());
    }
}
