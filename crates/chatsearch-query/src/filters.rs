//! Low-value message filter.
//!
//! Drops chat noise (laughter, bare acknowledgements, strings of very short
//! words) from displayed results. The index is never touched.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use chatsearch_core::SearchResults;

/// Words at most this long count as short.
const MAX_SHORT_WORD_CHARS: usize = 3;

/// Whole-message words that carry no information on their own.
const LOW_VALUE_WORDS: &[&str] = &[
    "si", "sí", "no", "ok", "ya", "ah", "oh", "uh", "eh", "ay", "uy", "mm", "mmm", "hm", "hmm",
    "xd", "lol", "jj", "k", "q", "x", "d", "f", "va", "sep",
];

fn laughter_pattern() -> &'static Regex {
    static LAUGHTER: OnceLock<Regex> = OnceLock::new();
    LAUGHTER.get_or_init(|| Regex::new(r"^(?:j+[aeiou]+)+j*[aeiou]*$").expect("valid regex"))
}

fn word_pattern() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"\w+").expect("valid regex"))
}

/// Collapse runs of the same character: "siii" -> "si", "okkk" -> "ok".
fn collapse_repeats(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev = None;
    for c in text.chars() {
        if prev != Some(c) {
            out.push(c);
        }
        prev = Some(c);
    }
    out
}

fn is_short(word: &str) -> bool {
    word.chars().count() <= MAX_SHORT_WORD_CHARS
}

/// Whether a message carries too little information to show.
///
/// In order: blank text is low-value; so is repeated laughter ("jaja",
/// "JEJEJE"). Otherwise repeated letters are collapsed and the text split
/// into words. A single word is low-value when it is a known filler word
/// or at most three characters long; several words are low-value only
/// when every one of them is that short.
pub fn is_low_value(text: &str) -> bool {
    let text = text.trim().to_lowercase();
    if text.is_empty() {
        return true;
    }

    if laughter_pattern().is_match(&text) {
        return true;
    }

    let collapsed = collapse_repeats(&text);
    let words: Vec<&str> = word_pattern()
        .find_iter(&collapsed)
        .map(|m| m.as_str())
        .collect();

    match words.as_slice() {
        [] => true,
        [word] => LOW_VALUE_WORDS.contains(word) || is_short(word),
        words => words.iter().all(|w| is_short(w)),
    }
}

/// Drop low-value messages from `results`, renumbering ranks from 1.
pub fn filter_low_value(results: &mut SearchResults) {
    let before = results.results.len();
    results.retain(|r| !is_low_value(r.message.search_text()));

    if results.results.len() < before {
        debug!(
            "Filtered {} low-value results",
            before - results.results.len()
        );
    }
}
