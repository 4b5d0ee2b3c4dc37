//! Track title/artist canonicalization used by the matcher.
//!
//! Both catalogs decorate the same recording differently ("Song (Live)
//! [2011 Remaster]" vs "Song"), so comparisons run on a canonical form.

use deunicode::deunicode;
use once_cell::sync::Lazy;
use regex::Regex;

// Parentheses, brackets, dashes (ASCII, en, em), underscores and colons all
// act as title decoration separators.
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[()\[\]\-\u{2013}\u{2014}_:]").unwrap());

// Qualifier words that describe a variant of a recording, not the recording.
static QUALIFIERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(remaster(ed)?|live|remix|karaoke|instrumental|mono|commentary)\b").unwrap()
});

// Everything from a featuring credit onward is dropped.
static FEATURING: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(feat\.?|with)\b.*$").unwrap());

/// Canonicalize a title or artist name for cross-catalog comparison.
///
/// Lowercases, strips diacritics, converts bracket/dash/colon decoration to
/// spaces, removes variant qualifier words, truncates at a featuring credit,
/// and collapses whitespace. Pure and idempotent.
pub fn normalize(text: &str) -> String {
    let text = deunicode(text).to_lowercase();
    let text = SEPARATORS.replace_all(&text, " ");
    let text = QUALIFIERS.replace_all(&text, "");
    let text = FEATURING.replace(&text, "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
