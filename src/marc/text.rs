//! Text cleanup shared by every derived bibliographic field.

use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

static TRAILING_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" *[ ,/;:] *$").expect("valid regex"));
static TRAILING_PERIOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"( *\w{3,})\. *$").expect("valid regex"));

/// Trim punctuation from a derived MARC field value.
///
/// - one trailing comma, slash, semicolon or colon, with surrounding spaces;
/// - a trailing period only when preceded by at least three word characters;
/// - one matched pair of leading/trailing square brackets, when the interior
///   contains no further brackets.
pub fn trim_punctuation(value: &str) -> String {
    let mut s = TRAILING_PUNCT.replace(value, "").into_owned();
    s = TRAILING_PERIOD.replace(&s, "$1").into_owned();

    let trimmed = s.trim();
    if let Some(inner) = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        if !inner.contains('[') && !inner.contains(']') {
            return inner.trim().to_string();
        }
    }
    trimmed.to_string()
}

/// One chunk of a natural-sort key: either a number or a lowercase text run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortChunk {
    Number(u64),
    Text(String),
}

impl Ord for SortChunk {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortChunk::Number(a), SortChunk::Number(b)) => a.cmp(b),
            (SortChunk::Text(a), SortChunk::Text(b)) => a.cmp(b),
            // Numbers order before text so "v.2" precedes "v.suppl"
            (SortChunk::Number(_), SortChunk::Text(_)) => Ordering::Less,
            (SortChunk::Text(_), SortChunk::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for SortChunk {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Digit-aware sort key, so "Box 2" orders before "Box 10".
pub fn natural_sort_key(label: &str) -> Vec<SortChunk> {
    let label = label.to_lowercase();
    let mut chunks = Vec::new();
    let mut text = String::new();
    let mut digits = String::new();

    let flush_text = |text: &mut String, chunks: &mut Vec<SortChunk>| {
        if !text.is_empty() {
            chunks.push(SortChunk::Text(std::mem::take(text)));
        }
    };

    for ch in label.chars() {
        if ch.is_ascii_digit() {
            flush_text(&mut text, &mut chunks);
            digits.push(ch);
        } else {
            if !digits.is_empty() {
                // Absurdly long digit runs fall back to text comparison
                match digits.parse::<u64>() {
                    Ok(n) => chunks.push(SortChunk::Number(n)),
                    Err(_) => chunks.push(SortChunk::Text(std::mem::take(&mut digits))),
                }
                digits.clear();
            }
            text.push(ch);
        }
    }
    flush_text(&mut text, &mut chunks);
    if !digits.is_empty() {
        match digits.parse::<u64>() {
            Ok(n) => chunks.push(SortChunk::Number(n)),
            Err(_) => chunks.push(SortChunk::Text(digits)),
        }
    }
    chunks
}

/// Normalize an 020 $a value to a bare ISBN.
///
/// The subfield often carries notes ("123456789X (paperback)"); keep the
/// leading ISBN token only, and only when it is a plausible 10/13-digit form.
pub fn normalize_isbn(value: &str) -> Option<String> {
    let token: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x' || *c == '-')
        .filter(|c| *c != '-')
        .collect();
    let token = token.to_uppercase();
    match token.len() {
        10 | 13 => Some(token),
        _ => None,
    }
}

/// Normalize an 022 $a value to hyphenated NNNN-NNNN form.
pub fn normalize_issn(value: &str) -> Option<String> {
    let digits: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x')
        .collect();
    if digits.len() != 8 {
        return None;
    }
    let digits = digits.to_uppercase();
    Some(format!("{}-{}", &digits[0..4], &digits[4..8]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_separators() {
        assert_eq!(trim_punctuation("New York :"), "New York");
        assert_eq!(trim_punctuation("Smith, John,"), "Smith, John");
        assert_eq!(trim_punctuation("papers /"), "papers");
        assert_eq!(trim_punctuation("ideas ;"), "ideas");
    }

    #[test]
    fn trims_period_only_after_three_word_chars() {
        assert_eq!(trim_punctuation("totalitarianism."), "totalitarianism");
        // Too few word characters before the period: initials keep theirs
        assert_eq!(trim_punctuation("J. R."), "J. R.");
    }

    #[test]
    fn strips_matched_bracket_pair() {
        assert_eq!(trim_punctuation("[New York]"), "New York");
        // Unmatched or internal brackets are left alone
        assert_eq!(trim_punctuation("[New York"), "[New York");
        assert_eq!(trim_punctuation("[a [b] c]"), "[a [b] c]");
    }

    #[test]
    fn trim_is_idempotent() {
        for s in [
            "New York :",
            "[New York]",
            "totalitarianism.",
            "J. R.",
            "  spaced out , ",
            "",
            "plain",
        ] {
            let once = trim_punctuation(s);
            assert_eq!(trim_punctuation(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn natural_sort_orders_digits_numerically() {
        let mut labels = vec!["Box 2", "Box 10", "Box 1"];
        labels.sort_by_key(|l| natural_sort_key(l));
        assert_eq!(labels, vec!["Box 1", "Box 2", "Box 10"]);
    }

    #[test]
    fn natural_sort_is_case_insensitive() {
        let mut labels = vec!["box 2", "Box 10"];
        labels.sort_by_key(|l| natural_sort_key(l));
        assert_eq!(labels, vec!["box 2", "Box 10"]);
    }

    #[test]
    fn isbn_normalization() {
        assert_eq!(
            normalize_isbn("123456789X (paperback)"),
            Some("123456789X".to_string())
        );
        assert_eq!(
            normalize_isbn("978-0-306-40615-7"),
            Some("9780306406157".to_string())
        );
        assert_eq!(normalize_isbn("badvalue"), None);
    }

    #[test]
    fn issn_normalization() {
        assert_eq!(normalize_issn("0003-486X"), Some("0003-486X".to_string()));
        assert_eq!(normalize_issn("0003486X"), Some("0003-486X".to_string()));
        assert_eq!(normalize_issn("123"), None);
    }
}
