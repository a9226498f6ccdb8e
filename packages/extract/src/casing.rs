//! Title casing for values reports print in all capitals.

use std::sync::LazyLock;

use regex::Regex;

/// Minor words kept lowercase unless they start a sentence.
const MINOR_WORDS: &[&str] = &[
    "a", "across", "among", "an", "and", "as", "at", "between", "but", "by", "for", "from", "in",
    "into", "is", "of", "on", "or", "over", "per", "the", "through", "to", "under", "upon", "via",
    "vs", "with", "within", "without",
];

/// Abbreviations kept uppercase.
const ACRONYMS: &[&str] = &[
    "LLC", "INC", "CORP", "LTD", "LP", "LLP", "PC", "MD", "RN", "LVN", "CNA", "MSW", "LCSW", "DDS",
    "DVM", "CCR", "CFR", "USC", "ILS", "HSC", "WIC", "ID", "SSN", "DOB", "POC", "DCF", "USA", "EST",
    "PST", "GMT", "UTC", "CEO", "CFO", "COO", "HR", "QA", "FDA", "CDC", "OSHA", "EPA",
];

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+\s*").unwrap_or_else(|_| unreachable!()));

/// Converts all-caps sentences in `text` to title case.
///
/// Sentences that already contain lowercase letters, or have three or fewer
/// letters, are returned untouched. Within a converted sentence, known
/// acronyms stay uppercase and minor words after the first are lowercased.
/// Whitespace inside a converted sentence is collapsed to single spaces.
#[must_use]
pub fn smart_title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for m in SENTENCE_END.find_iter(text) {
        out.push_str(&title_case_sentence(&text[last..m.start()]));
        out.push_str(m.as_str());
        last = m.end();
    }
    out.push_str(&title_case_sentence(&text[last..]));

    out
}

fn title_case_sentence(sentence: &str) -> String {
    let letters = sentence.chars().filter(|c| c.is_alphabetic()).count();
    let shouting = letters > 3 && !sentence.chars().any(char::is_lowercase);
    if !shouting {
        return sentence.to_owned();
    }

    sentence
        .split_whitespace()
        .enumerate()
        .map(|(i, word)| title_case_word(word, i == 0))
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case_word(word: &str, first: bool) -> String {
    let start = word
        .find(char::is_alphanumeric)
        .unwrap_or(word.len());
    let end = word
        .rfind(char::is_alphanumeric)
        .map_or(start, |i| i + word[i..].chars().next().map_or(1, char::len_utf8));

    if start >= end {
        return word.to_owned();
    }

    let (lead, rest) = word.split_at(start);
    let (core, trail) = rest.split_at(end - start);
    let upper = core.to_uppercase();

    let core = if ACRONYMS.contains(&upper.as_str()) {
        upper
    } else if !first && MINOR_WORDS.contains(&core.to_lowercase().as_str()) {
        core.to_lowercase()
    } else {
        capitalize(core)
    };

    format!("{lead}{core}{trail}")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
    })
}
