//! Character cleanup applied to every normalized text.
//!
//! Government report generators frequently emit UTF-8 that has been
//! misread as Windows-1252 somewhere along the way (`â€™` for `'`), as well
//! as typographic punctuation that would otherwise need to be special-cased
//! in every pattern. Both are folded to plain ASCII here, before any
//! segmentation or matching.

/// Mis-decoded sequences, longest first so that a prefix never shadows a
/// longer sequence.
const MOJIBAKE: &[(&str, &str)] = &[
    ("Ã¢â¬Â¦", "..."),
    ("Ã¢â¬â¢", "'"),
    ("â€™", "'"),
    ("â€˜", "'"),
    ("â€œ", "\""),
    ("â€\u{9d}", "\""),
    ("â€“", "-"),
    ("â€”", "-"),
    ("â€¦", "..."),
    ("â€¢", "\u{2022}"),
    ("â€", "\""),
    ("Â\u{a0}", " "),
    ("Â ", " "),
    ("Â·", "·"),
    ("Â°", "°"),
];

/// Typographic characters and their ASCII equivalents.
const TYPOGRAPHIC: &[(char, &str)] = &[
    ('\u{a0}', " "),
    ('\u{2018}', "'"),
    ('\u{2019}', "'"),
    ('\u{201a}', "'"),
    ('\u{201c}', "\""),
    ('\u{201d}', "\""),
    ('\u{201e}', "\""),
    ('\u{2013}', "-"),
    ('\u{2014}', "-"),
    ('\u{2212}', "-"),
    ('\u{2026}', "..."),
    ('\u{fb01}', "fi"),
    ('\u{fb02}', "fl"),
    ('\u{00ad}', ""),
    ('\u{200b}', ""),
    ('\u{feff}', ""),
    ('\u{0c}', "\n"),
];

/// Cleans `text`: repairs mis-decoded sequences, folds typographic
/// punctuation to ASCII, and normalizes line endings to `\n`.
///
/// Bullets (`•`) are kept, since list fields split on them.
#[must_use]
pub fn clean(text: &str) -> String {
    let mut text = text.replace("\r\n", "\n").replace('\r', "\n");

    for (bad, good) in MOJIBAKE {
        if text.contains(bad) {
            text = text.replace(bad, good);
        }
    }

    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match TYPOGRAPHIC.iter().find(|(c, _)| *c == ch) {
            Some((_, replacement)) => out.push_str(replacement),
            None => out.push(ch),
        }
    }

    out
}
