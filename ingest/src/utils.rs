//! Game-text cleanup.
//!
//! Upstream descriptions carry templating markers meant for the game client:
//! `{~s...}`/`{~p...}` singular/plural alternatives and `#N` value
//! placeholders. Rendered catalog text keeps the singular form and drops the
//! rest.

use regex::Regex;

use grimoire_model::LocalizedText;

pub fn strip_markup(input: &str) -> String {
    // singular form wins, plural and unknown markers are dropped
    let singular = Regex::new(r"\{~s([^}]*)\}").unwrap();
    let mut text = singular.replace_all(input, "$1").into_owned();

    let other_markers = Regex::new(r"\{~[^}]*\}").unwrap();
    text = other_markers.replace_all(&text, "").into_owned();

    let placeholders = Regex::new(r"#\d+").unwrap();
    text = placeholders.replace_all(&text, "").into_owned();

    let collapse = Regex::new(r" +").unwrap();
    collapse.replace_all(&text, " ").trim().to_owned()
}

pub fn strip_localized(text: LocalizedText) -> LocalizedText {
    LocalizedText {
        en: strip_markup(&text.en),
        fr: strip_markup(&text.fr),
        es: strip_markup(&text.es),
        de: strip_markup(&text.de),
        pt: strip_markup(&text.pt),
    }
}
