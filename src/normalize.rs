//! # Text normalization
//! Deterministic cleanup shared by training and inference:
//! lowercase → strip non-letters → split → drop stopwords → lemmatize → join.
//!
//! Characters that are not ASCII letters or whitespace are *removed*, not
//! replaced by a space, so `"f*ck-off"` becomes the single token `"fckoff"`.
//!
//! Known limitation: the output is not guaranteed to be a fixed point of
//! `normalize` (a lemma can itself match a rule on a second pass). The
//! online path normalizes twice and relies on this being stable for the
//! vocabulary it sees; see `moderation.rs` tests.
//!
//! Any change to [`STOPWORDS`] or to the lemmatizer tables changes what a
//! trained vocabulary means. Bump [`NORMALIZER_VERSION`] with it: artifacts
//! carrying another version are refused at load.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// Identifies the stopword list + lemmatizer tables compiled into this build.
pub const NORMALIZER_VERSION: &str = "en-stop179/noun-lemma-v2";

/// English stopword list (179 entries). Entries with an apostrophe never
/// match after stripping; they stay to keep the list identical to its source.
pub const STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan",
    "shan't", "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't",
    "wouldn", "wouldn't",
];

static STOPWORD_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| STOPWORDS.iter().copied().collect());

/// Irregular noun forms that suffix rules get wrong.
static EXCEPTIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("men", "man"),
        ("women", "woman"),
        ("children", "child"),
        ("feet", "foot"),
        ("teeth", "tooth"),
        ("geese", "goose"),
        ("mice", "mouse"),
        ("lice", "louse"),
        ("oxen", "ox"),
        ("wolves", "wolf"),
        ("knives", "knife"),
        ("wives", "wife"),
        ("lives", "life"),
        ("leaves", "leaf"),
        ("halves", "half"),
        ("selves", "self"),
        ("thieves", "thief"),
        ("shelves", "shelf"),
        ("loaves", "loaf"),
        ("calves", "calf"),
        ("data", "datum"),
        ("criteria", "criterion"),
        ("phenomena", "phenomenon"),
        ("cacti", "cactus"),
        ("fungi", "fungus"),
        ("crises", "crisis"),
        ("analyses", "analysis"),
        ("theses", "thesis"),
        ("species", "species"),
        ("series", "series"),
        ("news", "news"),
    ]
    .into_iter()
    .collect()
});

/// Words ending in `s` that are not plurals, or whose plural is the dictionary form.
static INVARIANT: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "always", "perhaps", "thanks", "pants", "jeans", "scissors", "trousers", "sometimes",
        "besides", "unless", "towards", "afterwards", "nowadays", "whereas", "overseas",
        "upstairs", "downstairs", "politics", "physics", "mathematics", "economics", "ethics",
        "athletics", "gymnastics",
    ]
    .into_iter()
    .collect()
});

/// Singulars ending in `ie`; their `-ies` plural is not `-y`.
static IE_SINGULARS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "movie", "cookie", "pie", "tie", "lie", "die", "rookie", "zombie", "hippie", "selfie",
        "brownie", "genie", "bookie", "goalie", "hoodie", "sweetie", "cutie", "newbie", "freebie",
        "groupie", "junkie", "calorie", "prairie", "smoothie", "aussie", "boogie", "roomie",
        "techie", "yuppie", "birdie", "auntie", "lassie", "indie", "magpie", "necktie",
    ]
    .into_iter()
    .collect()
});

/// Singulars ending in `che` or `xe`; the `-es` plural keeps the `e`.
static E_SINGULARS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "ache", "headache", "toothache", "heartache", "niche", "cache", "avalanche", "cliche",
        "moustache", "mustache", "psyche", "douche", "quiche", "creche", "microfiche", "axe",
        "panache",
    ]
    .into_iter()
    .collect()
});

/// Nouns ending in `us` whose plural is `-uses`.
static US_SINGULARS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "bus", "virus", "campus", "bonus", "census", "status", "genius", "circus", "chorus",
        "fetus", "sinus", "walrus", "octopus", "prospectus", "apparatus", "thesaurus", "surplus",
        "minus", "plus", "consensus", "corpus", "abacus", "lotus", "citrus", "focus", "hiatus",
        "platypus", "uterus", "impetus", "stimulus", "syllabus", "radius",
    ]
    .into_iter()
    .collect()
});

/// Suffix rules, longest first. `(suffix, replacement)`.
const SUFFIX_RULES: &[(&str, &str)] = &[
    ("sses", "ss"),
    ("shes", "sh"),
    ("ches", "ch"),
    ("xes", "x"),
    ("ies", "y"),
    ("s", ""),
];

/// Normalize raw text. Pure; empty input gives empty output.
pub fn normalize(text: &str) -> String {
    let stripped: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphabetic() || c.is_whitespace())
        .collect();

    stripped
        .split_whitespace()
        .filter(|tok| !is_stopword(tok))
        .map(lemmatize)
        .collect::<Vec<_>>()
        .join(" ")
}

#[inline]
pub fn is_stopword(token: &str) -> bool {
    STOPWORD_SET.contains(token)
}

/// Reduce a lowercase ASCII token to its base noun form.
///
/// Never returns a stopword: if the lemma would be one, the token is kept.
pub fn lemmatize(token: &str) -> String {
    if let Some(base) = EXCEPTIONS.get(token) {
        return (*base).to_string();
    }
    let lemma = apply_suffix_rules(token);
    if lemma.is_empty() || is_stopword(&lemma) {
        token.to_string()
    } else {
        lemma
    }
}

fn apply_suffix_rules(token: &str) -> String {
    if token.len() <= 3 || INVARIANT.contains(token) {
        return token.to_string();
    }
    if let Some(stem) = token.strip_suffix("ies") {
        let singular = format!("{stem}ie");
        if IE_SINGULARS.contains(singular.as_str()) {
            return singular;
        }
    }
    if let Some(stem) = token.strip_suffix("es") {
        if US_SINGULARS.contains(stem) {
            return stem.to_string();
        }
    }
    if let Some(stem) = token.strip_suffix('s') {
        if E_SINGULARS.contains(stem) {
            return stem.to_string();
        }
    }
    for (suffix, replacement) in SUFFIX_RULES {
        if let Some(stem) = token.strip_suffix(suffix) {
            match *suffix {
                // "dies" -> "die", not "dy"
                "ies" if token.len() <= 4 => continue,
                "s" if token.ends_with("ss") || token.ends_with("us") || token.ends_with("is") => {
                    return token.to_string();
                }
                _ => {}
            }
            return format!("{stem}{replacement}");
        }
    }
    token.to_string()
}
