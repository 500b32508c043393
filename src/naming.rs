//! Name matching policies.
//!
//! Every comparison between a caller-supplied name and a schema name goes
//! through a [`NameMatcher`]. Three families exist:
//!
//! | Policy | Folding | Plural tolerant |
//! |--------|---------|-----------------|
//! | [`ExactMatch::strict`] | none | no |
//! | [`ExactMatch::alphanumeric`] | case and punctuation | no |
//! | [`BestMatch`] | case and punctuation | yes |

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, PoisonError, RwLock};

/// String equality strategy for schema names.
pub trait NameMatcher: Send + Sync + Debug {
    /// Strict policies compare ordinally and never normalize.
    fn is_strict(&self) -> bool;

    /// Returns true if `actual` (schema side) matches `requested` (caller side).
    fn is_match(&self, actual: &str, requested: &str) -> bool;

    /// Like [`is_match`](Self::is_match), comparing only the trailing simple
    /// name of namespace-qualified names.
    fn is_entity_type_match(&self, actual: &str, requested: &str) -> bool;
}

/// Lowercase and strip every non-alphanumeric character.
pub fn homogenize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Trailing simple name of a dot-qualified name.
pub fn simple_name(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((_, tail)) => tail,
        None => name,
    }
}

/// Ordinal comparison, optionally after homogenizing both names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExactMatch {
    alphanumeric: bool,
    case_insensitive: bool,
}

impl ExactMatch {
    pub const fn strict() -> Self {
        Self {
            alphanumeric: false,
            case_insensitive: false,
        }
    }

    pub const fn alphanumeric() -> Self {
        Self {
            alphanumeric: true,
            case_insensitive: false,
        }
    }

    pub const fn alphanumeric_case_insensitive() -> Self {
        Self {
            alphanumeric: true,
            case_insensitive: true,
        }
    }

    fn compare(&self, actual: &str, requested: &str) -> bool {
        let (actual, requested) = if self.alphanumeric {
            (homogenize(actual), homogenize(requested))
        } else {
            (actual.to_string(), requested.to_string())
        };

        if self.case_insensitive {
            actual.to_lowercase() == requested.to_lowercase()
        } else {
            actual == requested
        }
    }
}

impl NameMatcher for ExactMatch {
    fn is_strict(&self) -> bool {
        !self.alphanumeric
    }

    fn is_match(&self, actual: &str, requested: &str) -> bool {
        self.compare(actual, requested)
    }

    fn is_entity_type_match(&self, actual: &str, requested: &str) -> bool {
        self.compare(simple_name(actual), simple_name(requested))
    }
}

/// Homogenized comparison that also folds singular and plural forms.
#[derive(Debug, Clone)]
pub struct BestMatch {
    pluralizer: Arc<dyn Pluralizer>,
}

impl Default for BestMatch {
    fn default() -> Self {
        Self::new(Arc::new(CachedPluralizer::new(Arc::new(SimplePluralizer))))
    }
}

impl BestMatch {
    pub fn new(pluralizer: Arc<dyn Pluralizer>) -> Self {
        Self { pluralizer }
    }

    fn compare(&self, actual: &str, requested: &str) -> bool {
        let actual = homogenize(actual);
        let requested = homogenize(requested);

        if actual == requested {
            return true;
        }

        let p = &self.pluralizer;
        actual == p.singularize(&requested)
            || actual == p.pluralize(&requested)
            || p.singularize(&actual) == requested
            || p.pluralize(&actual) == requested
    }
}

impl NameMatcher for BestMatch {
    fn is_strict(&self) -> bool {
        false
    }

    fn is_match(&self, actual: &str, requested: &str) -> bool {
        self.compare(actual, requested)
    }

    fn is_entity_type_match(&self, actual: &str, requested: &str) -> bool {
        self.compare(simple_name(actual), simple_name(requested))
    }
}

/// Ordinal equality, no normalization.
pub fn strict() -> Arc<dyn NameMatcher> {
    Arc::new(ExactMatch::strict())
}

/// Homogenized ordinal equality.
pub fn alphanumeric() -> Arc<dyn NameMatcher> {
    Arc::new(ExactMatch::alphanumeric())
}

/// Homogenized case-insensitive equality.
pub fn alphanumeric_case_insensitive() -> Arc<dyn NameMatcher> {
    Arc::new(ExactMatch::alphanumeric_case_insensitive())
}

/// Permissive default policy.
pub fn not_strict() -> Arc<dyn NameMatcher> {
    Arc::new(BestMatch::default())
}

/// Singular/plural word forms.
pub trait Pluralizer: Send + Sync + Debug {
    fn pluralize(&self, word: &str) -> String;
    fn singularize(&self, word: &str) -> String;
}

const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "information",
    "rice",
    "money",
    "species",
    "series",
    "fish",
    "sheep",
    "deer",
    "news",
];

// (singular, plural)
const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("ox", "oxen"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("foot", "feet"),
    ("tooth", "teeth"),
    ("movie", "movies"),
    ("quiz", "quizzes"),
];

/// Rule-based English pluralizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimplePluralizer;

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Replace the last `strip` characters of `word` with `suffix`.
fn replace_suffix(word: &str, strip: usize, suffix: &str) -> String {
    let keep = word.chars().count().saturating_sub(strip);
    let mut result: String = word.chars().take(keep).collect();
    result.push_str(suffix);
    result
}

/// Carry the capitalization of the first letter of `like` over to `word`.
fn match_case(like: &str, word: &str) -> String {
    match like.chars().next() {
        Some(c) if c.is_uppercase() => {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
        _ => word.to_string(),
    }
}

impl Pluralizer for SimplePluralizer {
    fn pluralize(&self, word: &str) -> String {
        let lower = word.to_lowercase();
        if lower.is_empty() || UNCOUNTABLE.contains(&lower.as_str()) {
            return word.to_string();
        }
        if let Some((_, plural)) = IRREGULAR.iter().find(|(s, p)| *s == lower || *p == lower) {
            return match_case(word, plural);
        }

        let before_last = lower.chars().rev().nth(1);
        if lower.ends_with("man") {
            replace_suffix(word, 3, "men")
        } else if lower.ends_with('y') && before_last.map_or(false, |c| !is_vowel(c)) {
            replace_suffix(word, 1, "ies")
        } else if lower.ends_with("ife") {
            replace_suffix(word, 2, "ves")
        } else if lower.ends_with("lf") || lower.ends_with("rf") {
            replace_suffix(word, 1, "ves")
        } else if ["s", "x", "z", "ch", "sh"].iter().any(|s| lower.ends_with(s)) {
            replace_suffix(word, 0, "es")
        } else {
            replace_suffix(word, 0, "s")
        }
    }

    fn singularize(&self, word: &str) -> String {
        let lower = word.to_lowercase();
        if lower.is_empty() || UNCOUNTABLE.contains(&lower.as_str()) {
            return word.to_string();
        }
        if let Some((singular, _)) = IRREGULAR.iter().find(|(s, p)| *p == lower || *s == lower) {
            return match_case(word, singular);
        }

        if lower.ends_with("men") {
            replace_suffix(word, 3, "man")
        } else if lower.ends_with("ies") && lower.chars().count() > 3 {
            replace_suffix(word, 3, "y")
        } else if lower.ends_with("ives") {
            replace_suffix(word, 3, "fe")
        } else if lower.ends_with("lves") || lower.ends_with("rves") {
            replace_suffix(word, 3, "f")
        } else if ["sses", "xes", "zzes", "ches", "shes", "uses"]
            .iter()
            .any(|s| lower.ends_with(s))
        {
            replace_suffix(word, 2, "")
        } else if lower.ends_with("ss") || lower.ends_with("us") || lower.ends_with("is") {
            word.to_string()
        } else if lower.ends_with('s') {
            replace_suffix(word, 1, "")
        } else {
            word.to_string()
        }
    }
}

/// Memoizing wrapper; every form is computed once per input word.
#[derive(Debug)]
pub struct CachedPluralizer {
    inner: Arc<dyn Pluralizer>,
    plurals: RwLock<HashMap<String, String>>,
    singulars: RwLock<HashMap<String, String>>,
}

impl CachedPluralizer {
    pub fn new(inner: Arc<dyn Pluralizer>) -> Self {
        Self {
            inner,
            plurals: RwLock::new(HashMap::new()),
            singulars: RwLock::new(HashMap::new()),
        }
    }
}

fn memoize(
    cache: &RwLock<HashMap<String, String>>,
    word: &str,
    compute: impl FnOnce() -> String,
) -> String {
    if let Some(found) = cache
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(word)
    {
        return found.clone();
    }

    let value = compute();
    cache
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(word.to_string())
        .or_insert(value)
        .clone()
}

impl Pluralizer for CachedPluralizer {
    fn pluralize(&self, word: &str) -> String {
        memoize(&self.plurals, word, || self.inner.pluralize(word))
    }

    fn singularize(&self, word: &str) -> String {
        memoize(&self.singulars, word, || self.inner.singularize(word))
    }
}
