//! Layout names and the lists they live in.
//!
//! A [`LayoutList`] is the ordered set of keyboard layouts configured on the
//! session.  The position of an entry in the list is its XKB *group* number,
//! so the list is the bridge between the integer the X server reports and
//! the name a user recognises (`us`, `de(qwerty)`, …).
//!
//! The symbol-atom form of the configuration mixes real layouts with option
//! and device tokens; [`NonSymbolSet`] names the tokens that must never be
//! mistaken for a layout.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved words that appear in a symbol-atom string but never name a
/// selectable layout.
///
/// Order is preserved as given; membership checks are linear, which is fine
/// for the handful of words involved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NonSymbolSet(Vec<String>);

impl NonSymbolSet {
    /// The stop-list used when nothing else is configured.
    pub const STANDARD: [&'static str; 5] = ["group", "inet", "pc", "ctrl", "ctr"];

    /// Build a set from any list of words.  Duplicates are dropped, keeping
    /// the first occurrence.
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self(Vec::new());
        set.extend(words);
        set
    }

    /// Add more words to the set.
    pub fn extend<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for word in words {
            let word = word.into();
            if !self.contains(&word) {
                self.0.push(word);
            }
        }
    }

    /// Whether `word` is a reserved, non-layout token.
    pub fn contains(&self, word: &str) -> bool {
        self.0.iter().any(|w| w == word)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for NonSymbolSet {
    fn default() -> Self {
        Self::new(Self::STANDARD)
    }
}

/// One configured layout: a base symbol and an optional variant.
///
/// Renders as `symbol` or `symbol(variant)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LayoutEntry {
    symbol: String,
    variant: Option<String>,
}

impl LayoutEntry {
    /// Create an entry.  An empty `variant` is treated as no variant.
    pub fn new(symbol: impl Into<String>, variant: impl Into<String>) -> Self {
        let variant = variant.into();
        Self {
            symbol: symbol.into(),
            variant: (!variant.is_empty()).then_some(variant),
        }
    }

    /// The base layout symbol, e.g. `us`.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// The variant annotation, e.g. `alt-intl`.
    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }

    /// Whether this entry renders exactly as `name`.
    pub fn matches(&self, name: &str) -> bool {
        match &self.variant {
            None => self.symbol == name,
            Some(variant) => name
                .strip_prefix(self.symbol.as_str())
                .and_then(|rest| rest.strip_prefix('('))
                .and_then(|rest| rest.strip_suffix(')'))
                .is_some_and(|inner| inner == variant),
        }
    }
}

impl fmt::Display for LayoutEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variant {
            Some(variant) => write!(f, "{}({})", self.symbol, variant),
            None => write!(f, "{}", self.symbol),
        }
    }
}

/// Errors from resolving a group against a [`LayoutList`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    /// The session reported a group the configuration does not contain.
    #[error("group {group} is out of range ({len} layout(s) configured)")]
    GroupIndexOutOfRange { group: usize, len: usize },
}

/// The ordered layouts of a session.  Index `i` is XKB group `i`.
///
/// An empty list is a valid value meaning "no layouts configured".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutList(Vec<LayoutEntry>);

impl LayoutList {
    pub fn new(entries: Vec<LayoutEntry>) -> Self {
        Self(entries)
    }

    /// Entry for `group`.
    pub fn get(&self, group: usize) -> Result<&LayoutEntry, LayoutError> {
        self.0.get(group).ok_or(LayoutError::GroupIndexOutOfRange {
            group,
            len: self.0.len(),
        })
    }

    /// Group number of the first entry rendering as `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|e| e.matches(name))
    }

    /// The group following `group`, wrapping around to the first.
    ///
    /// Returns `None` when `group` is not in the list, including for an
    /// empty list.
    pub fn next_after(&self, group: usize) -> Option<usize> {
        (group < self.0.len()).then(|| (group + 1) % self.0.len())
    }

    pub fn iter(&self) -> impl Iterator<Item = &LayoutEntry> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rendered names, in group order.
    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }

    /// Join the entries back into a `+`-separated symbol-atom string.
    pub fn to_symbols(&self) -> String {
        self.names().join("+")
    }

    /// Append an entry.  Used while building a list.
    pub(crate) fn push(&mut self, entry: LayoutEntry) {
        self.0.push(entry);
    }
}

/// `[us de(qwerty)]`, the form used in diagnostics.
impl fmt::Display for LayoutList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.names().join(" "))
    }
}

impl<'a> IntoIterator for &'a LayoutList {
    type Item = &'a LayoutEntry;
    type IntoIter = std::slice::Iter<'a, LayoutEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The `layout` and `variant` fields of the XKB rules-names property.
///
/// Both are comma-separated lists that line up position by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutVariant {
    pub layout: String,
    pub variant: String,
}

impl LayoutVariant {
    /// Layout assumed when the property carries none.
    pub const DEFAULT_LAYOUT: &'static str = "us";

    /// Decode the raw bytes of `_XKB_RULES_NAMES`.
    ///
    /// The property is a NUL-separated list: rules, model, layout, variant,
    /// options.  Missing or empty fields fall back to `us` for the layout and
    /// an empty variant.
    pub fn from_rules_property(raw: &[u8]) -> Self {
        let mut fields = raw.split(|b| *b == 0).map(String::from_utf8_lossy);
        let layout = fields.nth(2).filter(|l| !l.is_empty());
        let variant = fields.next();
        Self {
            layout: layout.map_or_else(|| Self::DEFAULT_LAYOUT.to_string(), |l| l.into_owned()),
            variant: variant.map(|v| v.into_owned()).unwrap_or_default(),
        }
    }
}

impl fmt::Display for LayoutVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layout={} variant={}", self.layout, self.variant)
    }
}
