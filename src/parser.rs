//! Parsers that turn the XKB layout configuration into a [`LayoutList`].
//!
//! Two input shapes exist:
//!
//! * the **symbol-atom** string, e.g.
//!   `pc+us+ru:2+inet(evdev)+group(alt_shift_toggle)`, where real layouts are
//!   mixed with device and option tokens and `:N` suffixes.  Handled by
//!   [`SymbolParser`] / [`parse`].
//! * the **layout/variant** pair from the rules-names property, e.g.
//!   `us,de` and `,qwerty`.  Handled by [`parse_layout_variant`].
//!
//! Both are pure functions of their input.

use crate::layout::{LayoutEntry, LayoutList, NonSymbolSet};
use serde::{Deserialize, Serialize};

/// Which characters end a token in a symbol-atom string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Separators {
    /// Only `+`.
    Plus,
    /// `+`, and `_` outside of parentheses.
    ///
    /// Some servers report `pc_us_ru_2_inet(evdev)`.  Inside a note the
    /// underscore stays part of the text, so `group(alt_shift_toggle)` is
    /// still one token.  `+` is not guarded this way: it ends the token at
    /// any depth, so `de(a+b)` is dropped as unbalanced.
    #[default]
    PlusUnderscore,
}

/// Scanner state for the token currently being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ok,
    /// After `:`; the rest of the token is a group suffix or an option.
    Skip,
    /// An unexpected character was seen; the token is dropped.
    Broken,
}

/// Characters allowed in a layout symbol or its note.
fn is_symbol_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'
}

/// Symbol-atom parser configured with a stop-list and a separator dialect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolParser {
    nonsymbols: NonSymbolSet,
    separators: Separators,
}

impl SymbolParser {
    pub fn new(nonsymbols: NonSymbolSet, separators: Separators) -> Self {
        Self {
            nonsymbols,
            separators,
        }
    }

    pub fn nonsymbols(&self) -> &NonSymbolSet {
        &self.nonsymbols
    }

    pub fn separators(&self) -> Separators {
        self.separators
    }

    /// Whether `symbol` names a layout: non-empty, not reserved, and not
    /// starting with a digit.
    pub fn accepts(&self, symbol: &str) -> bool {
        !symbol.is_empty()
            && !self.nonsymbols.contains(symbol)
            && !symbol.starts_with(|c: char| c.is_ascii_digit())
    }

    /// Parse a symbol-atom string.
    ///
    /// Malformed tokens are dropped and parsing continues with the next one;
    /// the result may be empty.
    pub fn parse(&self, symbols: &str) -> LayoutList {
        let mut out = LayoutList::default();
        let mut state = State::Ok;
        let mut depth: i32 = 0;
        let mut symbol = String::new();
        let mut note = String::new();

        for ch in symbols.chars() {
            let terminates = match self.separators {
                Separators::Plus => ch == '+',
                Separators::PlusUnderscore => ch == '+' || (ch == '_' && depth == 0),
            };

            if terminates {
                if state != State::Broken && depth == 0 {
                    self.commit(&mut out, &symbol, &note);
                }
                state = State::Ok;
                depth = 0;
                symbol.clear();
                note.clear();
                continue;
            }

            if state != State::Ok {
                continue;
            }

            match ch {
                '(' => depth += 1,
                ')' => depth -= 1,
                ':' if depth == 0 => state = State::Skip,
                ':' => note.push(ch),
                c if is_symbol_char(c) => {
                    if depth == 0 {
                        symbol.push(c);
                    } else {
                        note.push(c);
                    }
                }
                _ => state = State::Broken,
            }
        }

        if state != State::Broken && depth == 0 {
            self.commit(&mut out, &symbol, &note);
        }

        out
    }

    fn commit(&self, out: &mut LayoutList, symbol: &str, note: &str) {
        if self.accepts(symbol) {
            out.push(LayoutEntry::new(symbol, note));
        }
    }
}

/// Parse a symbol-atom string with the default separators.
pub fn parse(symbols: &str, nonsymbols: &NonSymbolSet) -> LayoutList {
    SymbolParser::new(nonsymbols.clone(), Separators::default()).parse(symbols)
}

/// Zip comma-separated `layout` and `variant` lists into a [`LayoutList`].
///
/// Positions run until both lists are exhausted; a position with an empty
/// layout is skipped.  No stop-list filtering is applied.
pub fn parse_layout_variant(layout: &str, variant: &str) -> LayoutList {
    let split = |s: &str| -> Vec<String> {
        if s.is_empty() {
            Vec::new()
        } else {
            s.split(',').map(str::to_string).collect()
        }
    };
    let layouts = split(layout);
    let variants = split(variant);

    let mut out = LayoutList::default();
    for i in 0..layouts.len().max(variants.len()) {
        let l = layouts.get(i).map_or("", String::as_str);
        let v = variants.get(i).map_or("", String::as_str);
        if !l.is_empty() {
            out.push(LayoutEntry::new(l, v));
        }
    }
    out
}
