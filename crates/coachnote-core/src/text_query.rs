//! Parsing of free-text search input.
//!
//! Input follows the usual search-box conventions:
//!
//! - `"exact phrase"` is kept verbatim as a phrase
//! - `-word` or `-"some phrase"` excludes notes containing it
//! - every other whitespace-separated word is a plain term
//!
//! Matching rule handed to the store: every phrase must match; when there are
//! no phrases at least one plain term must match; no excluded item may match.
//! Plain terms next to phrases only contribute to relevance.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static PHRASE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(-?)"([^"]*)""#).expect("phrase pattern is valid"));

/// A parsed text query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextQuery {
    /// Plain words.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub terms: Vec<String>,
    /// Quoted phrases, verbatim apart from surrounding whitespace.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phrases: Vec<String>,
    /// Negated words or phrases.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded: Vec<String>,
}

impl TextQuery {
    /// Parse raw query text.
    ///
    /// Returns `None` when nothing searchable remains (blank input, `""`, a
    /// lone `-`), in which case no text constraint applies.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let mut query = TextQuery::default();

        for caps in PHRASE_PATTERN.captures_iter(raw) {
            let negated = !caps[1].is_empty();
            let phrase = caps[2].split_whitespace().collect::<Vec<_>>().join(" ");
            if phrase.is_empty() {
                continue;
            }
            if negated {
                query.excluded.push(phrase);
            } else {
                query.phrases.push(phrase);
            }
        }

        let remainder = PHRASE_PATTERN.replace_all(raw, " ");
        for token in remainder.split_whitespace() {
            // Unbalanced quotes are dropped rather than rejected.
            let token = token.trim_matches('"');
            if let Some(word) = token.strip_prefix('-') {
                let word = word.trim_matches('"');
                if !word.is_empty() {
                    query.excluded.push(word.to_string());
                }
            } else if !token.is_empty() {
                query.terms.push(token.to_string());
            }
        }

        if query.is_empty() {
            None
        } else {
            Some(query)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.phrases.is_empty() && self.excluded.is_empty()
    }

    /// Whether the query has anything to match positively (as opposed to
    /// exclusions only).
    pub fn has_positive(&self) -> bool {
        !self.terms.is_empty() || !self.phrases.is_empty()
    }

    /// Items a note must match: all phrases if any, otherwise any term.
    ///
    /// Rendered in `websearch_to_tsquery` syntax.
    pub fn positive_expression(&self) -> Option<String> {
        if !self.phrases.is_empty() {
            Some(
                self.phrases
                    .iter()
                    .map(|p| quote(p))
                    .collect::<Vec<_>>()
                    .join(" "),
            )
        } else if !self.terms.is_empty() {
            Some(self.terms.join(" or "))
        } else {
            None
        }
    }

    /// Items a note must not match, OR-combined.
    pub fn excluded_expression(&self) -> Option<String> {
        if self.excluded.is_empty() {
            return None;
        }
        Some(
            self.excluded
                .iter()
                .map(|item| {
                    if item.contains(char::is_whitespace) {
                        quote(item)
                    } else {
                        item.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join(" or "),
        )
    }

    /// Every positive item OR-combined, used for ranking.
    pub fn rank_expression(&self) -> Option<String> {
        if !self.has_positive() {
            return None;
        }
        let items: Vec<String> = self
            .phrases
            .iter()
            .map(|p| quote(p))
            .chain(self.terms.iter().cloned())
            .collect();
        Some(items.join(" or "))
    }
}

fn quote(phrase: &str) -> String {
    format!("\"{}\"", phrase)
}

impl std::fmt::Display for TextQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts: Vec<String> = self.phrases.iter().map(|p| quote(p)).collect();
        parts.extend(self.terms.iter().cloned());
        parts.extend(self.excluded.iter().map(|e| {
            if e.contains(char::is_whitespace) {
                format!("-{}", quote(e))
            } else {
                format!("-{}", e)
            }
        }));
        f.write_str(&parts.join(" "))
    }
}
