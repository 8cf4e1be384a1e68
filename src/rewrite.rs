// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! URL prefix rewriting.
//!
//! Works much like Git's `url.<base>.insteadOf` setting. Each rule swaps one
//! URL prefix for another, so a CI host can point the pipeline at mirrors or
//! internal endpoints without changing command-line options.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Single prefix rewrite rule.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct UrlRewrite {
    /// Prefix to match.
    pub from: String,

    /// Replacement for matched prefix.
    pub to: String,
}

impl UrlRewrite {
    /// Construct new rewrite rule.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Rewrite URL with first matching rule.
///
/// Rules are tried in order. Only the first rule whose `from` prefix matches
/// is applied, and its output is never fed back through the rules. Returns
/// the URL untouched if no rule matches.
pub fn rewrite<'a>(url: impl AsRef<str>, rules: impl IntoIterator<Item = &'a UrlRewrite>) -> String {
    let url = url.as_ref();
    for rule in rules {
        if let Some(rest) = url.strip_prefix(rule.from.as_str()) {
            let result = format!("{}{rest}", rule.to);
            debug!("rewrite {url:?} to {result:?}");
            return result;
        }
    }

    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    fn rules() -> Vec<UrlRewrite> {
        vec![
            UrlRewrite::new("http://localhost:5984/", "http://couch.internal:5984/"),
            UrlRewrite::new("http://couch.internal", "http://elsewhere"),
            UrlRewrite::new("http://", "https://"),
        ]
    }

    #[test_case("http://localhost:5984/db", "http://couch.internal:5984/db"; "first match wins")]
    #[test_case("http://example.com/", "https://example.com/"; "later rule")]
    #[test_case("ftp://example.com/", "ftp://example.com/"; "no match")]
    #[test_case("", ""; "empty url")]
    #[test]
    fn rewrite_applies_one_rule(url: &str, expect: &str) {
        pretty_assertions::assert_eq!(rewrite(url, &rules()), expect);
    }

    #[test]
    fn rewrite_output_is_not_rewritten_again() {
        // Output matches the second rule's prefix, but rules apply once.
        let result = rewrite("http://localhost:5984/", &rules());
        pretty_assertions::assert_eq!(result, "http://couch.internal:5984/");
    }

    #[test]
    fn rewrite_without_rules() {
        pretty_assertions::assert_eq!(rewrite("http://a/", &[]), "http://a/");
    }
}
