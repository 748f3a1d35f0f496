// ABOUTME: Shared cache of CSS selectors compiled for the streaming rewriter.
// ABOUTME: Also splits comma-separated selector lists into their individual selectors.

//! Selector compilation for streamed documents.
//!
//! Selectors are compiled by `lol_html`, which decides a match from an
//! element's start tag and its open ancestors. That covers type, class, id
//! and attribute selectors (with the `i`/`s` flags), `:not()`, the
//! `:nth-child` family and the descendant and child combinators. Sibling
//! combinators are rejected at compile time.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use once_cell::sync::Lazy;

pub use lol_html::Selector;

/// Split a comma-separated selector list into unique, trimmed selectors,
/// preserving first-seen order. Commas inside quotes, brackets or
/// parentheses are kept.
pub fn split_selector_list(list: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;

    let push = |s: &str, out: &mut Vec<String>| {
        let s = s.trim();
        if !s.is_empty() && !out.iter().any(|o| o == s) {
            out.push(s.to_string());
        }
    };

    for c in list.chars() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                push(&current, &mut out);
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    push(&current, &mut out);
    out
}

/// Thread-safe cache of compiled selectors. Invalid selectors are cached as `None`.
static SELECTOR_CACHE: Lazy<RwLock<HashMap<String, Option<Selector>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Gets or compiles a selector, caching the result.
///
/// Returns `None` for selectors the rewriter cannot evaluate; the reason is
/// logged once, when the selector is first compiled.
pub fn get_or_compile(css: &str) -> Option<Selector> {
    {
        let cache = SELECTOR_CACHE.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cache.get(css) {
            return cached.clone();
        }
    }

    let compiled = match css.parse::<Selector>() {
        Ok(selector) => Some(selector),
        Err(err) => {
            tracing::warn!(selector = css, %err, "selector will never match");
            None
        }
    };
    let mut cache = SELECTOR_CACHE.write().unwrap_or_else(PoisonError::into_inner);
    cache
        .entry(css.to_string())
        .or_insert(compiled)
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_selectors_compile_once() {
        let css = r#"img[class*="Badge" i]"#;
        assert!(get_or_compile(css).is_some());
        assert!(SELECTOR_CACHE.read().unwrap().contains_key(css));
        assert!(get_or_compile(css).is_some());

        for css in [
            r#"script[type="application/ld+json"]"#,
            r#"div[class*="AboutCharacter"]>script[type="application/ld+json"]"#,
            "h3:not(.hidden)",
            "li:first-child",
            r".a\:b",
        ] {
            assert!(get_or_compile(css).is_some(), "{}", css);
        }
    }

    #[test]
    fn unsupported_selectors_are_cached_as_none() {
        for css in ["h1 + p", "div ~ p", "[[[invalid", ""] {
            assert!(get_or_compile(css).is_none(), "{}", css);
            assert!(get_or_compile(css).is_none(), "{}", css);
        }
    }

    #[test]
    fn selector_lists_split_and_dedupe() {
        assert_eq!(
            split_selector_list(r#"h1, a[title="x,y"] , h1,p"#),
            vec!["h1", r#"a[title="x,y"]"#, "p"]
        );
        assert_eq!(
            split_selector_list("p:not(.a, .b), li"),
            vec!["p:not(.a, .b)", "li"]
        );
    }
}
