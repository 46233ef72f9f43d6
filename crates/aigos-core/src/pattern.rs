// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! Pattern classification, matching, and the LRU-bounded compiled-pattern
//! cache shared by the policy engine's capability and resource gates.
//!
//! Patterns are classified once, at insertion time:
//!
//! - **Literal** — no glob or regex metacharacters; compared with `==`.
//! - **Glob** — contains only `*`/`?`; translated to a regex (`*` → `.*`,
//!   `?` → `.`) and anchored.
//! - **Regex** — contains other unescaped regex metacharacters; used as
//!   given, anchored.
//!
//! Compiled regexes are cached in an LRU bounded by [`PatternCacheConfig`]
//! (default 1000). On eviction the regex is dropped — never recompiled
//! lazily mid-check, per the kernel's latency contract.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

/// How a pattern was classified on insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatternKind {
    Literal,
    Glob,
    Regex,
}

fn classify(pattern: &str) -> PatternKind {
    if pattern == "*" {
        return PatternKind::Glob;
    }
    let has_glob_chars = pattern.contains('*') || pattern.contains('?');
    // '.' is deliberately excluded: it's the only metacharacter that shows up
    // in ordinary literals (domain names), and anchor_regex doesn't escape it.
    // A pattern of just dots and otherwise-plain chars stays Literal and is
    // compared with `==`; one that also has '*'/'?' still becomes Glob, whose
    // glob_to_regex path escapes '.' correctly.
    let has_regex_meta = pattern
        .chars()
        .any(|c| matches!(c, '[' | ']' | '(' | ')' | '+' | '^' | '$' | '|' | '{' | '}' | '\\'));
    if has_regex_meta {
        PatternKind::Regex
    } else if has_glob_chars {
        PatternKind::Glob
    } else {
        PatternKind::Literal
    }
}

fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            // Escape anything the translated glob might accidentally turn
            // into regex syntax (e.g. a literal '.' in "api.example.com").
            '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out.push('$');
    out
}

fn anchor_regex(pattern: &str) -> String {
    let mut anchored = String::with_capacity(pattern.len() + 2);
    if !pattern.starts_with('^') {
        anchored.push('^');
    }
    anchored.push_str(pattern);
    if !pattern.ends_with('$') {
        anchored.push('$');
    }
    anchored
}

/// Whether `action` matches `pattern`, classifying and (under `std`)
/// compiling as needed. Under `no_std` only literal and `*` patterns match;
/// glob/regex patterns never match (conservative: they behave as denied
/// allow-list entries, never as accidental allows).
pub fn matches(pattern: &str, action: &str) -> bool {
    match classify(pattern) {
        PatternKind::Literal => pattern == action,
        PatternKind::Glob if pattern == "*" => true,
        #[cfg(feature = "std")]
        PatternKind::Glob => {
            let regex_src = glob_to_regex(pattern);
            cache::global().with_compiled(&regex_src, |re| re.is_match(action))
        }
        #[cfg(not(feature = "std"))]
        PatternKind::Glob => false,
        #[cfg(feature = "std")]
        PatternKind::Regex => {
            let regex_src = anchor_regex(pattern);
            cache::global().with_compiled(&regex_src, |re| re.is_match(action))
        }
        #[cfg(not(feature = "std"))]
        PatternKind::Regex => false,
    }
}

/// Whether any pattern in `patterns` matches `action`. Empty slice never
/// matches.
pub fn any_matches<'a>(patterns: impl IntoIterator<Item = &'a str>, action: &str) -> bool {
    patterns.into_iter().any(|p| matches(p, action))
}

/// Domain-specific match: patterns beginning with `"*."` match both the bare
/// apex and any deeper subdomain, in addition to ordinary glob/regex/literal
/// semantics.
pub fn domain_matches<'a>(patterns: impl IntoIterator<Item = &'a str>, host: &str) -> bool {
    for pattern in patterns {
        if let Some(apex) = pattern.strip_prefix("*.") {
            if host == apex || host.ends_with(&{
                let mut suffix = String::from(".");
                suffix.push_str(apex);
                suffix
            }) {
                return true;
            }
            continue;
        }
        if matches(pattern, host) {
            return true;
        }
    }
    false
}

/// Extract the host to match domain patterns against: the URL host when
/// `resource` parses as a URL, otherwise the verbatim string.
pub fn resource_host(resource: &str) -> String {
    if let Some(rest) = resource
        .strip_prefix("https://")
        .or_else(|| resource.strip_prefix("http://"))
    {
        let host_and_rest = rest.split(['/', '?', '#']).next().unwrap_or(rest);
        let host = host_and_rest.rsplit('@').next().unwrap_or(host_and_rest);
        let host = host.split(':').next().unwrap_or(host);
        host.to_string()
    } else {
        resource.to_string()
    }
}

// ---------------------------------------------------------------------------
// LRU compiled-pattern cache (std only — no_std path never compiles regexes)
// ---------------------------------------------------------------------------

#[cfg(feature = "std")]
mod cache {
    use super::*;
    use lru::LruCache;
    use parking_lot::Mutex;
    use std::num::NonZeroUsize;
    use std::sync::OnceLock;

    /// Configuration for the compiled-pattern LRU.
    #[derive(Debug, Clone, Copy)]
    pub struct PatternCacheConfig {
        pub max_size: usize,
    }

    impl Default for PatternCacheConfig {
        fn default() -> Self {
            Self { max_size: 1000 }
        }
    }

    /// Read-dominant LRU of compiled regexes, shared process-wide.
    ///
    /// Readers never block writers on eviction: a single `parking_lot::Mutex`
    /// guards the map itself, but the critical section is just a hash lookup
    /// plus, on miss, a compile-and-insert — no I/O, no long-held locks.
    pub struct PatternCache {
        inner: Mutex<LruCache<String, regex::Regex>>,
    }

    impl PatternCache {
        pub fn with_capacity(max_size: usize) -> Self {
            let cap = NonZeroUsize::new(max_size.max(1)).unwrap();
            Self { inner: Mutex::new(LruCache::new(cap)) }
        }

        /// Resize the cache, evicting the least-recently-used entries first.
        pub fn resize(&self, max_size: usize) {
            let cap = NonZeroUsize::new(max_size.max(1)).unwrap();
            self.inner.lock().resize(cap);
        }

        pub fn len(&self) -> usize {
            self.inner.lock().len()
        }

        /// Look up or compile `regex_src`, then run `f` against the compiled
        /// regex. Returns the conservative default (no match) if the source
        /// fails to compile — a malformed pattern denies rather than panics.
        pub fn with_compiled<R>(&self, regex_src: &str, f: impl FnOnce(&regex::Regex) -> R) -> R
        where
            R: Default,
        {
            {
                let mut guard = self.inner.lock();
                if let Some(re) = guard.get(regex_src) {
                    return f(re);
                }
            }
            let compiled = match regex::Regex::new(regex_src) {
                Ok(re) => re,
                Err(_) => return R::default(),
            };
            let result = f(&compiled);
            self.inner.lock().put(regex_src.to_string(), compiled);
            result
        }
    }

    pub(super) fn global() -> &'static PatternCache {
        static CACHE: OnceLock<PatternCache> = OnceLock::new();
        CACHE.get_or_init(|| PatternCache::with_capacity(PatternCacheConfig::default().max_size))
    }

    /// Reconfigure the process-wide pattern cache's capacity.
    pub fn configure(config: PatternCacheConfig) {
        global().resize(config.max_size);
    }
}

#[cfg(feature = "std")]
pub use cache::{configure, PatternCache, PatternCacheConfig};

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn literal_matches_exact_only() {
        assert!(matches("send_payment", "send_payment"));
        assert!(!matches("send_payment", "send_payments"));
    }

    #[test]
    fn star_matches_everything() {
        assert!(matches("*", "anything_at_all"));
    }

    #[test]
    fn glob_prefix_matches() {
        assert!(matches("database:*", "database:drop"));
        assert!(!matches("database:*", "network:drop"));
    }

    #[test]
    fn regex_pattern_compiles_and_matches() {
        assert!(matches("^send_(payment|invoice)$", "send_payment"));
        assert!(!matches("^send_(payment|invoice)$", "send_report"));
    }

    #[test]
    fn literal_domain_matches_exactly_not_as_regex() {
        // A bare literal containing dots must classify as Literal, not Regex
        // -- otherwise an unescaped '.' in the compiled pattern matches any
        // character and over-authorizes near-miss hosts.
        assert!(matches("billing.corp.com", "billing.corp.com"));
        assert!(!matches("billing.corp.com", "billingXcorpXcom"));
        assert!(!matches("billing.corp.com", "billing.corp.comX"));
    }

    #[test]
    fn domain_wildcard_matches_apex_and_subdomain() {
        let patterns = ["*.example.com"];
        assert!(domain_matches(patterns, "example.com"));
        assert!(domain_matches(patterns, "api.example.com"));
        assert!(!domain_matches(patterns, "evil.com"));
    }

    #[test]
    fn resource_host_extracts_from_url() {
        assert_eq!(resource_host("https://api.example.com/x"), "api.example.com");
        assert_eq!(resource_host("not-a-url"), "not-a-url");
    }

    #[test]
    fn malformed_regex_denies_rather_than_panics() {
        // Unbalanced group — anchor_regex leaves it invalid; must not panic.
        assert!(!matches("(unterminated", "(unterminated"));
    }
}
