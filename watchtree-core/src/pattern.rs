//! Wildcard patterns over monitor names.
//!
//! Supported shapes: `name` (exact), `*` (anything), `*suffix`, `prefix*`,
//! `*middle*` and `prefix*suffix`. A `prefix*` pattern whose prefix ends
//! with the hierarchy delimiter also matches the prefix itself, so `a.b.*`
//! matches `a.b` and everything below it.

use std::fmt;
use std::str::FromStr;

use watchtree_types::{MonitorKind, HIERARCHY_DELIMITER};

use crate::error::ConfigError;
use crate::monitor::Monitor;
use crate::utils::is_valid_name_part;

const WILDCARD: char = '*';

#[derive(Debug, Clone, PartialEq, Eq)]
enum Matcher {
    Exact(String),
    All,
    Prefix(String),
    Suffix(String),
    Middle(String),
    PrefixSuffix(String, String),
}

/// A compiled name pattern, optionally restricted to one monitor kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    matcher: Matcher,
    kind: Option<MonitorKind>,
}

impl Pattern {
    /// Compiles a pattern matching monitors of any kind.
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            source: pattern.to_string(),
            matcher: compile(pattern)?,
            kind: None,
        })
    }

    /// Compiles a pattern matching only monitors of `kind`.
    pub fn typed(pattern: &str, kind: MonitorKind) -> Result<Self, ConfigError> {
        let mut compiled = Self::new(pattern)?;
        compiled.kind = Some(kind);
        Ok(compiled)
    }

    pub fn counters(pattern: &str) -> Result<Self, ConfigError> {
        Self::typed(pattern, MonitorKind::Counter)
    }

    pub fn stopwatches(pattern: &str) -> Result<Self, ConfigError> {
        Self::typed(pattern, MonitorKind::Stopwatch)
    }

    /// Pattern text as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn kind(&self) -> Option<MonitorKind> {
        self.kind
    }

    /// Whether `name` matches, ignoring any kind restriction.
    pub fn matches(&self, name: &str) -> bool {
        match &self.matcher {
            Matcher::Exact(exact) => name == exact,
            Matcher::All => true,
            Matcher::Prefix(prefix) => {
                name.starts_with(prefix.as_str())
                    || (prefix.ends_with(HIERARCHY_DELIMITER)
                        && name == &prefix[..prefix.len() - HIERARCHY_DELIMITER.len_utf8()])
            }
            Matcher::Suffix(suffix) => name.ends_with(suffix.as_str()),
            Matcher::Middle(middle) => name.contains(middle.as_str()),
            Matcher::PrefixSuffix(prefix, suffix) => {
                name.len() >= prefix.len() + suffix.len()
                    && name.starts_with(prefix.as_str())
                    && name.ends_with(suffix.as_str())
            }
        }
    }

    /// Whether the monitor matches by name and, if restricted, by kind.
    /// Anonymous monitors never match.
    pub fn matches_monitor(&self, monitor: &dyn Monitor) -> bool {
        if let Some(kind) = self.kind {
            if monitor.kind() != kind {
                return false;
            }
        }
        monitor.name().is_some_and(|name| self.matches(name))
    }
}

fn compile(pattern: &str) -> Result<Matcher, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    let wildcards = pattern.matches(WILDCARD).count();
    let matcher = match wildcards {
        0 => Matcher::Exact(pattern.to_string()),
        1 if pattern.len() == 1 => Matcher::All,
        1 if pattern.starts_with(WILDCARD) => Matcher::Suffix(pattern[1..].to_string()),
        1 if pattern.ends_with(WILDCARD) => {
            Matcher::Prefix(pattern[..pattern.len() - 1].to_string())
        }
        1 => {
            let (prefix, suffix) = pattern
                .split_once(WILDCARD)
                .ok_or_else(|| invalid("wildcard expected"))?;
            Matcher::PrefixSuffix(prefix.to_string(), suffix.to_string())
        }
        2 if pattern.len() > 2 && pattern.starts_with(WILDCARD) && pattern.ends_with(WILDCARD) => {
            Matcher::Middle(pattern[1..pattern.len() - 1].to_string())
        }
        _ => {
            return Err(invalid(
                "wildcard allowed only at the start, the end, both ends, or once in the middle",
            ))
        }
    };

    let literal_ok = match &matcher {
        Matcher::Exact(s) | Matcher::Prefix(s) | Matcher::Suffix(s) | Matcher::Middle(s) => {
            is_valid_name_part(s)
        }
        Matcher::PrefixSuffix(p, s) => is_valid_name_part(p) && is_valid_name_part(s),
        Matcher::All => true,
    };
    if !literal_ok {
        return Err(invalid("contains characters not allowed in monitor names"));
    }
    Ok(matcher)
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Some(kind) => write!(f, "{}:{}", kind, self.source),
            None => f.write_str(&self.source),
        }
    }
}

/// Parses the [`Display`](fmt::Display) form: an optional `counter:`,
/// `stopwatch:` or `unknown:` kind prefix followed by the pattern.
impl FromStr for Pattern {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((kind, pattern)) = s.split_once(':') else {
            return Self::new(s);
        };
        let kind = match kind {
            "counter" => MonitorKind::Counter,
            "stopwatch" => MonitorKind::Stopwatch,
            "unknown" => MonitorKind::Unknown,
            other => {
                return Err(ConfigError::InvalidPattern {
                    pattern: s.to_string(),
                    reason: format!("unknown monitor kind '{}'", other),
                })
            }
        };
        Self::typed(pattern, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(pattern: &str) -> Pattern {
        Pattern::new(pattern).unwrap()
    }

    #[test]
    fn exact_pattern() {
        assert!(p("a.b").matches("a.b"));
        assert!(!p("a.b").matches("a.b.c"));
        assert!(!p("a.b").matches("a"));
    }

    #[test]
    fn prefix_pattern_includes_parent() {
        let pattern = p("a.b.*");
        assert!(pattern.matches("a.b.c"));
        assert!(pattern.matches("a.b.c.d"));
        assert!(pattern.matches("a.b"));
        assert!(!pattern.matches("a.c"));
        assert!(!pattern.matches("a"));
    }

    #[test]
    fn prefix_without_delimiter_is_plain_prefix() {
        let pattern = p("org.sim*");
        assert!(pattern.matches("org.simon"));
        assert!(!pattern.matches("org.si"));
    }

    #[test]
    fn suffix_and_middle_patterns() {
        assert!(p("*.sql").matches("db.query.sql"));
        assert!(!p("*.sql").matches("db.query"));
        assert!(p("*query*").matches("db.query.sql"));
        assert!(!p("*query*").matches("db.update"));
    }

    #[test]
    fn prefix_suffix_pattern() {
        let pattern = p("db.*.time");
        assert!(pattern.matches("db.select.time"));
        assert!(!pattern.matches("db.select.count"));
        assert!(!p("ab*ba").matches("aba"));
    }

    #[test]
    fn star_matches_every_name() {
        let all = p("*");
        assert!(all.matches("x"));
        assert!(all.matches("a.b.c"));
        assert!(all.matches(""));
    }

    #[test]
    fn empty_pattern_matches_only_root() {
        let root = p("");
        assert!(root.matches(""));
        assert!(!root.matches("a"));
    }

    #[test]
    fn misplaced_wildcards_are_rejected() {
        for bad in ["a**", "a*b*c", "**", "*a*b", "a*b*"] {
            assert!(Pattern::new(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn invalid_characters_are_rejected() {
        assert!(Pattern::new("a b*").is_err());
        assert!(Pattern::new("a/b").is_err());
    }

    #[test]
    fn typed_pattern_display() {
        let pattern = Pattern::counters("x.*").unwrap();
        assert_eq!(pattern.kind(), Some(MonitorKind::Counter));
        assert_eq!(pattern.to_string(), "counter:x.*");
        assert_eq!(pattern.as_str(), "x.*");
    }

    #[test]
    fn parses_kind_prefix() {
        let pattern: Pattern = "counter:db.*".parse().unwrap();
        assert_eq!(pattern.kind(), Some(MonitorKind::Counter));
        assert_eq!(pattern.as_str(), "db.*");
        assert_eq!(pattern.to_string(), "counter:db.*");
        assert!("gauge:db.*".parse::<Pattern>().is_err());
        assert_eq!("db.*".parse::<Pattern>().unwrap().kind(), None);
    }
}
