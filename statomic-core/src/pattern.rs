//! Source pattern parsing and matching.
//!
//! A transition declares where it may start from as a set of patterns:
//!
//! | form      | matches                                                  |
//! |-----------|----------------------------------------------------------|
//! | `"draft"` | exactly that token                                       |
//! | `"*"`     | any current state                                        |
//! | `"+"`     | any current state except the transition's fixed target   |
//! | `"WRK-*"` | tokens whose string form starts with `"WRK-"`            |
//!
//! Matching is a pure predicate over (pattern, current state); patterns are
//! not required to be mutually exclusive.

use crate::state::StateToken;
use std::fmt;

/// One parsed source pattern of a transition definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourcePattern {
    Exact(StateToken),
    Any,
    AnyExcept,
    /// Stored with the trailing separator, e.g. `"WRK-"`.
    Prefix(String),
}

impl SourcePattern {
    /// Parses a raw source string.
    ///
    /// `"*"` and `"+"` are the wildcards; a trailing `*` directly after the
    /// configured separator makes a prefix pattern; anything else is an exact
    /// text token (including strings that merely end in `*`).
    pub fn parse(raw: &str, separator: char) -> SourcePattern {
        match raw {
            "*" => SourcePattern::Any,
            "+" => SourcePattern::AnyExcept,
            _ => {
                if let Some(stem) = raw.strip_suffix('*') {
                    if stem.ends_with(separator) {
                        return SourcePattern::Prefix(stem.to_string());
                    }
                }
                SourcePattern::Exact(StateToken::text(raw))
            }
        }
    }

    /// Returns whether `state` falls inside this pattern.
    ///
    /// `fixed_target` is the transition's declared fixed target; only
    /// `AnyExcept` consults it. Effect-free.
    pub fn matches(&self, state: &StateToken, fixed_target: Option<&StateToken>) -> bool {
        match self {
            SourcePattern::Exact(token) => token == state,
            SourcePattern::Any => true,
            SourcePattern::AnyExcept => fixed_target != Some(state),
            SourcePattern::Prefix(prefix) => state.to_string().starts_with(prefix.as_str()),
        }
    }
}

impl fmt::Display for SourcePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourcePattern::Exact(token) => write!(f, "{token}"),
            SourcePattern::Any => f.write_str("*"),
            SourcePattern::AnyExcept => f.write_str("+"),
            SourcePattern::Prefix(prefix) => write!(f, "{prefix}*"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn text(s: &str) -> StateToken {
        StateToken::text(s)
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(SourcePattern::parse("draft", '-'), SourcePattern::Exact(text("draft")));
        assert_eq!(SourcePattern::parse("*", '-'), SourcePattern::Any);
        assert_eq!(SourcePattern::parse("+", '-'), SourcePattern::AnyExcept);
        assert_eq!(
            SourcePattern::parse("WRK-*", '-'),
            SourcePattern::Prefix("WRK-".to_string())
        );
        assert_eq!(
            SourcePattern::parse("CMP-STD-*", '-'),
            SourcePattern::Prefix("CMP-STD-".to_string())
        );
    }

    #[test]
    fn test_parse_respects_separator() {
        // With '/' as separator, "WRK-*" is just a literal token.
        assert_eq!(
            SourcePattern::parse("WRK-*", '/'),
            SourcePattern::Exact(text("WRK-*"))
        );
        assert_eq!(
            SourcePattern::parse("jobs/*", '/'),
            SourcePattern::Prefix("jobs/".to_string())
        );
    }

    #[test]
    fn test_parse_bare_star_suffix_is_exact() {
        // No separator before '*': not a prefix pattern.
        assert_eq!(
            SourcePattern::parse("draft*", '-'),
            SourcePattern::Exact(text("draft*"))
        );
    }

    #[test]
    fn test_exact_match() {
        let p = SourcePattern::parse("draft", '-');
        assert!(p.matches(&text("draft"), None));
        assert!(!p.matches(&text("review"), None));
        assert!(!p.matches(&StateToken::Int(1), None));
    }

    #[test]
    fn test_any_matches_everything() {
        let p = SourcePattern::Any;
        assert!(p.matches(&text("draft"), None));
        assert!(p.matches(&StateToken::Int(42), Some(&text("x"))));
    }

    #[test]
    fn test_any_except_excludes_only_fixed_target() {
        let p = SourcePattern::AnyExcept;
        let target = text("closed");
        assert!(p.matches(&text("open"), Some(&target)));
        assert!(p.matches(&text("blocked"), Some(&target)));
        assert!(!p.matches(&text("closed"), Some(&target)));
    }

    #[test]
    fn test_prefix_match() {
        let p = SourcePattern::parse("WRK-*", '-');
        assert!(p.matches(&text("WRK-REP-PRG"), None));
        assert!(p.matches(&text("WRK-"), None));
        assert!(!p.matches(&text("QC-REP-PRG"), None));
        assert!(!p.matches(&text("WRK"), None));
    }

    #[test]
    fn test_prefix_matches_string_form_of_typed_tokens() {
        let p = SourcePattern::Prefix("42-".to_string());
        assert!(p.matches(&text("42-a"), None));
        // Int(42) has string form "42", no trailing separator.
        assert!(!p.matches(&StateToken::Int(42), None));
    }

    #[test]
    fn test_display_roundtrip() {
        for raw in ["draft", "*", "+", "WRK-*"] {
            let p = SourcePattern::parse(raw, '-');
            assert_eq!(p.to_string(), raw);
        }
    }

    proptest! {
        #[test]
        fn prop_prefix_agrees_with_string_form(
            stem in "[A-Z]{1,6}",
            state in "[A-Z0-9-]{0,12}",
        ) {
            let p = SourcePattern::parse(&format!("{stem}-*"), '-');
            let token = StateToken::text(state.clone());
            prop_assert_eq!(
                p.matches(&token, None),
                state.starts_with(&format!("{stem}-"))
            );
        }

        #[test]
        fn prop_any_always_matches(state in "[a-z0-9-]{0,16}") {
            prop_assert!(SourcePattern::Any.matches(&StateToken::text(state), None));
        }

        #[test]
        fn prop_exact_iff_equal(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
            let p = SourcePattern::parse(&a, '-');
            prop_assert_eq!(p.matches(&StateToken::text(b.clone()), None), a == b);
        }
    }
}
