//! Deterministic query classification.
//!
//! The spec lists six classes in the order `empty, short, entity, phrase,
//! category, general` but `category` ("a single token exactly equals a
//! primary category") can only ever fire on a 1-2 token query, which
//! `short` ("1-2 tokens") would already have claimed under a literal
//! first-listed-rule-wins reading — making `category` unreachable. We
//! evaluate the more specific rule first instead: `empty, category,
//! entity, phrase, short, general`. See `DESIGN.md` Open Questions.

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryClass {
    Empty,
    Short,
    Entity,
    Phrase,
    Category,
    General,
}

fn tokens(q: &str) -> Vec<&str> {
    q.split_whitespace().collect()
}

fn is_capitalized(tok: &str) -> bool {
    tok.chars().next().is_some_and(|c| c.is_uppercase())
}

/// `primary_categories` drives both the `entity` "distinguishing
/// vocabulary" check and the `category` exact-match check.
pub fn classify(q: &str, primary_categories: &HashSet<String>) -> QueryClass {
    let trimmed = q.trim();
    if trimmed.is_empty() {
        return QueryClass::Empty;
    }

    let toks = tokens(trimmed);

    if toks.len() == 1 && primary_categories.iter().any(|c| c.eq_ignore_ascii_case(toks[0])) {
        return QueryClass::Category;
    }

    let capitalized_count = toks.iter().filter(|t| is_capitalized(t)).count();
    let matches_category_vocab = toks
        .iter()
        .any(|t| t.len() >= 3 && primary_categories.iter().any(|c| c.eq_ignore_ascii_case(t)));
    if capitalized_count >= 2 || matches_category_vocab {
        return QueryClass::Entity;
    }

    if trimmed.contains('"') || toks.len() >= 5 {
        return QueryClass::Phrase;
    }

    if toks.len() <= 2 {
        return QueryClass::Short;
    }

    QueryClass::General
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cats() -> HashSet<String> {
        ["Healthcare", "Technology"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_query_classifies_empty() {
        assert_eq!(classify("", &cats()), QueryClass::Empty);
        assert_eq!(classify("   ", &cats()), QueryClass::Empty);
    }

    #[test]
    fn one_or_two_unrelated_tokens_classify_short() {
        assert_eq!(classify("report", &cats()), QueryClass::Short);
        assert_eq!(classify("quarterly report", &cats()), QueryClass::Short);
    }

    #[test]
    fn single_token_matching_category_classifies_category() {
        assert_eq!(classify("Healthcare", &cats()), QueryClass::Category);
        assert_eq!(classify("healthcare", &cats()), QueryClass::Category);
    }

    #[test]
    fn quoted_or_long_queries_classify_phrase() {
        assert_eq!(classify("\"healthcare policy\"", &cats()), QueryClass::Phrase);
        assert_eq!(classify("one two three four five", &cats()), QueryClass::Phrase);
    }

    #[test]
    fn two_capitalized_tokens_classify_entity() {
        assert_eq!(classify("Jane Smith memo", &cats()), QueryClass::Entity);
    }

    #[test]
    fn token_matching_category_vocab_within_longer_query_classifies_entity() {
        assert_eq!(classify("the healthcare summary report", &cats()), QueryClass::Entity);
    }

    #[test]
    fn unrecognized_three_token_query_classifies_general() {
        assert_eq!(classify("quarterly budget summary", &cats()), QueryClass::General);
    }
}
