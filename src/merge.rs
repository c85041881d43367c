//! Dedup & merge of freshly fetched items, and subscription identifier derivation.
//!
//! Both functions are pure: they never touch engine state and can be called
//! from anywhere. The engine is the only caller that acts on their output.

use crate::types::Item;
use std::collections::HashSet;

/// Identifier used when a display name contains no words at all
pub const FALLBACK_ACRONYM: &str = "FEED";

/// Compute the genuinely new items in `fetched`
///
/// An item is new iff no item in `existing` shares its retrieval URL. The
/// result keeps the relative order of `fetched`, holds each URL at most once
/// (a feed that repeats an enclosure only contributes its first occurrence),
/// and has every item flagged for retrieval. `existing` is not modified.
///
/// Merging the same fetched list into `existing + result` again yields an
/// empty list.
pub fn merge_new_items(existing: &[Item], fetched: &[Item]) -> Vec<Item> {
    let mut seen: HashSet<&str> = existing.iter().map(|item| item.url.as_str()).collect();

    fetched
        .iter()
        .filter(|item| seen.insert(item.url.as_str()))
        .map(|item| Item {
            needs_retrieval: true,
            ..item.clone()
        })
        .collect()
}

/// Initialism of a display name: the uppercased first character of each
/// whitespace-separated word ("Programming Thomas" -> "PT")
pub fn acronym(name: &str) -> String {
    let initials: String = name
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect();

    if initials.is_empty() {
        FALLBACK_ACRONYM.to_string()
    } else {
        initials
    }
}

/// Make `acronym` unique against the identifiers already registered
///
/// Returns `acronym` itself when unused, otherwise the acronym followed by
/// the smallest integer suffix (starting at 2) that is not taken.
pub fn unique_identifier<'a, I>(acronym: &str, taken: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let taken: HashSet<&str> = taken.into_iter().collect();
    if !taken.contains(acronym) {
        return acronym.to_string();
    }

    (2u64..)
        .map(|suffix| format!("{acronym}{suffix}"))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or_else(|| acronym.to_string())
}
