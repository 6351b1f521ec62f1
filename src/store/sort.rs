//! SORT evaluation for the memory engine
//!
//! Orders the members of a set, optionally weighted by an external key
//! pattern. Numeric comparison is the default; every weight must parse as a
//! double or the whole operation fails with the store's own error. The
//! `alpha` flag switches to lexical comparison. The offset/count window is
//! applied after ordering.

use std::cmp::Ordering;

use super::errors::{StoreError, StoreResult};
use super::memory::MemoryInner;
use super::{SortLimit, SortRequest};

pub(crate) fn evaluate(
    inner: &mut MemoryInner,
    key: &str,
    request: &SortRequest,
) -> StoreResult<Vec<String>> {
    let members = inner.smembers(key)?;

    let mut rows: Vec<(Weight, String)> = Vec::with_capacity(members.len());
    for member in members {
        let raw = lookup_weight(inner, &member, request.by.as_deref())?;
        let weight = if request.alpha {
            Weight::Lexical(raw.unwrap_or_default())
        } else {
            // A missing weight sorts as zero; a present one must be a double.
            let value = match raw {
                None => 0.0,
                Some(text) => text.trim().parse::<f64>().map_err(|_| StoreError::NotNumeric)?,
            };
            Weight::Numeric(value)
        };
        rows.push((weight, member));
    }

    // Stable sort keeps set order for equal weights, deterministic either way.
    rows.sort_by(|a, b| {
        let ordering = a.0.compare(&b.0);
        if request.desc {
            ordering.reverse()
        } else {
            ordering
        }
    });

    let ordered: Vec<String> = rows.into_iter().map(|(_, member)| member).collect();
    Ok(apply_limit(ordered, request.limit))
}

enum Weight {
    Numeric(f64),
    Lexical(String),
}

impl Weight {
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Weight::Numeric(a), Weight::Numeric(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (Weight::Lexical(a), Weight::Lexical(b)) => a.cmp(b),
            // A request produces one weight kind only.
            _ => Ordering::Equal,
        }
    }
}

/// Resolves a member's weight through the BY pattern.
///
/// `*` is replaced by the member; `pattern->field` dereferences a hash field
/// at the substituted key. No pattern means the member weighs itself.
fn lookup_weight(
    inner: &mut MemoryInner,
    member: &str,
    by: Option<&str>,
) -> StoreResult<Option<String>> {
    let Some(pattern) = by else {
        return Ok(Some(member.to_string()));
    };
    match pattern.split_once("->") {
        Some((key_pattern, field)) => {
            let key = key_pattern.replace('*', member);
            inner.hget(&key, field)
        }
        None => {
            let key = pattern.replace('*', member);
            inner.get(&key)
        }
    }
}

fn apply_limit(ordered: Vec<String>, limit: Option<SortLimit>) -> Vec<String> {
    let Some(SortLimit { offset, count }) = limit else {
        return ordered;
    };
    if offset >= ordered.len() {
        return Vec::new();
    }
    let end = match count {
        Some(count) => (offset + count).min(ordered.len()),
        None => ordered.len(),
    };
    ordered[offset..end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::super::{MemoryStore, SortRequest, Store};

    fn seeded(members: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        for member in members {
            store.sadd("s", member).unwrap();
        }
        store
    }

    #[test]
    fn test_numeric_default_orders_as_doubles() {
        let store = seeded(&["8123", "8674", "7402", "87"]);
        let sorted = store.sort("s", &SortRequest::numeric()).unwrap();
        assert_eq!(sorted, vec!["87", "7402", "8123", "8674"]);
    }

    #[test]
    fn test_alpha_orders_lexically() {
        let store = seeded(&["8123", "8674", "7402", "87"]);
        let sorted = store.sort("s", &SortRequest::numeric().alphabetic()).unwrap();
        assert_eq!(sorted, vec!["7402", "8123", "8674", "87"]);
    }

    #[test]
    fn test_descending() {
        let store = seeded(&["1", "2", "3"]);
        let sorted = store.sort("s", &SortRequest::numeric().descending()).unwrap();
        assert_eq!(sorted, vec!["3", "2", "1"]);
    }

    #[test]
    fn test_by_pattern_external_weights() {
        let store = seeded(&["1", "2", "3"]);
        store.set("w:1", "30").unwrap();
        store.set("w:2", "10").unwrap();
        store.set("w:3", "20").unwrap();
        let sorted = store.sort("s", &SortRequest::numeric().by("w:*")).unwrap();
        assert_eq!(sorted, vec!["2", "3", "1"]);
    }

    #[test]
    fn test_by_pattern_hash_dereference() {
        let store = seeded(&["1", "2"]);
        store.hset("h:1", "year", "1998").unwrap();
        store.hset("h:2", "year", "1964").unwrap();
        let sorted = store
            .sort("s", &SortRequest::numeric().by("h:*->year"))
            .unwrap();
        assert_eq!(sorted, vec!["2", "1"]);
    }

    #[test]
    fn test_non_numeric_weight_fails_without_alpha() {
        let store = seeded(&["1", "2"]);
        store.set("w:1", "Pen Duick I").unwrap();
        store.set("w:2", "Pen Duick II").unwrap();
        let err = store.sort("s", &SortRequest::numeric().by("w:*")).unwrap_err();
        assert_eq!(err.code(), "NOT_NUMERIC");

        let sorted = store
            .sort("s", &SortRequest::numeric().by("w:*").alphabetic())
            .unwrap();
        assert_eq!(sorted, vec!["1", "2"]);
    }

    #[test]
    fn test_limit_window() {
        let store = seeded(&["1", "2", "3", "4", "5"]);
        let sorted = store
            .sort("s", &SortRequest::numeric().limit(1, Some(2)))
            .unwrap();
        assert_eq!(sorted, vec!["2", "3"]);

        let tail = store.sort("s", &SortRequest::numeric().limit(3, None)).unwrap();
        assert_eq!(tail, vec!["4", "5"]);

        let past_end = store
            .sort("s", &SortRequest::numeric().limit(10, Some(2)))
            .unwrap();
        assert!(past_end.is_empty());
    }

    #[test]
    fn test_missing_set_sorts_empty() {
        let store = MemoryStore::new();
        assert!(store.sort("nope", &SortRequest::numeric()).unwrap().is_empty());
    }
}
