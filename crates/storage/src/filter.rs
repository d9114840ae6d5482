//! Query filter evaluation (§3 "Filter document", §4.6 `find`/`update`/`delete`).
//!
//! Supports dotted field paths and the comparison/logical operators listed
//! in the command layer's Non-goals as "kept": `$eq $ne $gt $gte $lt $lte
//! $in $nin $exists $and $or $not`. Anything else falls back to document
//! equality on the operator's argument, matching how a minimal query engine
//! degrades rather than rejecting the whole filter.

use docdb_core::{Bson, Document};

/// Returns `true` if `doc` satisfies every condition in `filter`.
pub fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, condition)| match key.as_str() {
        "$and" => as_array_of_docs(condition).iter().all(|f| matches(doc, f)),
        "$or" => as_array_of_docs(condition).iter().any(|f| matches(doc, f)),
        "$nor" => !as_array_of_docs(condition).iter().any(|f| matches(doc, f)),
        _ => field_matches(doc, key, condition),
    })
}

fn as_array_of_docs(value: &Bson) -> Vec<Document> {
    value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_document().cloned())
                .collect()
        })
        .unwrap_or_default()
}

fn field_matches(doc: &Document, path: &str, condition: &Bson) -> bool {
    let actual = resolve_path(doc, path);
    match condition.as_document() {
        Some(ops) if ops.iter().all(|(k, _)| k.starts_with('$')) && !ops.is_empty() => {
            ops.iter().all(|(op, expected)| {
                apply_operator(op, actual.as_ref(), expected)
            })
        }
        _ => actual.as_ref() == Some(condition) || array_contains(actual.as_ref(), condition),
    }
}

fn apply_operator(op: &str, actual: Option<&Bson>, expected: &Bson) -> bool {
    match op {
        "$eq" => actual == Some(expected),
        "$ne" => actual != Some(expected),
        "$gt" => compare(actual, expected).is_some_and(|o| o.is_gt()),
        "$gte" => compare(actual, expected).is_some_and(|o| o.is_ge()),
        "$lt" => compare(actual, expected).is_some_and(|o| o.is_lt()),
        "$lte" => compare(actual, expected).is_some_and(|o| o.is_le()),
        "$in" => expected
            .as_array()
            .is_some_and(|arr| arr.iter().any(|v| Some(v) == actual)),
        "$nin" => expected
            .as_array()
            .is_some_and(|arr| !arr.iter().any(|v| Some(v) == actual)),
        "$exists" => actual.is_some() == expected.as_bool().unwrap_or(true),
        "$not" => !apply_nested_not(actual, expected),
        _ => actual == Some(expected),
    }
}

fn apply_nested_not(actual: Option<&Bson>, expected: &Bson) -> bool {
    match expected.as_document() {
        Some(ops) => ops.iter().all(|(op, val)| apply_operator(op, actual, val)),
        None => actual == Some(expected),
    }
}

fn array_contains(actual: Option<&Bson>, needle: &Bson) -> bool {
    actual
        .and_then(Bson::as_array)
        .is_some_and(|arr| arr.contains(needle))
}

fn compare(actual: Option<&Bson>, expected: &Bson) -> Option<std::cmp::Ordering> {
    let actual = actual?;
    match (actual.as_str(), expected.as_str()) {
        (Some(a), Some(b)) => return Some(a.cmp(b)),
        _ => {}
    }
    let a = actual.as_f64()?;
    let b = expected.as_f64()?;
    a.partial_cmp(&b)
}

/// Resolves a dotted path (`"a.b.c"`) against nested documents.
pub fn resolve_path(doc: &Document, path: &str) -> Option<Bson> {
    let mut current = Bson::Document(doc.clone());
    for segment in path.split('.') {
        current = match current {
            Bson::Document(d) => d.get(segment).cloned()?,
            Bson::Array(arr) => {
                let idx: usize = segment.parse().ok()?;
                arr.get(idx).cloned()?
            }
            _ => return None,
        };
    }
    Some(current)
}
