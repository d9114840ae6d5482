//! Update-operator application (§4.6 `update`, `findAndModify`).
//!
//! Supports the operator-style subset used by an embedded document store:
//! `$set $unset $inc $push $pull $addToSet $rename $min $max`. A plain
//! document with no `$`-prefixed top-level keys is a replacement, not an
//! operator update (§3 "Update document").

use docdb_core::{Bson, CommandError, CommandResult, Document};

/// Applies `update` to `target`, returning whether any field actually changed.
pub fn apply(target: &mut Document, update: &Document) -> CommandResult<bool> {
    let is_operator_update = update.keys().next().is_some_and(|k| k.starts_with('$'));
    if !is_operator_update {
        return Ok(replace(target, update));
    }

    let mut changed = false;
    for (op, arg) in update.iter() {
        let arg_doc = arg.as_document().ok_or_else(|| {
            CommandError::bad_value(format!("{op} requires a document argument"))
        })?;
        changed |= apply_operator(target, op, arg_doc)?;
    }
    Ok(changed)
}

fn replace(target: &mut Document, replacement: &Document) -> bool {
    let id = target.get("_id").cloned();
    let mut next = replacement.clone();
    if let Some(id) = id {
        if !next.contains_key("_id") {
            next.insert("_id", id);
        }
    }
    let changed = *target != next;
    *target = next;
    changed
}

fn apply_operator(target: &mut Document, op: &str, arg: &Document) -> CommandResult<bool> {
    let mut changed = false;
    match op {
        "$set" => {
            for (path, value) in arg.iter() {
                changed |= set_path(target, path, value.clone());
            }
        }
        "$unset" => {
            for (path, _) in arg.iter() {
                changed |= unset_path(target, path);
            }
        }
        "$inc" => {
            for (path, delta) in arg.iter() {
                let delta = delta.as_f64().ok_or_else(|| {
                    CommandError::type_mismatch("number", delta.type_name())
                })?;
                let current = get_path(target, path).and_then(|v| v.as_f64()).unwrap_or(0.0);
                set_path(target, path, Bson::Double(current + delta));
                changed = true;
            }
        }
        "$min" | "$max" => {
            for (path, candidate) in arg.iter() {
                let current = get_path(target, path);
                let replace = match (&current, candidate.as_f64()) {
                    (None, _) => true,
                    (Some(cur), Some(cand)) => {
                        let cur = cur.as_f64().unwrap_or(f64::NAN);
                        if op == "$min" { cand < cur } else { cand > cur }
                    }
                    _ => false,
                };
                if replace {
                    set_path(target, path, candidate.clone());
                    changed = true;
                }
            }
        }
        "$rename" => {
            for (from, to) in arg.iter() {
                if let Some(value) = get_path(target, from) {
                    let to_name = to.as_str().ok_or_else(|| {
                        CommandError::bad_value("$rename target must be a string")
                    })?;
                    unset_path(target, from);
                    set_path(target, to_name, value);
                    changed = true;
                }
            }
        }
        "$push" => {
            for (path, value) in arg.iter() {
                let mut arr = get_path(target, path)
                    .and_then(|v| v.as_array().cloned())
                    .unwrap_or_default();
                arr.push(value.clone());
                set_path(target, path, Bson::Array(arr));
                changed = true;
            }
        }
        "$addToSet" => {
            for (path, value) in arg.iter() {
                let mut arr = get_path(target, path)
                    .and_then(|v| v.as_array().cloned())
                    .unwrap_or_default();
                if !arr.contains(value) {
                    arr.push(value.clone());
                    changed = true;
                }
                set_path(target, path, Bson::Array(arr));
            }
        }
        "$pull" => {
            for (path, value) in arg.iter() {
                if let Some(mut arr) = get_path(target, path).and_then(|v| v.as_array().cloned()) {
                    let before = arr.len();
                    arr.retain(|item| item != value);
                    if arr.len() != before {
                        changed = true;
                    }
                    set_path(target, path, Bson::Array(arr));
                }
            }
        }
        other => {
            return Err(CommandError::not_implemented(format!(
                "update operator '{other}' is not supported"
            )));
        }
    }
    Ok(changed)
}

fn get_path(doc: &Document, path: &str) -> Option<Bson> {
    crate::filter::resolve_path(doc, path)
}

/// Sets a (possibly dotted) path, creating intermediate documents as needed.
fn set_path(doc: &mut Document, path: &str, value: Bson) -> bool {
    let mut segments = path.split('.');
    let first = segments.next().unwrap_or(path);
    let rest: Vec<&str> = segments.collect();
    if rest.is_empty() {
        let changed = doc.get(first) != Some(&value);
        doc.insert(first, value);
        return changed;
    }
    let mut child = doc
        .get(first)
        .and_then(Bson::as_document)
        .cloned()
        .unwrap_or_default();
    let changed = set_path(&mut child, &rest.join("."), value);
    doc.insert(first, Bson::Document(child));
    changed
}

fn unset_path(doc: &mut Document, path: &str) -> bool {
    let mut segments = path.split('.');
    let first = segments.next().unwrap_or(path);
    let rest: Vec<&str> = segments.collect();
    if rest.is_empty() {
        return doc.remove(first).is_some();
    }
    if let Some(mut child) = doc.get(first).and_then(Bson::as_document).cloned() {
        let changed = unset_path(&mut child, &rest.join("."));
        doc.insert(first, Bson::Document(child));
        return changed;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(pairs: &[(&str, Bson)]) -> Document {
        Document::from_pairs(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())))
    }

    #[test]
    fn set_creates_nested_path() {
        let mut target = doc(&[("_id", Bson::Int32(1))]);
        let update = doc(&[(
            "$set",
            Bson::Document(doc(&[("address.city", Bson::String("nyc".into()))])),
        )]);
        assert!(apply(&mut target, &update).unwrap());
        assert_eq!(
            crate::filter::resolve_path(&target, "address.city"),
            Some(Bson::String("nyc".into()))
        );
    }

    #[test]
    fn inc_adds_to_existing_numeric_field() {
        let mut target = doc(&[("count", Bson::Int32(4))]);
        let update = doc(&[("$inc", Bson::Document(doc(&[("count", Bson::Int32(1))])))]);
        apply(&mut target, &update).unwrap();
        assert_eq!(target.get("count").and_then(Bson::as_f64), Some(5.0));
    }

    #[test]
    fn plain_document_replaces_preserving_id() {
        let mut target = doc(&[("_id", Bson::Int32(1)), ("name", Bson::String("old".into()))]);
        let replacement = doc(&[("name", Bson::String("new".into()))]);
        assert!(apply(&mut target, &replacement).unwrap());
        assert_eq!(target.get("_id"), Some(&Bson::Int32(1)));
        assert_eq!(target.get("name"), Some(&Bson::String("new".into())));
    }

    #[test]
    fn unsupported_operator_is_not_implemented() {
        let mut target = doc(&[("_id", Bson::Int32(1))]);
        let update = doc(&[("$bit", Bson::Document(Document::new()))]);
        let err = apply(&mut target, &update).unwrap_err();
        assert!(matches!(err, CommandError::NotImplemented { .. }));
    }
}
