//! A minimal aggregation pipeline executor (§4.6 `aggregate`).
//!
//! Supports the stages most embedded consumers actually reach for:
//! `$match $project $sort $skip $limit $group $unwind`. `$out`/`$merge` are
//! accepted only as the pipeline's last stage (§9 Open Questions) and write
//! into a sibling collection via the callback the caller supplies.

use docdb_core::{Bson, CommandError, CommandResult, Document};

use crate::filter;

/// Runs `pipeline` over `input`, returning the resulting documents.
///
/// `write_out` is invoked when the pipeline ends in `$out`/`$merge`, receiving
/// the target collection name and the final document set.
pub fn run(
    input: Vec<Document>,
    pipeline: &[Document],
    write_out: impl FnOnce(&str, Vec<Document>) -> CommandResult<()>,
) -> CommandResult<Vec<Document>> {
    let mut docs = input;
    for (idx, stage) in pipeline.iter().enumerate() {
        let (name, arg) = stage
            .iter()
            .next()
            .ok_or_else(|| CommandError::bad_value("empty pipeline stage"))?;
        let is_last = idx == pipeline.len() - 1;

        match name.as_str() {
            "$match" => {
                let filter = arg
                    .as_document()
                    .ok_or_else(|| CommandError::bad_value("$match requires a document"))?;
                docs.retain(|d| filter::matches(d, filter));
            }
            "$project" => {
                let spec = arg
                    .as_document()
                    .ok_or_else(|| CommandError::bad_value("$project requires a document"))?;
                docs = docs.into_iter().map(|d| project(&d, spec)).collect();
            }
            "$sort" => {
                let spec = arg
                    .as_document()
                    .ok_or_else(|| CommandError::bad_value("$sort requires a document"))?;
                sort_by(&mut docs, spec);
            }
            "$skip" => {
                let n = arg.as_f64().unwrap_or(0.0) as usize;
                docs = docs.into_iter().skip(n).collect();
            }
            "$limit" => {
                let n = arg.as_f64().unwrap_or(0.0) as usize;
                docs.truncate(n);
            }
            "$unwind" => {
                let field = unwind_field(arg)?;
                docs = unwind(docs, &field);
            }
            "$group" => {
                let spec = arg
                    .as_document()
                    .ok_or_else(|| CommandError::bad_value("$group requires a document"))?;
                docs = group(&docs, spec)?;
            }
            "$out" | "$merge" if is_last => {
                let target = out_target(arg)?;
                write_out(&target, docs.clone())?;
            }
            "$out" | "$merge" => {
                return Err(CommandError::bad_value(format!(
                    "{name} is only valid as the last pipeline stage"
                )));
            }
            other => {
                return Err(CommandError::not_implemented(format!(
                    "aggregation stage '{other}' is not supported"
                )));
            }
        }
    }
    Ok(docs)
}

fn project(doc: &Document, spec: &Document) -> Document {
    let mut out = Document::new();
    let exclude_id = matches!(spec.get("_id"), Some(v) if !truthy(v));
    if !exclude_id {
        if let Some(id) = doc.get("_id") {
            out.insert("_id", id.clone());
        }
    }
    for (field, include) in spec.iter() {
        if field == "_id" {
            continue;
        }
        if truthy(include) {
            if let Some(value) = filter::resolve_path(doc, field) {
                out.insert(field.clone(), value);
            }
        }
    }
    out
}

fn truthy(value: &Bson) -> bool {
    value.as_bool().unwrap_or(true) && value.as_f64() != Some(0.0)
}

fn sort_by(docs: &mut [Document], spec: &Document) {
    docs.sort_by(|a, b| {
        for (field, direction) in spec.iter() {
            let desc = direction.as_f64().unwrap_or(1.0) < 0.0;
            let av = filter::resolve_path(a, field);
            let bv = filter::resolve_path(b, field);
            let ord = compare_optional(&av, &bv);
            if ord != std::cmp::Ordering::Equal {
                return if desc { ord.reverse() } else { ord };
            }
        }
        std::cmp::Ordering::Equal
    });
}

fn compare_optional(a: &Option<Bson>, b: &Option<Bson>) -> std::cmp::Ordering {
    match (a.as_ref().and_then(Bson::as_f64), b.as_ref().and_then(Bson::as_f64)) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal),
        _ => match (a.as_ref().and_then(Bson::as_str), b.as_ref().and_then(Bson::as_str)) {
            (Some(a), Some(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        },
    }
}

fn unwind_field(arg: &Bson) -> CommandResult<String> {
    match arg {
        Bson::String(s) => Ok(s.trim_start_matches('$').to_string()),
        Bson::Document(d) => d
            .get("path")
            .and_then(Bson::as_str)
            .map(|s| s.trim_start_matches('$').to_string())
            .ok_or_else(|| CommandError::bad_value("$unwind document requires a 'path' field")),
        _ => Err(CommandError::bad_value("$unwind requires a string or document")),
    }
}

fn unwind(docs: Vec<Document>, field: &str) -> Vec<Document> {
    let mut out = Vec::new();
    for doc in docs {
        match filter::resolve_path(&doc, field).and_then(|v| v.as_array().cloned()) {
            Some(values) => {
                for value in values {
                    let mut clone = doc.clone();
                    clone.insert(field, value);
                    out.push(clone);
                }
            }
            None => out.push(doc),
        }
    }
    out
}

fn out_target(arg: &Bson) -> CommandResult<String> {
    match arg {
        Bson::String(s) => Ok(s.clone()),
        Bson::Document(d) => d
            .get("into")
            .and_then(Bson::as_str)
            .map(str::to_string)
            .ok_or_else(|| CommandError::bad_value("$merge requires an 'into' target")),
        _ => Err(CommandError::bad_value("$out/$merge requires a string or document")),
    }
}

fn group(docs: &[Document], spec: &Document) -> CommandResult<Vec<Document>> {
    use std::collections::HashMap;

    let id_expr = spec
        .get("_id")
        .ok_or_else(|| CommandError::bad_value("$group requires an _id expression"))?;

    let mut buckets: HashMap<String, (Bson, Vec<&Document>)> = HashMap::new();
    for doc in docs {
        let key = eval_group_key(doc, id_expr);
        buckets
            .entry(key.to_string())
            .or_insert_with(|| (key.clone(), Vec::new()))
            .1
            .push(doc);
    }

    let mut out = Vec::new();
    for (_, (key, members)) in buckets {
        let mut result = Document::new();
        result.insert("_id", key);
        for (field, accumulator) in spec.iter() {
            if field == "_id" {
                continue;
            }
            result.insert(field.clone(), eval_accumulator(accumulator, &members)?);
        }
        out.push(result);
    }
    Ok(out)
}

fn eval_group_key(doc: &Document, expr: &Bson) -> Bson {
    match expr {
        Bson::String(path) if path.starts_with('$') => {
            filter::resolve_path(doc, &path[1..]).unwrap_or(Bson::Null)
        }
        other => other.clone(),
    }
}

fn eval_accumulator(accumulator: &Bson, members: &[&Document]) -> CommandResult<Bson> {
    let ops = accumulator
        .as_document()
        .ok_or_else(|| CommandError::bad_value("group accumulator must be a document"))?;
    let (op, field_expr) = ops
        .iter()
        .next()
        .ok_or_else(|| CommandError::bad_value("empty accumulator"))?;

    let values = || -> Vec<f64> {
        members
            .iter()
            .filter_map(|m| field_value(m, field_expr).and_then(|v| v.as_f64()))
            .collect()
    };

    match op.as_str() {
        "$sum" => {
            if matches!(field_expr, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) {
                let per = field_expr.as_f64().unwrap_or(1.0);
                Ok(Bson::Double(per * members.len() as f64))
            } else {
                Ok(Bson::Double(values().into_iter().sum()))
            }
        }
        "$avg" => {
            let v = values();
            let avg = if v.is_empty() { 0.0 } else { v.iter().sum::<f64>() / v.len() as f64 };
            Ok(Bson::Double(avg))
        }
        "$min" => Ok(values()
            .into_iter()
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
            .map(Bson::Double)
            .unwrap_or(Bson::Null)),
        "$max" => Ok(values()
            .into_iter()
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
            .map(Bson::Double)
            .unwrap_or(Bson::Null)),
        "$count" => Ok(Bson::Int64(members.len() as i64)),
        "$first" => Ok(members
            .first()
            .and_then(|m| field_value(m, field_expr))
            .unwrap_or(Bson::Null)),
        "$last" => Ok(members
            .last()
            .and_then(|m| field_value(m, field_expr))
            .unwrap_or(Bson::Null)),
        "$push" => Ok(Bson::Array(
            members
                .iter()
                .filter_map(|m| field_value(m, field_expr))
                .collect(),
        )),
        other => Err(CommandError::not_implemented(format!(
            "group accumulator '{other}' is not supported"
        ))),
    }
}

fn field_value(doc: &Document, expr: &Bson) -> Option<Bson> {
    match expr {
        Bson::String(path) if path.starts_with('$') => filter::resolve_path(doc, &path[1..]),
        other => Some(other.clone()),
    }
}
