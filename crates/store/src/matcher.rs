//! Filter evaluation
//!
//! Evaluates a [`Filter`] against a single document. Drivers without a
//! native query engine (such as [`MemoryStore`](crate::MemoryStore)) use this
//! directly.
//!
//! Supported operators: `$eq`, `$ne`, `$in`, `$nin`, `$gt`, `$gte`, `$lt`,
//! `$lte`, `$exists` on fields and `$and`, `$or` at document level. Field
//! keys may be dotted paths into nested documents.

use std::cmp::Ordering;

use framedb_core::{get_path, Document, Value};

use crate::error::{StoreError, StoreResult};
use crate::query::Filter;

/// Check whether `doc` satisfies `filter`
pub fn matches(doc: &Document, filter: &Filter) -> StoreResult<bool> {
    matches_conditions(doc, filter.as_document())
}

fn matches_conditions(doc: &Document, conditions: &Document) -> StoreResult<bool> {
    for (key, condition) in conditions {
        let ok = match key.as_str() {
            "$and" => {
                let mut all = true;
                for clause in clauses(key, condition)? {
                    if !matches_conditions(doc, clause)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for clause in clauses(key, condition)? {
                    if matches_conditions(doc, clause)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            op if op.starts_with('$') => {
                return Err(StoreError::invalid_filter(format!(
                    "unknown top-level operator {}",
                    op
                )))
            }
            field => matches_field(get_path(doc, field), condition)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clauses<'a>(op: &str, condition: &'a Value) -> StoreResult<Vec<&'a Document>> {
    let items = condition
        .as_array()
        .ok_or_else(|| StoreError::invalid_filter(format!("{} expects an array", op)))?;
    items
        .iter()
        .map(|item| {
            item.as_document()
                .ok_or_else(|| StoreError::invalid_filter(format!("{} expects documents", op)))
        })
        .collect()
}

/// True for `{"$op": ...}` documents
pub(crate) fn is_operator_document(doc: &Document) -> bool {
    !doc.is_empty() && doc.keys().all(|k| k.starts_with('$'))
}

fn matches_field(value: Option<&Value>, condition: &Value) -> StoreResult<bool> {
    if let Value::Document(ops) = condition {
        if is_operator_document(ops) {
            for (op, arg) in ops {
                if !apply_operator(value, op, arg)? {
                    return Ok(false);
                }
            }
            return Ok(true);
        }
    }
    Ok(equals(value, condition))
}

/// Equality with array-contains semantics; a missing field equals null
fn equals(value: Option<&Value>, target: &Value) -> bool {
    match value {
        None => target.is_null(),
        Some(v) => {
            v.loose_eq(target)
                || matches!(v, Value::Array(items) if items.iter().any(|i| i.loose_eq(target)))
        }
    }
}

fn apply_operator(value: Option<&Value>, op: &str, arg: &Value) -> StoreResult<bool> {
    match op {
        "$eq" => Ok(equals(value, arg)),
        "$ne" => Ok(!equals(value, arg)),
        "$in" => {
            let options = arg
                .as_array()
                .ok_or_else(|| StoreError::invalid_filter("$in expects an array"))?;
            Ok(options.iter().any(|o| equals(value, o)))
        }
        "$nin" => {
            let options = arg
                .as_array()
                .ok_or_else(|| StoreError::invalid_filter("$nin expects an array"))?;
            Ok(!options.iter().any(|o| equals(value, o)))
        }
        "$gt" => Ok(compare_any(value, arg, |o| o == Ordering::Greater)),
        "$gte" => Ok(compare_any(value, arg, |o| o != Ordering::Less)),
        "$lt" => Ok(compare_any(value, arg, |o| o == Ordering::Less)),
        "$lte" => Ok(compare_any(value, arg, |o| o != Ordering::Greater)),
        "$exists" => {
            let wanted = arg
                .as_bool()
                .ok_or_else(|| StoreError::invalid_filter("$exists expects a bool"))?;
            Ok(value.is_some() == wanted)
        }
        other => Err(StoreError::invalid_filter(format!(
            "unknown field operator {}",
            other
        ))),
    }
}

/// Range comparison; only values of the same kind compare, arrays match when
/// any element does
fn compare_any(value: Option<&Value>, arg: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    let check = |v: &Value| comparable(v, arg) && accept(v.compare(arg));
    match value {
        None => false,
        Some(Value::Array(items)) => items.iter().any(check),
        Some(v) => check(v),
    }
}

fn comparable(a: &Value, b: &Value) -> bool {
    use Value::*;
    matches!(
        (a, b),
        (Int(_) | Float(_), Int(_) | Float(_))
            | (String(_), String(_))
            | (Id(_), Id(_))
            | (Bool(_), Bool(_))
            | (Date(_) | DateTime(_), Date(_) | DateTime(_))
    )
}
