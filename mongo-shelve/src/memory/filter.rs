use super::MemoryStoreError;
use crate::errors::{ShelveError, ShelveResult};
use bson::{Bson, Document};
use regex::RegexBuilder;
use std::cmp::Ordering;

/// Returns `true` if `document` satisfies the MongoDB-style `filter`.
///
/// An empty filter matches every document. Top-level fields are combined with
/// an implicit AND.
pub(crate) fn matches(document: &Document, filter: &Document) -> ShelveResult<bool> {
    for (key, condition) in filter {
        let matched = match key.as_str() {
            "$and" => {
                let mut all = true;
                for clause in clauses(key, condition)? {
                    if !matches(document, clause)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for clause in clauses(key, condition)? {
                    if matches(document, clause)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            "$nor" => {
                let mut none = true;
                for clause in clauses(key, condition)? {
                    if matches(document, clause)? {
                        none = false;
                        break;
                    }
                }
                none
            }
            op if is_operator_key(op) => {
                return Err(MemoryStoreError::UnsupportedOperator(op.to_string()).into())
            }
            path => matches_field(lookup(document, path), condition)?,
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Resolves a dotted field path through nested documents.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        match current {
            Bson::Document(inner) => current = inner.get(segment)?,
            _ => return None,
        }
    }
    Some(current)
}

fn clauses<'a>(operator: &str, condition: &'a Bson) -> ShelveResult<Vec<&'a Document>> {
    let array = match condition {
        Bson::Array(array) if !array.is_empty() => array,
        _ => {
            return Err(invalid_operand(operator, "a non-empty array of documents"))
        }
    };
    array
        .iter()
        .map(|clause| match clause {
            Bson::Document(doc) => Ok(doc),
            _ => Err(invalid_operand(operator, "a non-empty array of documents")),
        })
        .collect()
}

fn invalid_operand(operator: &str, expected: &'static str) -> ShelveError {
    MemoryStoreError::InvalidOperand {
        operator: operator.to_string(),
        expected,
    }
    .into()
}

// Numbers count as flags, truthy when non-zero.
fn exists_operand(operator: &str, operand: &Bson) -> ShelveResult<bool> {
    match operand {
        Bson::Boolean(expected) => Ok(*expected),
        Bson::Int32(n) => Ok(*n != 0),
        Bson::Int64(n) => Ok(*n != 0),
        Bson::Double(n) => Ok(*n != 0.0),
        _ => Err(invalid_operand(operator, "a boolean or number")),
    }
}

pub(crate) fn is_operator_key(key: &str) -> bool {
    key.starts_with('$')
}

fn is_operator_document(condition: &Bson) -> bool {
    match condition {
        Bson::Document(doc) => doc.keys().next().is_some_and(|k| is_operator_key(k)),
        _ => false,
    }
}

fn matches_field(value: Option<&Bson>, condition: &Bson) -> ShelveResult<bool> {
    let operators = match condition {
        Bson::Document(doc) if is_operator_document(condition) => doc,
        _ => return Ok(equals_or_contains(value, condition)),
    };

    for (operator, operand) in operators {
        let matched = match operator.as_str() {
            "$eq" => equals_or_contains(value, operand),
            "$ne" => !equals_or_contains(value, operand),
            "$gt" => compare_any(value, operand, |o| o == Ordering::Greater),
            "$gte" => compare_any(value, operand, |o| o != Ordering::Less),
            "$lt" => compare_any(value, operand, |o| o == Ordering::Less),
            "$lte" => compare_any(value, operand, |o| o != Ordering::Greater),
            "$in" => in_array(operator, value, operand)?,
            "$nin" => !in_array(operator, value, operand)?,
            "$exists" => value.is_some() == exists_operand(operator, operand)?,
            "$regex" => {
                let options = match operators.get("$options") {
                    Some(Bson::String(options)) => options.as_str(),
                    _ => "",
                };
                regex_matches(value, operand, options)?
            }
            "$options" => true,
            other => return Err(MemoryStoreError::UnsupportedOperator(other.to_string()).into()),
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn equals_or_contains(value: Option<&Bson>, expected: &Bson) -> bool {
    match value {
        // a missing field compares equal to null
        None => matches!(expected, Bson::Null),
        Some(Bson::Array(items)) if !matches!(expected, Bson::Array(_)) => {
            items.iter().any(|item| values_equal(item, expected))
        }
        Some(actual) => values_equal(actual, expected),
    }
}

fn compare_any<F>(value: Option<&Bson>, operand: &Bson, accept: F) -> bool
where
    F: Fn(Ordering) -> bool,
{
    match value {
        None => false,
        Some(Bson::Array(items)) => items
            .iter()
            .any(|item| compare_values(item, operand).is_some_and(&accept)),
        Some(actual) => compare_values(actual, operand).is_some_and(accept),
    }
}

fn in_array(operator: &str, value: Option<&Bson>, operand: &Bson) -> ShelveResult<bool> {
    match operand {
        Bson::Array(candidates) => Ok(candidates
            .iter()
            .any(|candidate| equals_or_contains(value, candidate))),
        _ => Err(invalid_operand(operator, "an array")),
    }
}

fn regex_matches(value: Option<&Bson>, pattern: &Bson, options: &str) -> ShelveResult<bool> {
    let (pattern, options) = match pattern {
        Bson::String(pattern) => (pattern.as_str(), options.to_string()),
        Bson::RegularExpression(regex) => (regex.pattern.as_str(), regex.options.clone()),
        _ => {
            return Err(invalid_operand("$regex", "a string or regular expression"))
        }
    };

    let regex = RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .ignore_whitespace(options.contains('x'))
        .build()?;

    Ok(match value {
        Some(Bson::String(text)) => regex.is_match(text),
        Some(Bson::Array(items)) => items.iter().any(|item| match item {
            Bson::String(text) => regex.is_match(text),
            _ => false,
        }),
        _ => false,
    })
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

/// Orders two values of the same BSON type family; mixed families (for
/// example a string against a number) are incomparable.
pub(crate) fn compare_values(left: &Bson, right: &Bson) -> Option<Ordering> {
    match (left, right) {
        (Bson::Int32(a), Bson::Int32(b)) => Some(a.cmp(b)),
        (Bson::Int64(a), Bson::Int64(b)) => Some(a.cmp(b)),
        (Bson::Int32(a), Bson::Int64(b)) => Some((*a as i64).cmp(b)),
        (Bson::Int64(a), Bson::Int32(b)) => Some(a.cmp(&(*b as i64))),
        (Bson::String(a), Bson::String(b)) => Some(a.cmp(b)),
        (Bson::Boolean(a), Bson::Boolean(b)) => Some(a.cmp(b)),
        (Bson::DateTime(a), Bson::DateTime(b)) => Some(a.cmp(b)),
        (Bson::ObjectId(a), Bson::ObjectId(b)) => Some(a.cmp(b)),
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        _ => match (as_f64(left), as_f64(right)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    }
}

pub(crate) fn values_equal(left: &Bson, right: &Bson) -> bool {
    match (as_f64(left), as_f64(right)) {
        (Some(_), Some(_)) => compare_values(left, right) == Some(Ordering::Equal),
        _ => left == right,
    }
}
