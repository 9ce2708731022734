use super::filter::is_operator_key;
use super::MemoryStoreError;
use crate::errors::ShelveResult;
use bson::{Bson, Document};

/// Applies `$set` and `$unset` operators from `update` to `document`.
pub(crate) fn apply_update(document: &mut Document, update: &Document) -> ShelveResult<()> {
    for (operator, fields) in update {
        let fields = match fields {
            Bson::Document(fields) => fields,
            _ => {
                return Err(MemoryStoreError::InvalidOperand {
                    operator: operator.clone(),
                    expected: "a document of fields",
                }
                .into())
            }
        };

        match operator.as_str() {
            "$set" => {
                for (path, value) in fields {
                    set_path(document, path, value.clone());
                }
            }
            "$unset" => {
                for (path, _) in fields {
                    unset_path(document, path);
                }
            }
            other => return Err(MemoryStoreError::UnsupportedOperator(other.to_string()).into()),
        }
    }
    Ok(())
}

/// Builds the document an upsert inserts when nothing matched: the plain
/// equality conditions of `filter`, with `update` applied on top.
pub(crate) fn upsert_seed(filter: &Document, update: &Document) -> ShelveResult<Document> {
    let mut seed = Document::new();
    for (path, condition) in filter {
        if is_operator_key(path) || path.contains('.') {
            continue;
        }
        match condition {
            Bson::Document(inner) if inner.keys().any(|k| is_operator_key(k)) => {
                if let Some(value) = inner.get("$eq") {
                    seed.insert(path.clone(), value.clone());
                }
            }
            value => {
                seed.insert(path.clone(), value.clone());
            }
        }
    }
    apply_update(&mut seed, update)?;
    Ok(seed)
}

fn set_path(document: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(document.get(head), Some(Bson::Document(_))) {
                document.insert(head, Document::new());
            }
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                set_path(inner, rest, value);
            }
        }
    }
}

fn unset_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                unset_path(inner, rest);
            }
        }
    }
}
