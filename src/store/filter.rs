use serde_json::{Value as JsonValue, json};

use crate::core::{Document, DocumentId};

/// One equality clause of a document selector. `path` is a plain dotted
/// path without positional segments.
#[derive(Debug, Clone)]
pub struct Clause {
    pub path: String,
    pub equals: JsonValue,
}

/// Document selector: a conjunction of field equality clauses. The core
/// never needs more than "by id" plus the occasional flag check.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: DocumentId) -> Self {
        Self::new().eq("id", json!(id))
    }

    pub fn eq(mut self, path: impl Into<String>, equals: impl Into<JsonValue>) -> Self {
        self.clauses.push(Clause {
            path: path.into(),
            equals: equals.into(),
        });
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Evaluates the selector against a document.
    pub fn matches(&self, document: &Document) -> bool {
        self.clauses
            .iter()
            .all(|clause| lookup(document, &clause.path) == Some(&clause.equals))
    }
}

fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a JsonValue> {
    let mut current = document;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn matches_by_id_and_flag() {
        let id = Uuid::new_v4();
        let doc = json!({ "id": id, "deleted": false, "title": "intro" });

        assert!(Filter::by_id(id).matches(&doc));
        assert!(Filter::by_id(id).eq("deleted", false).matches(&doc));
        assert!(!Filter::by_id(id).eq("deleted", true).matches(&doc));
        assert!(!Filter::by_id(Uuid::new_v4()).matches(&doc));
    }

    #[test]
    fn dotted_path_descends_objects() {
        let doc = json!({ "meta": { "level": "easy" } });
        assert!(Filter::new().eq("meta.level", "easy").matches(&doc));
        assert!(!Filter::new().eq("meta.missing", "x").matches(&doc));
    }
}
