//! Element envelope and the Active/SoftDeleted state machine shared by
//! every nesting depth.
//!
//! Elements are created only through an engine's append operation, which
//! wraps the caller's data in the envelope built here. The state machine
//! is: active -> soft-deleted -> (restored -> active) | (purged). There
//! is no direct active -> purged transition.

use serde::Serialize;
use serde_json::{Map, Value as JsonValue, json};
use uuid::Uuid;

use crate::core::{ActorId, DocumentId, EngineError, Result};

pub const ID: &str = "id";
pub const DELETED: &str = "deleted";
pub const DELETED_BY: &str = "deletedBy";
pub const CREATED_BY: &str = "createdBy";
pub const UPDATED_BY: &str = "updatedBy";

/// Visible lifecycle state of an element. Purged elements no longer
/// exist, so they carry no state here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementState {
    Active,
    SoftDeleted,
}

impl ElementState {
    pub fn of(element: &JsonValue) -> Self {
        if element
            .get(DELETED)
            .and_then(JsonValue::as_bool)
            .unwrap_or(false)
        {
            ElementState::SoftDeleted
        } else {
            ElementState::Active
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementState::Active => "active",
            ElementState::SoftDeleted => "soft-deleted",
        }
    }
}

/// Builds the stored envelope for a new element: the caller's data plus
/// a client-side generated id, the active flag and the creation stamp.
///
/// The id is generated before the push so the element can be re-located
/// by id afterwards; locating it by array position would be wrong under
/// concurrent appends to the same array.
pub fn new_element(data: impl Serialize, actor: ActorId) -> Result<(DocumentId, JsonValue)> {
    let mut value = serde_json::to_value(data)?;
    let Some(object) = value.as_object_mut() else {
        return Err(EngineError::Configuration(
            "element data must serialize to a JSON object".into(),
        ));
    };
    let id = Uuid::new_v4();
    object.insert(ID.into(), json!(id));
    object.insert(DELETED.into(), json!(false));
    object.insert(CREATED_BY.into(), json!(actor));
    Ok((id, value))
}

pub fn element_id(element: &JsonValue) -> Option<DocumentId> {
    element
        .get(ID)
        .and_then(JsonValue::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

pub fn is_deleted(element: &JsonValue) -> bool {
    ElementState::of(element) == ElementState::SoftDeleted
}

pub fn find_element(elements: &[JsonValue], id: DocumentId) -> Option<&JsonValue> {
    elements.iter().find(|el| element_id(el) == Some(id))
}

/// State-machine check: `Conflict` when the element is not in the state
/// the requested transition starts from, naming the id and its current
/// state.
pub fn ensure_state(
    element: &JsonValue,
    entity: &'static str,
    required: ElementState,
) -> Result<()> {
    let state = ElementState::of(element);
    if state != required {
        let id = element_id(element)
            .map(|id| id.to_string())
            .unwrap_or_else(|| "unknown".into());
        return Err(EngineError::conflict(entity, id, state.as_str()));
    }
    Ok(())
}

/// Normalizes an update patch to its key/value entries. Patches address
/// whole fields of the element; a non-object patch is engine misuse.
pub fn patch_entries(patch: JsonValue) -> Result<Map<String, JsonValue>> {
    match patch {
        JsonValue::Object(map) => Ok(map),
        other => Err(EngineError::Configuration(format!(
            "patch must be a JSON object, got {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_element_stamps_envelope() {
        let actor = Uuid::new_v4();
        let (id, element) = new_element(json!({ "name": "x" }), actor).unwrap();

        assert_eq!(element_id(&element), Some(id));
        assert_eq!(element[DELETED], json!(false));
        assert_eq!(element[CREATED_BY], json!(actor));
        assert_eq!(element["name"], "x");
    }

    #[test]
    fn non_object_data_rejected() {
        let err = new_element(json!([1, 2]), Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn state_of_element() {
        assert_eq!(ElementState::of(&json!({ "deleted": false })), ElementState::Active);
        assert_eq!(
            ElementState::of(&json!({ "deleted": true })),
            ElementState::SoftDeleted
        );
        // Absent flag reads as active.
        assert_eq!(ElementState::of(&json!({})), ElementState::Active);
    }

    #[test]
    fn ensure_state_conflicts_carry_id_and_state() {
        let id = Uuid::new_v4();
        let element = json!({ "id": id, "deleted": true });
        let err = ensure_state(&element, "element", ElementState::Active).unwrap_err();
        match err {
            EngineError::Conflict {
                entity,
                id: reported,
                state,
            } => {
                assert_eq!(entity, "element");
                assert_eq!(reported, id.to_string());
                assert_eq!(state, "soft-deleted");
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[test]
    fn find_element_by_id() {
        let target = Uuid::new_v4();
        let elements = vec![
            json!({ "id": Uuid::new_v4() }),
            json!({ "id": target, "name": "hit" }),
        ];
        assert_eq!(find_element(&elements, target).unwrap()["name"], "hit");
        assert!(find_element(&elements, Uuid::new_v4()).is_none());
    }
}
