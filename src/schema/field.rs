/// Declared kind of a named field on a collection or element schema.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Scalar,
    Object,
    Array(ElementSchema),
}

impl FieldKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Scalar => "scalar",
            FieldKind::Object => "object",
            FieldKind::Array(_) => "array",
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, FieldKind::Array(_))
    }
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
}

/// Schema of the items stored in one array field. An element schema may
/// itself declare array fields, which is how one- and two-level nesting
/// is expressed in a declaration.
#[derive(Debug, Clone, Default)]
pub struct ElementSchema {
    fields: Vec<FieldDef>,
}

impl ElementSchema {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn scalar_field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind: FieldKind::Scalar,
        });
        self
    }

    pub fn object_field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind: FieldKind::Object,
        });
        self
    }

    pub fn array_field(mut self, name: impl Into<String>, element: ElementSchema) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind: FieldKind::Array(element),
        });
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }
}

/// Metadata for one registered collection: its name plus the declared
/// fields of its documents. Immutable once registered.
#[derive(Debug, Clone)]
pub struct CollectionSchema {
    name: String,
    fields: Vec<FieldDef>,
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scalar_field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind: FieldKind::Scalar,
        });
        self
    }

    pub fn object_field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind: FieldKind::Object,
        });
        self
    }

    pub fn array_field(mut self, name: impl Into<String>, element: ElementSchema) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind: FieldKind::Array(element),
        });
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_lookup_and_kind() {
        let schema = CollectionSchema::new("courses")
            .scalar_field("title")
            .array_field("modules", ElementSchema::new().scalar_field("number"));

        assert_eq!(schema.name(), "courses");
        assert!(schema.field("title").is_some_and(|f| !f.kind.is_array()));
        assert!(schema.field("modules").is_some_and(|f| f.kind.is_array()));
        assert!(schema.field("missing").is_none());
    }

    #[test]
    fn nested_declaration_reachable() {
        let schema = CollectionSchema::new("quizzes").array_field(
            "questions",
            ElementSchema::new()
                .scalar_field("text")
                .array_field("options", ElementSchema::new().scalar_field("label")),
        );

        let FieldKind::Array(questions) = &schema.field("questions").unwrap().kind else {
            panic!("questions must be an array");
        };
        assert!(questions.field("options").is_some_and(|f| f.kind.is_array()));
    }
}
