use std::fmt;

/// One step of a dot-separated update path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A named field: `questions`.
    Field(String),
    /// A positional placeholder bound to an
    /// [`ArrayFilter`](super::ArrayFilter): rendered as `$[elem]`.
    Positional(String),
}

/// Typed builder for the dynamic field paths the store consumes.
///
/// Engines never concatenate raw strings into paths; they compose
/// segment by segment, so a malformed path is unrepresentable and a
/// misspelled field name is caught by the schema guard rather than
/// silently matching nothing.
///
/// ```
/// use docnest::store::FieldPath;
///
/// let path = FieldPath::field("questions")
///     .positional("elem")
///     .then("options");
/// assert_eq!(path.to_string(), "questions.$[elem].options");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Starts a path at a named field of the document root.
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::Field(name.into())],
        }
    }

    /// Appends a named field segment.
    pub fn then(mut self, name: impl Into<String>) -> Self {
        self.segments.push(Segment::Field(name.into()));
        self
    }

    /// Appends a positional placeholder segment.
    pub fn positional(mut self, placeholder: impl Into<String>) -> Self {
        self.segments.push(Segment::Positional(placeholder.into()));
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            match segment {
                Segment::Field(name) => write!(f, "{name}")?,
                Segment::Positional(placeholder) => write!(f, "$[{placeholder}]")?,
            }
        }
        Ok(())
    }
}

/// Selector naming one array field of a schema. Domain services define
/// these as constants next to their models, so the literal appears once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayField {
    name: &'static str,
}

impl ArrayField {
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for ArrayField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
