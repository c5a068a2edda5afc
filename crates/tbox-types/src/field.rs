//! Field types, nullability actions, and space-level field definitions.

use std::fmt;

use crate::wire::ElementType;

/// Declared type of a tuple field.
///
/// `Any` matches every encoded element; all other kinds demand a specific
/// tag class. The enumeration is closed: index validation and field-map
/// construction both match exhaustively on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// No constraint.
    Any,
    /// Signed or unsigned integer.
    Integer,
    /// Integer or float.
    Number,
    /// UTF-8 string.
    String,
    /// Boolean.
    Boolean,
    /// Nested array.
    Array,
}

impl FieldType {
    /// Lowercase name used in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Array => "array",
        }
    }

    /// Whether this is a scalar kind (everything except `Any` and `Array`).
    #[must_use]
    pub const fn is_scalar(self) -> bool {
        !matches!(self, Self::Any | Self::Array)
    }

    /// Whether an encoded element of type `element` satisfies this
    /// declared type. Nullability is handled by the caller.
    #[must_use]
    pub const fn admits(self, element: ElementType) -> bool {
        match self {
            Self::Any => true,
            Self::Integer => matches!(element, ElementType::Integer),
            Self::Number => matches!(element, ElementType::Integer | ElementType::Float),
            Self::String => matches!(element, ElementType::Str),
            Self::Boolean => matches!(element, ElementType::Bool),
            Self::Array => matches!(element, ElementType::Array),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when a field is missing or nil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullAction {
    /// Unset; defers to whatever another definition of the field says.
    Default,
    /// Nulls are permitted, nothing to do.
    None,
    /// Abort the statement.
    Abort,
    /// Fail the statement, keeping prior effects.
    Fail,
    /// Silently skip the offending row.
    Ignore,
    /// Substitute the declared default.
    Replace,
}

impl NullAction {
    /// Lowercase name used in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::None => "none",
            Self::Abort => "abort",
            Self::Fail => "fail",
            Self::Ignore => "ignore",
            Self::Replace => "replace",
        }
    }

    /// Two actions match iff either is `Default` or they are equal.
    #[must_use]
    pub const fn matches(self, other: Self) -> bool {
        matches!(self, Self::Default) || matches!(other, Self::Default) || self as u8 == other as u8
    }
}

impl fmt::Display for NullAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A space-level field definition: name, declared type, nullability.
///
/// The constructors keep `is_nullable` and `nullable_action` consistent:
/// a field is nullable iff its action is [`NullAction::None`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FieldDef {
    /// Field name, unique within the space.
    pub name: String,
    /// Declared type.
    pub field_type: FieldType,
    /// Whether nil is an admissible value.
    pub is_nullable: bool,
    /// Action on missing or nil values.
    pub nullable_action: NullAction,
}

impl FieldDef {
    /// A non-nullable field with an unset action.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            is_nullable: false,
            nullable_action: NullAction::Default,
        }
    }

    /// A nullable field.
    #[must_use]
    pub fn nullable(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            is_nullable: true,
            nullable_action: NullAction::None,
        }
    }
}
