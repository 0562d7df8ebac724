//! Thing domain model.
//!
//! # Responsibility
//! - Define the canonical record stored in the hierarchical store.
//! - Model editable attributes as value + last-mutator pairs.
//!
//! # Invariants
//! - `id` is stable and never reused for another thing.
//! - `path` is fixed at creation.
//! - `deleted_at` is the source of truth for tombstone state.

use crate::model::path::ThingPath;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier for every stored thing.
pub type ThingId = Uuid;

/// Editable attribute together with the identity that last changed it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedField {
    pub value: String,
    /// Empty until the first field-level update.
    pub modified_by: String,
}

impl TrackedField {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            modified_by: String::new(),
        }
    }
}

/// Attributes that `update_field` may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThingField {
    Name,
    Color,
    Code,
}

impl ThingField {
    /// All editable fields in storage column order.
    pub const ALL: [ThingField; 3] = [Self::Name, Self::Color, Self::Code];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Color => "color",
            Self::Code => "code",
        }
    }
}

/// Field name that does not address an editable attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFieldError(pub String);

impl Display for UnknownFieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown thing field `{}`; expected Name|Color|Code",
            self.0
        )
    }
}

impl Error for UnknownFieldError {}

impl FromStr for ThingField {
    type Err = UnknownFieldError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "color" => Ok(Self::Color),
            "code" => Ok(Self::Code),
            _ => Err(UnknownFieldError(value.to_string())),
        }
    }
}

impl Display for ThingField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Creation request for one thing.
///
/// `path` is kept as raw labels so that validation happens once, inside the
/// store's create path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewThing {
    pub owner: String,
    pub color: String,
    pub path: Vec<String>,
    pub name: Option<String>,
    pub code: Option<String>,
}

impl NewThing {
    pub fn new<I, S>(owner: impl Into<String>, color: impl Into<String>, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            owner: owner.into(),
            color: color.into(),
            path: path.into_iter().map(Into::into).collect(),
            name: None,
            code: None,
        }
    }

    /// Builds a request from the delimited form (`A.AB.ABC`) without
    /// validating it.
    pub fn at(owner: impl Into<String>, color: impl Into<String>, path: &str) -> Self {
        let labels = if path.is_empty() {
            Vec::new()
        } else {
            path.split(crate::model::path::PATH_SEPARATOR)
                .map(str::to_string)
                .collect()
        };
        Self::new(owner, color, labels)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Canonical stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thing {
    pub id: ThingId,
    pub owner: String,
    pub name: TrackedField,
    pub color: TrackedField,
    pub code: TrackedField,
    pub path: ThingPath,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
    /// Epoch ms tombstone; `None` while live.
    pub deleted_at: Option<i64>,
}

impl Thing {
    /// Returns the tracked attribute addressed by `field`.
    pub fn field(&self, field: ThingField) -> &TrackedField {
        match field {
            ThingField::Name => &self.name,
            ThingField::Color => &self.color,
            ThingField::Code => &self.code,
        }
    }

    /// Returns whether this thing is visible to queries.
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::{NewThing, ThingField};

    #[test]
    fn field_names_parse_case_insensitively() {
        assert_eq!("Name".parse::<ThingField>().unwrap(), ThingField::Name);
        assert_eq!(" COLOR ".parse::<ThingField>().unwrap(), ThingField::Color);
        assert_eq!("code".parse::<ThingField>().unwrap(), ThingField::Code);
    }

    #[test]
    fn owner_is_not_an_editable_field() {
        let err = "Owner".parse::<ThingField>().unwrap_err();
        assert_eq!(err.0, "Owner");
    }

    #[test]
    fn new_thing_at_splits_delimited_path() {
        let request = NewThing::at("AB", "yellow", "A.AB").with_code("x1");
        assert_eq!(request.path, vec!["A", "AB"]);
        assert_eq!(request.code.as_deref(), Some("x1"));
        assert!(NewThing::at("A", "orange", "").path.is_empty());
    }
}
