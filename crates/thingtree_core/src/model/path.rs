//! Materialized hierarchy path codec.
//!
//! # Responsibility
//! - Validate hierarchy labels and build `ThingPath` values from them.
//! - Convert between label sequences and the delimited storage form.
//! - Answer ancestor/descendant questions on whole-label boundaries.
//!
//! # Invariants
//! - A `ThingPath` holds between 1 and `MAX_DEPTH` labels.
//! - Every label matches `^[A-Za-z0-9_]+$`, so `PATH_SEPARATOR` never occurs
//!   inside a label.
//! - `Ord` on `ThingPath` is lexicographic order over label sequences, which is
//!   also byte order of the storage form (the separator sorts below every
//!   legal label byte).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Separator between labels in the storage form.
pub const PATH_SEPARATOR: char = '.';
const PATH_SEPARATOR_STR: &str = ".";
/// Code point right after `PATH_SEPARATOR`; upper bound of a subtree range.
pub const SUBTREE_UPPER_BOUND: char = '/';
/// Maximum byte length of a single label.
pub const MAX_LABEL_LEN: usize = 256;
/// Maximum number of labels in one path.
pub const MAX_DEPTH: usize = 255;

static LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid label regex"));

/// Path construction/validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// Label sequence (or storage text) is empty.
    EmptyPath,
    /// One label is empty, too long, or contains a reserved character.
    InvalidLabel { label: String, reason: &'static str },
    /// Path has more labels than `MAX_DEPTH`.
    TooDeep { depth: usize, max: usize },
}

impl Display for PathError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPath => write!(f, "path must contain at least one label"),
            Self::InvalidLabel { label, reason } => {
                write!(f, "invalid path label `{label}`: {reason}")
            }
            Self::TooDeep { depth, max } => {
                write!(f, "path depth {depth} exceeds maximum {max}")
            }
        }
    }
}

impl Error for PathError {}

/// Position of a thing in the ownership hierarchy, root label first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ThingPath {
    labels: Vec<String>,
}

impl ThingPath {
    /// Builds a path from an ordered label sequence.
    ///
    /// # Errors
    /// - `EmptyPath` when `labels` yields nothing.
    /// - `InvalidLabel` when any label fails `validate_label`.
    /// - `TooDeep` when the sequence exceeds `MAX_DEPTH`.
    pub fn encode<I, S>(labels: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels = labels.into_iter().map(Into::into).collect::<Vec<String>>();
        if labels.is_empty() {
            return Err(PathError::EmptyPath);
        }
        if labels.len() > MAX_DEPTH {
            return Err(PathError::TooDeep {
                depth: labels.len(),
                max: MAX_DEPTH,
            });
        }
        for label in &labels {
            validate_label(label)?;
        }
        Ok(Self { labels })
    }

    /// Parses the delimited storage form, e.g. `A.AB.ABC`.
    ///
    /// Empty segments (`A..B`, trailing `.`) are reported as `InvalidLabel`.
    pub fn parse(text: &str) -> Result<Self, PathError> {
        if text.is_empty() {
            return Err(PathError::EmptyPath);
        }
        Self::encode(text.split(PATH_SEPARATOR))
    }

    /// Returns the label sequence, root first.
    pub fn decode(&self) -> Vec<String> {
        self.labels.clone()
    }

    /// Borrowed view of the label sequence.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of labels; roots have depth 1.
    pub fn depth(&self) -> usize {
        self.labels.len()
    }

    /// Last label of the path.
    pub fn leaf(&self) -> &str {
        // Non-empty by construction.
        self.labels.last().map(String::as_str).unwrap_or_default()
    }

    /// Path one level up, or `None` for a root path.
    pub fn parent(&self) -> Option<Self> {
        if self.labels.len() < 2 {
            return None;
        }
        Some(Self {
            labels: self.labels[..self.labels.len() - 1].to_vec(),
        })
    }

    /// Returns `parent + [label]` as a new validated path.
    pub fn append(&self, label: impl Into<String>) -> Result<Self, PathError> {
        let mut labels = self.labels.clone();
        labels.push(label.into());
        Self::encode(labels)
    }

    /// All prefixes of this path, root first, this path last.
    pub fn ancestors(&self) -> Vec<Self> {
        (1..=self.labels.len())
            .map(|len| Self {
                labels: self.labels[..len].to_vec(),
            })
            .collect()
    }

    /// True iff `ancestor`'s labels are a whole-label prefix of `self`'s.
    pub fn is_descendant_or_equal(&self, ancestor: &ThingPath) -> bool {
        ancestor.labels.len() <= self.labels.len()
            && self.labels[..ancestor.labels.len()] == ancestor.labels[..]
    }

    /// True iff `self`'s labels are a whole-label prefix of `descendant`'s.
    pub fn is_ancestor_or_equal(&self, descendant: &ThingPath) -> bool {
        descendant.is_descendant_or_equal(self)
    }

    /// Delimited storage form.
    pub fn as_storage(&self) -> String {
        self.labels.join(PATH_SEPARATOR_STR)
    }

    /// Half-open storage-form range `[lower, upper)` covering this path and
    /// every descendant.
    pub fn subtree_range(&self) -> (String, String) {
        let lower = self.as_storage();
        let mut upper = lower.clone();
        upper.push(SUBTREE_UPPER_BOUND);
        (lower, upper)
    }
}

/// Checks one label against the codec's label rules.
pub fn validate_label(label: &str) -> Result<(), PathError> {
    if label.is_empty() {
        return Err(PathError::InvalidLabel {
            label: label.to_string(),
            reason: "label must not be empty",
        });
    }
    if label.len() > MAX_LABEL_LEN {
        return Err(PathError::InvalidLabel {
            label: label.to_string(),
            reason: "label exceeds maximum length",
        });
    }
    if !LABEL_RE.is_match(label) {
        return Err(PathError::InvalidLabel {
            label: label.to_string(),
            reason: "label may only contain A-Z, a-z, 0-9 and `_`",
        });
    }
    Ok(())
}

impl Display for ThingPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_storage())
    }
}

impl FromStr for ThingPath {
    type Err = PathError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for ThingPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ThingPath> for String {
    fn from(value: ThingPath) -> Self {
        value.as_storage()
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_label, PathError, ThingPath, MAX_DEPTH, MAX_LABEL_LEN};

    fn path(text: &str) -> ThingPath {
        ThingPath::parse(text).expect("test path should parse")
    }

    #[test]
    fn decode_inverts_encode() {
        let labels = vec!["A", "AB", "ABC_1"];
        let encoded = ThingPath::encode(labels.clone()).unwrap();
        assert_eq!(encoded.decode(), labels);
        assert_eq!(encoded.to_string(), "A.AB.ABC_1");
    }

    #[test]
    fn encode_rejects_empty_sequence() {
        let err = ThingPath::encode(Vec::<String>::new()).unwrap_err();
        assert_eq!(err, PathError::EmptyPath);
        assert_eq!(ThingPath::parse("").unwrap_err(), PathError::EmptyPath);
    }

    #[test]
    fn encode_rejects_separator_inside_label() {
        let err = ThingPath::encode(["A", "B.C"]).unwrap_err();
        assert!(matches!(err, PathError::InvalidLabel { ref label, .. } if label == "B.C"));
    }

    #[test]
    fn parse_rejects_empty_segments() {
        assert!(matches!(
            ThingPath::parse("A..B").unwrap_err(),
            PathError::InvalidLabel { .. }
        ));
        assert!(matches!(
            ThingPath::parse("A.").unwrap_err(),
            PathError::InvalidLabel { .. }
        ));
    }

    #[test]
    fn label_length_and_depth_are_bounded() {
        let long = "x".repeat(MAX_LABEL_LEN + 1);
        assert!(validate_label(&long).is_err());
        assert!(validate_label(&"x".repeat(MAX_LABEL_LEN)).is_ok());

        let too_deep = vec!["a"; MAX_DEPTH + 1];
        assert_eq!(
            ThingPath::encode(too_deep).unwrap_err(),
            PathError::TooDeep {
                depth: MAX_DEPTH + 1,
                max: MAX_DEPTH
            }
        );
    }

    #[test]
    fn descendant_check_is_reflexive_and_transitive() {
        let a = path("A");
        let ab = path("A.AB");
        let abc = path("A.AB.ABC");

        assert!(a.is_descendant_or_equal(&a));
        assert!(ab.is_descendant_or_equal(&a));
        assert!(abc.is_descendant_or_equal(&ab));
        assert!(abc.is_descendant_or_equal(&a));
        assert!(a.is_ancestor_or_equal(&abc));
        assert!(!a.is_descendant_or_equal(&ab));
    }

    #[test]
    fn prefix_checks_respect_label_boundaries() {
        let ab = path("A.AB");
        let abc = path("A.ABC");

        assert!(!abc.is_descendant_or_equal(&ab));
        assert!(!ab.is_ancestor_or_equal(&abc));
    }

    #[test]
    fn append_and_parent_are_inverse() {
        let parent = path("A.AB");
        let child = parent.append("ABC").unwrap();
        assert_eq!(child, path("A.AB.ABC"));
        assert_eq!(child.parent(), Some(parent));
        assert_eq!(child.leaf(), "ABC");
        assert_eq!(path("A").parent(), None);
        assert!(path("A").append("bad-label").is_err());
    }

    #[test]
    fn ancestors_are_root_first() {
        let chain = path("A.AB.ABC")
            .ancestors()
            .into_iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>();
        assert_eq!(chain, vec!["A", "A.AB", "A.AB.ABC"]);
    }

    #[test]
    fn subtree_range_excludes_sibling_with_shared_prefix() {
        let (lower, upper) = path("A.AB").subtree_range();
        let inside = path("A.AB.ABA").as_storage();
        let sibling = path("A.ABC").as_storage();

        assert!(lower.as_str() <= inside.as_str() && inside.as_str() < upper.as_str());
        assert!(!(lower.as_str() <= sibling.as_str() && sibling.as_str() < upper.as_str()));
    }

    #[test]
    fn ordering_matches_storage_byte_order() {
        let mut paths = vec![path("A.ABC"), path("A.AB.ABA"), path("A.AB"), path("A")];
        paths.sort();
        let mut storage = paths.iter().map(ThingPath::as_storage).collect::<Vec<_>>();
        let ordered = storage.clone();
        storage.sort();
        assert_eq!(ordered, storage);
        assert_eq!(ordered, vec!["A", "A.AB", "A.AB.ABA", "A.ABC"]);
    }
}
