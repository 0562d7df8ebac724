//! Hierarchical store use-case service.
//!
//! # Responsibility
//! - Expose create, field update, soft delete and hierarchy queries.
//! - Resolve caller-supplied field names to editable attributes.
//! - Emit metadata-only operation events.
//!
//! # Invariants
//! - Path, owner and identity are never changed after creation.
//! - Only `Name`, `Color` and `Code` are addressable by `update_field`.
//! - Nothing is retried; repository failures are reported as-is.

use crate::model::path::{PathError, ThingPath};
use crate::model::thing::{NewThing, Thing, ThingField, ThingId};
use crate::repo::thing_repo::{ThingRepoError, ThingRepository};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Errors from thing service operations.
#[derive(Debug)]
pub enum ThingServiceError {
    /// Requested path was rejected by the codec.
    InvalidPath(PathError),
    /// Field name does not address an editable attribute.
    UnknownField(String),
    /// No live thing has this id.
    NotFound(ThingId),
    /// A live thing already occupies this path.
    DuplicatePath(ThingPath),
    /// Repository-level failure.
    Repo(ThingRepoError),
}

impl ThingServiceError {
    /// Stable machine-readable code used in log events.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidPath(PathError::EmptyPath) => "empty_path",
            Self::InvalidPath(PathError::InvalidLabel { .. }) => "invalid_label",
            Self::InvalidPath(PathError::TooDeep { .. }) => "path_too_deep",
            Self::UnknownField(_) => "unknown_field",
            Self::NotFound(_) => "not_found",
            Self::DuplicatePath(_) => "duplicate_path",
            Self::Repo(_) => "repo_failed",
        }
    }
}

impl Display for ThingServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPath(err) => write!(f, "invalid path: {err}"),
            Self::UnknownField(name) => {
                write!(f, "unknown thing field `{name}`; expected Name|Color|Code")
            }
            Self::NotFound(id) => write!(f, "thing not found: {id}"),
            Self::DuplicatePath(path) => write!(f, "a live thing already exists at `{path}`"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ThingServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidPath(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ThingRepoError> for ThingServiceError {
    fn from(value: ThingRepoError) -> Self {
        match value {
            ThingRepoError::InvalidPath(err) => Self::InvalidPath(err),
            ThingRepoError::NotFound(id) => Self::NotFound(id),
            ThingRepoError::DuplicatePath(path) => Self::DuplicatePath(path),
            other => Self::Repo(other),
        }
    }
}

impl From<PathError> for ThingServiceError {
    fn from(value: PathError) -> Self {
        Self::InvalidPath(value)
    }
}

pub type ThingServiceResult<T> = Result<T, ThingServiceError>;

/// Hierarchical store facade.
pub struct ThingService<R: ThingRepository> {
    repo: R,
}

impl<R: ThingRepository> ThingService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Stores one new thing.
    ///
    /// # Errors
    /// - `InvalidPath` when the codec rejects `request.path`.
    /// - `DuplicatePath` when a live thing already holds the path.
    pub fn create(&self, request: &NewThing) -> ThingServiceResult<Thing> {
        let started_at = Instant::now();
        let result = self.repo.create_thing(request).map_err(ThingServiceError::from);
        match &result {
            Ok(thing) => info!(
                "event=thing_create module=service status=ok id={} depth={} duration_ms={}",
                thing.id,
                thing.path.depth(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=thing_create module=service status=error error_code={} duration_ms={}",
                err.error_code(),
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    /// Stores one new thing directly below `parent`.
    pub fn create_child(
        &self,
        parent: &ThingPath,
        label: impl Into<String>,
        owner: impl Into<String>,
        color: impl Into<String>,
    ) -> ThingServiceResult<Thing> {
        let path = parent.append(label)?;
        self.create(&NewThing::new(owner, color, path.decode()))
    }

    /// Loads one live thing by id.
    pub fn get(&self, id: ThingId) -> ThingServiceResult<Option<Thing>> {
        self.repo.get_thing(id, false).map_err(Into::into)
    }

    /// Loads one thing by id, tombstoned rows included.
    pub fn get_including_deleted(&self, id: ThingId) -> ThingServiceResult<Option<Thing>> {
        self.repo.get_thing(id, true).map_err(Into::into)
    }

    /// Loads the live thing stored exactly at `path`.
    pub fn find_by_path(&self, path: &ThingPath) -> ThingServiceResult<Option<Thing>> {
        self.repo.find_by_path(path).map_err(Into::into)
    }

    /// Sets one editable field by name and stamps its `modified_by`.
    ///
    /// # Errors
    /// - `UnknownField` unless `field_name` is `Name`, `Color` or `Code`.
    /// - `NotFound` when no live thing has `id`.
    pub fn update_field(
        &self,
        id: ThingId,
        field_name: &str,
        value: impl AsRef<str>,
        modified_by: impl AsRef<str>,
    ) -> ThingServiceResult<Thing> {
        let field = field_name
            .parse::<ThingField>()
            .map_err(|err| ThingServiceError::UnknownField(err.0))?;
        self.update(id, field, value.as_ref(), modified_by.as_ref())
    }

    /// Typed variant of `update_field`.
    pub fn update(
        &self,
        id: ThingId,
        field: ThingField,
        value: &str,
        modified_by: &str,
    ) -> ThingServiceResult<Thing> {
        let result = self
            .repo
            .update_field(id, field, value, modified_by)
            .map_err(ThingServiceError::from);
        match &result {
            Ok(_) => info!(
                "event=thing_update_field module=service status=ok id={id} field={field}"
            ),
            Err(err) => warn!(
                "event=thing_update_field module=service status=error id={id} field={field} error_code={}",
                err.error_code()
            ),
        }
        result
    }

    /// Tombstones one thing.
    ///
    /// Repeat calls on an already tombstoned id succeed without change.
    /// Returns `NotFound` only when `id` was never stored.
    pub fn soft_delete(&self, id: ThingId) -> ThingServiceResult<()> {
        let result = self.repo.soft_delete_thing(id).map_err(ThingServiceError::from);
        match &result {
            Ok(()) => info!("event=thing_soft_delete module=service status=ok id={id}"),
            Err(err) => warn!(
                "event=thing_soft_delete module=service status=error id={id} error_code={}",
                err.error_code()
            ),
        }
        result
    }

    /// Every live thing at or below `path`, in label order.
    pub fn find_descendants(&self, path: &ThingPath) -> ThingServiceResult<Vec<Thing>> {
        self.query("descendants", path, |repo| repo.find_descendants(path))
    }

    /// Every live thing on the root-to-`path` chain, root first.
    pub fn find_ancestors(&self, path: &ThingPath) -> ThingServiceResult<Vec<Thing>> {
        self.query("ancestors", path, |repo| repo.find_ancestors(path))
    }

    /// Live things exactly one level below `path`.
    pub fn find_children(&self, path: &ThingPath) -> ThingServiceResult<Vec<Thing>> {
        self.query("children", path, |repo| repo.find_children(path))
    }

    fn query<F>(&self, kind: &'static str, path: &ThingPath, run: F) -> ThingServiceResult<Vec<Thing>>
    where
        F: FnOnce(&R) -> Result<Vec<Thing>, ThingRepoError>,
    {
        let started_at = Instant::now();
        let result = run(&self.repo).map_err(ThingServiceError::from);
        match &result {
            Ok(things) => info!(
                "event=thing_query module=service status=ok kind={kind} depth={} result_count={} duration_ms={}",
                path.depth(),
                things.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=thing_query module=service status=error kind={kind} depth={} error_code={} duration_ms={}",
                path.depth(),
                err.error_code(),
                started_at.elapsed().as_millis()
            ),
        }
        result
    }
}
