//! Thing repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist things and evaluate hierarchy-scoped queries.
//! - Keep SQL and the storage form of paths inside the persistence boundary.
//!
//! # Invariants
//! - Only live (`deleted_at IS NULL`) things are returned by hierarchy queries.
//! - Subtree queries are one range scan over `idx_things_path`:
//!   `[P, P + "/")` holds exactly `P` and its descendants because `.` is the
//!   only legal byte below `/`.
//! - Ancestor queries probe at most `depth(P)` keys.
//! - Query order is deterministic: `path ASC, id ASC` (descendants) or
//!   `depth ASC, id ASC` (ancestors).
//! - At most one live thing per path.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::path::{PathError, ThingPath};
use crate::model::thing::{NewThing, Thing, ThingField, ThingId, TrackedField};
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction,
    TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

const THING_SELECT_SQL: &str = "SELECT
    id,
    owner,
    name,
    name_modified_by,
    color,
    color_modified_by,
    code,
    code_modified_by,
    path,
    depth,
    created_at,
    updated_at,
    deleted_at
FROM things";

const THING_COLUMNS: [&str; 13] = [
    "id",
    "owner",
    "name",
    "name_modified_by",
    "color",
    "color_modified_by",
    "code",
    "code_modified_by",
    "path",
    "depth",
    "created_at",
    "updated_at",
    "deleted_at",
];

/// Result type used by thing repository operations.
pub type ThingRepoResult<T> = Result<T, ThingRepoError>;

/// Errors from thing repository operations.
#[derive(Debug)]
pub enum ThingRepoError {
    /// Underlying SQLite/bootstrap error, passed through unchanged.
    Db(DbError),
    /// Requested path was rejected by the codec.
    InvalidPath(PathError),
    /// No live thing has this id.
    NotFound(ThingId),
    /// A live thing already occupies this path.
    DuplicatePath(ThingPath),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for ThingRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidPath(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "thing not found: {id}"),
            Self::DuplicatePath(path) => write!(f, "a live thing already exists at `{path}`"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "thing repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "thing repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "thing repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted thing data: {message}"),
        }
    }
}

impl Error for ThingRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidPath(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for ThingRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for ThingRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<PathError> for ThingRepoError {
    fn from(value: PathError) -> Self {
        Self::InvalidPath(value)
    }
}

/// Repository interface for the hierarchical thing store.
pub trait ThingRepository {
    /// Validates and inserts one thing, returning the stored row.
    fn create_thing(&self, request: &NewThing) -> ThingRepoResult<Thing>;
    /// Loads one thing by id.
    fn get_thing(&self, id: ThingId, include_deleted: bool) -> ThingRepoResult<Option<Thing>>;
    /// Loads the live thing stored exactly at `path`.
    fn find_by_path(&self, path: &ThingPath) -> ThingRepoResult<Option<Thing>>;
    /// Sets one editable field and its `modified_by` companion.
    fn update_field(
        &self,
        id: ThingId,
        field: ThingField,
        value: &str,
        modified_by: &str,
    ) -> ThingRepoResult<Thing>;
    /// Tombstones one thing; repeat calls are a no-op.
    fn soft_delete_thing(&self, id: ThingId) -> ThingRepoResult<()>;
    /// Lists live things at or below `path`.
    fn find_descendants(&self, path: &ThingPath) -> ThingRepoResult<Vec<Thing>>;
    /// Lists live things on the root-to-`path` chain, root first.
    fn find_ancestors(&self, path: &ThingPath) -> ThingRepoResult<Vec<Thing>>;
    /// Lists live things exactly one level below `path`.
    fn find_children(&self, path: &ThingPath) -> ThingRepoResult<Vec<Thing>>;
}

/// SQLite-backed thing repository.
pub struct SqliteThingRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteThingRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> ThingRepoResult<Self> {
        ensure_thing_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ThingRepository for SqliteThingRepository<'_> {
    fn create_thing(&self, request: &NewThing) -> ThingRepoResult<Thing> {
        let path = ThingPath::encode(request.path.iter().cloned())?;
        let storage_path = path.as_storage();
        let id = Uuid::new_v4();
        let now = now_epoch_ms();

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let occupied: i64 = tx.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM things
                WHERE path = ?1
                  AND deleted_at IS NULL
            );",
            [storage_path.as_str()],
            |row| row.get(0),
        )?;
        if occupied == 1 {
            return Err(ThingRepoError::DuplicatePath(path));
        }

        tx.execute(
            "INSERT INTO things (
                id,
                owner,
                name,
                color,
                code,
                path,
                depth,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8);",
            params![
                id.to_string(),
                request.owner.as_str(),
                request.name.as_deref().unwrap_or_default(),
                request.color.as_str(),
                request.code.as_deref().unwrap_or_default(),
                storage_path,
                path.depth() as i64,
                now,
            ],
        )?;
        let thing = load_live_thing(&tx, id)?;
        tx.commit()?;
        Ok(thing)
    }

    fn get_thing(&self, id: ThingId, include_deleted: bool) -> ThingRepoResult<Option<Thing>> {
        let mut stmt = self.conn.prepare(&format!(
            "{THING_SELECT_SQL}
             WHERE id = ?1
               AND (?2 = 1 OR deleted_at IS NULL);"
        ))?;
        let mut rows = stmt.query(params![id.to_string(), i64::from(include_deleted)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_thing_row(row)?));
        }
        Ok(None)
    }

    fn find_by_path(&self, path: &ThingPath) -> ThingRepoResult<Option<Thing>> {
        let mut stmt = self.conn.prepare(&format!(
            "{THING_SELECT_SQL}
             WHERE path = ?1
               AND deleted_at IS NULL;"
        ))?;
        let mut rows = stmt.query([path.as_storage()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_thing_row(row)?));
        }
        Ok(None)
    }

    fn update_field(
        &self,
        id: ThingId,
        field: ThingField,
        value: &str,
        modified_by: &str,
    ) -> ThingRepoResult<Thing> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            update_field_sql(field),
            params![id.to_string(), value, modified_by, now_epoch_ms()],
        )?;
        if changed == 0 {
            return Err(ThingRepoError::NotFound(id));
        }
        let thing = load_live_thing(&tx, id)?;
        tx.commit()?;
        Ok(thing)
    }

    fn soft_delete_thing(&self, id: ThingId) -> ThingRepoResult<()> {
        let now = now_epoch_ms();
        let changed = self.conn.execute(
            "UPDATE things
             SET deleted_at = ?2,
                 updated_at = ?2
             WHERE id = ?1
               AND deleted_at IS NULL;",
            params![id.to_string(), now],
        )?;
        if changed > 0 {
            return Ok(());
        }

        // Already tombstoned is fine; never stored is not.
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM things WHERE id = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        if exists == 1 {
            Ok(())
        } else {
            Err(ThingRepoError::NotFound(id))
        }
    }

    fn find_descendants(&self, path: &ThingPath) -> ThingRepoResult<Vec<Thing>> {
        let (lower, upper) = path.subtree_range();
        let mut stmt = self.conn.prepare(&format!(
            "{THING_SELECT_SQL}
             WHERE path >= ?1
               AND path < ?2
               AND deleted_at IS NULL
             ORDER BY path ASC, id ASC;"
        ))?;
        let mut rows = stmt.query(params![lower, upper])?;
        let mut things = Vec::new();
        while let Some(row) = rows.next()? {
            let thing = parse_thing_row(row)?;
            if thing.path.is_descendant_or_equal(path) {
                things.push(thing);
            }
        }
        Ok(things)
    }

    fn find_ancestors(&self, path: &ThingPath) -> ThingRepoResult<Vec<Thing>> {
        let prefixes = path
            .ancestors()
            .iter()
            .map(ThingPath::as_storage)
            .collect::<Vec<_>>();
        let placeholders = vec!["?"; prefixes.len()].join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "{THING_SELECT_SQL}
             WHERE path IN ({placeholders})
               AND deleted_at IS NULL
             ORDER BY depth ASC, id ASC;"
        ))?;
        let mut rows = stmt.query(params_from_iter(prefixes))?;
        let mut things = Vec::new();
        while let Some(row) = rows.next()? {
            let thing = parse_thing_row(row)?;
            if thing.path.is_ancestor_or_equal(path) {
                things.push(thing);
            }
        }
        Ok(things)
    }

    fn find_children(&self, path: &ThingPath) -> ThingRepoResult<Vec<Thing>> {
        let (lower, upper) = path.subtree_range();
        let mut stmt = self.conn.prepare(&format!(
            "{THING_SELECT_SQL}
             WHERE path >= ?1
               AND path < ?2
               AND depth = ?3
               AND deleted_at IS NULL
             ORDER BY path ASC, id ASC;"
        ))?;
        let mut rows = stmt.query(params![lower, upper, (path.depth() + 1) as i64])?;
        let mut things = Vec::new();
        while let Some(row) = rows.next()? {
            let thing = parse_thing_row(row)?;
            if thing.path.parent().as_ref() == Some(path) {
                things.push(thing);
            }
        }
        Ok(things)
    }
}

fn update_field_sql(field: ThingField) -> &'static str {
    match field {
        ThingField::Name => {
            "UPDATE things
             SET name = ?2,
                 name_modified_by = ?3,
                 updated_at = ?4
             WHERE id = ?1
               AND deleted_at IS NULL;"
        }
        ThingField::Color => {
            "UPDATE things
             SET color = ?2,
                 color_modified_by = ?3,
                 updated_at = ?4
             WHERE id = ?1
               AND deleted_at IS NULL;"
        }
        ThingField::Code => {
            "UPDATE things
             SET code = ?2,
                 code_modified_by = ?3,
                 updated_at = ?4
             WHERE id = ?1
               AND deleted_at IS NULL;"
        }
    }
}

fn load_live_thing(conn: &Connection, id: ThingId) -> ThingRepoResult<Thing> {
    let mut stmt = conn.prepare(&format!(
        "{THING_SELECT_SQL}
         WHERE id = ?1
           AND deleted_at IS NULL;"
    ))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return parse_thing_row(row);
    }
    Err(ThingRepoError::NotFound(id))
}

fn parse_thing_row(row: &Row<'_>) -> ThingRepoResult<Thing> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text)
        .map_err(|_| ThingRepoError::InvalidData(format!("invalid uuid `{id_text}` in things.id")))?;

    let path_text: String = row.get("path")?;
    let path = ThingPath::parse(&path_text).map_err(|err| {
        ThingRepoError::InvalidData(format!("invalid path `{path_text}` in things.path: {err}"))
    })?;

    let depth: i64 = row.get("depth")?;
    if depth != path.depth() as i64 {
        return Err(ThingRepoError::InvalidData(format!(
            "things.depth {depth} does not match path `{path_text}`"
        )));
    }

    Ok(Thing {
        id,
        owner: row.get("owner")?,
        name: TrackedField {
            value: row.get("name")?,
            modified_by: row.get("name_modified_by")?,
        },
        color: TrackedField {
            value: row.get("color")?,
            modified_by: row.get("color_modified_by")?,
        },
        code: TrackedField {
            value: row.get("code")?,
            modified_by: row.get("code_modified_by")?,
        },
        path,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        deleted_at: row.get("deleted_at")?,
    })
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

fn ensure_thing_connection_ready(conn: &Connection) -> ThingRepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(ThingRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "things")? {
        return Err(ThingRepoError::MissingRequiredTable("things"));
    }

    for column in THING_COLUMNS {
        if !table_has_column(conn, "things", column)? {
            return Err(ThingRepoError::MissingRequiredColumn {
                table: "things",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> ThingRepoResult<bool> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1
             FROM sqlite_master
             WHERE type = 'table' AND name = ?1;",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(exists.is_some())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> ThingRepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
