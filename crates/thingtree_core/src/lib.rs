//! Core hierarchy store for thingtree.
//! Things are tagged with a materialized path so subtree and lineage queries
//! never need recursive traversal.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, StoreConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::path::{PathError, ThingPath, MAX_DEPTH, MAX_LABEL_LEN};
pub use model::thing::{NewThing, Thing, ThingField, ThingId, TrackedField, UnknownFieldError};
pub use repo::thing_repo::{
    SqliteThingRepository, ThingRepoError, ThingRepoResult, ThingRepository,
};
pub use service::thing_service::{ThingService, ThingServiceError, ThingServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
