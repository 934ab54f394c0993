use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde_json::{Map, Value as JsonValue};

use crate::descriptor::CollectionDescriptor;

/// A migrated in-memory database. One connection, so every statement sees
/// the same database.
pub(crate) async fn database() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

pub(crate) fn documents() -> CollectionDescriptor {
    CollectionDescriptor::builder().table("documents").build()
}

pub(crate) fn notes() -> CollectionDescriptor {
    CollectionDescriptor::builder()
        .table("notes")
        .deleted_at_column("removed_at")
        .deleted_flag_column("is_trashed")
        .timestamps(false)
        .build()
}

pub(crate) fn make(value: JsonValue) -> Map<String, JsonValue> {
    match value {
        JsonValue::Object(map) => map,
        other => panic!("Expected an object, got {other}"),
    }
}
