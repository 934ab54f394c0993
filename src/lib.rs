use anyhow::{Context, Result};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tracing::debug;

pub mod cast;
pub mod config;
pub mod descriptor;
pub mod document;
pub mod error;
pub mod events;
pub mod query;
pub mod repository;
pub mod scope;
pub mod soft_delete;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use descriptor::CollectionDescriptor;
pub use document::Document;
pub use error::TombstoneError;
pub use events::{DocumentEvent, DocumentObserver, EventOutcome};
pub use query::DocumentQuery;
pub use repository::Repository;
pub use scope::Scope;
pub use soft_delete::{SoftDeletes, SoftDeletingScope, TrashedView};

pub async fn connect(config: &Config) -> Result<DatabaseConnection> {
    debug!("Connecting to database");
    Database::connect(
        ConnectOptions::from(config.database_url.as_str())
            .max_connections(config.max_connections)
            .to_owned(),
    )
    .await
    .context("could not connect to database_url")
}

pub async fn migrate(db: &DatabaseConnection) -> Result<(), anyhow::Error> {
    Migrator::up(db, None)
        .await
        .context("Database migration failed")
}
