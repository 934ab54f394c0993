use sea_orm::DbErr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TombstoneError {
    /// Storage failures are handed through unchanged.
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Cannot build statement: {0}")]
    QueryBuild(#[from] sea_query::error::Error),
    #[error("Missing value for primary key column {0}")]
    MissingPrimaryKey(String),
    #[error("Collection {table} cannot be looked up by a single key, its key is ({columns})")]
    UnsupportedKey { table: String, columns: String },
    #[error("Unknown query macro: {0}")]
    UnknownMacro(String),
    #[error("Collection {0} does not use soft deletes")]
    SoftDeletesDisabled(String),
}

pub type Result<T, E = TombstoneError> = std::result::Result<T, E>;
