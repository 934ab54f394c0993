pub use sea_orm_migration::prelude::*;

mod m20240101_000001_documents;
mod m20240215_000002_notes;

pub struct Migrator;
pub use m20240101_000001_documents::Document;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_documents::Migration),
            Box::new(m20240215_000002_notes::Migration),
        ]
    }
}

/// Adds the nullable deletion timestamp and the boolean deletion flag
/// (defaulting to `false`) to a table definition.
pub fn soft_delete_columns<T, F>(
    table: &mut TableCreateStatement,
    deleted_at: T,
    deleted_flag: F,
) -> &mut TableCreateStatement
where
    T: IntoIden,
    F: IntoIden,
{
    table
        .col(ColumnDef::new(deleted_at).timestamp().null())
        .col(
            ColumnDef::new(deleted_flag)
                .boolean()
                .not_null()
                .default(false),
        )
}
