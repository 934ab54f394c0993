use sea_orm_migration::prelude::*;

use crate::{soft_delete_columns, Document};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut table = Table::create();
        table
            .table(Note::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(Note::Id)
                    .string_len(36)
                    .not_null()
                    .primary_key(),
            )
            .col(ColumnDef::new(Note::DocumentId).string_len(36).not_null())
            .col(ColumnDef::new(Note::Body).text().not_null())
            .foreign_key(
                ForeignKey::create()
                    .name("fk-notes-document_id")
                    .from(Note::Table, Note::DocumentId)
                    .to(Document::Table, Document::Id),
            );
        // notes keep their own names for the soft delete columns
        soft_delete_columns(&mut table, Note::RemovedAt, Note::IsTrashed);
        manager.create_table(table.to_owned()).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Note::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Note {
    #[iden = "notes"]
    Table,
    Id,
    DocumentId,
    Body,
    RemovedAt,
    IsTrashed,
}
