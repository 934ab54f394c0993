use sea_orm_migration::prelude::*;

use crate::soft_delete_columns;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut table = Table::create();
        table
            .table(Document::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(Document::Id)
                    .string_len(36)
                    .not_null()
                    .primary_key(),
            )
            .col(ColumnDef::new(Document::Title).string_len(150).not_null())
            .col(ColumnDef::new(Document::Body).text().null())
            .col(ColumnDef::new(Document::CreatedAt).timestamp().null())
            .col(ColumnDef::new(Document::UpdatedAt).timestamp().null());
        soft_delete_columns(&mut table, Document::DeletedAt, Document::DeletedFlag);
        manager.create_table(table.to_owned()).await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx-documents-deleted_flag")
                    .table(Document::Table)
                    .col(Document::DeletedFlag)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx-documents-deleted_flag")
                    .table(Document::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Document::Table).to_owned())
            .await?;
        Ok(())
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
pub enum Document {
    #[iden = "documents"]
    Table,
    Id,
    Title,
    Body,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
    DeletedFlag,
}
