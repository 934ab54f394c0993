use std::sync::Arc;

use sea_orm::ConnectionTrait;
use sea_query::{Expr, Value};
use tracing::debug;

use crate::{
    cast::fresh_timestamp,
    error::Result,
    query::{column_ref, ColumnValues, DocumentQuery, MacroAction, MacroOutcome},
    scope::Scope,
};

pub static SCOPE_NAME: &str = "soft_deleting";

pub static RESTORE: &str = "restore";
pub static WITH_TRASHED: &str = "with_trashed";
pub static WITHOUT_TRASHED: &str = "without_trashed";
pub static ONLY_TRASHED: &str = "only_trashed";

/// Which documents a query of a soft deleting collection returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrashedView {
    /// The global scope is still in place.
    DefaultScoped,
    WithoutTrashed,
    OnlyTrashed,
    WithTrashed,
}

/// Hides trashed documents from every query of a collection.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftDeletingScope;

impl SoftDeletingScope {
    pub fn new() -> Self {
        Self
    }

    /// Flag column as it has to be written in the context of `query`.
    pub fn deleted_flag_column(query: &DocumentQuery) -> String {
        let descriptor = query.descriptor();
        if query.has_joins() {
            descriptor.qualified_deleted_flag_column().to_string()
        } else {
            descriptor.deleted_flag_column().to_string()
        }
    }

    /// Deletion timestamp column as it has to be written in the context of
    /// `query`.
    pub fn deleted_at_column(query: &DocumentQuery) -> String {
        let descriptor = query.descriptor();
        if query.has_joins() {
            descriptor.qualified_deleted_at_column()
        } else {
            descriptor.deleted_at_column().to_string()
        }
    }

    pub fn view(query: &DocumentQuery) -> TrashedView {
        if query.has_global_scope(SCOPE_NAME) {
            return TrashedView::DefaultScoped;
        }
        query
            .macro_journal()
            .iter()
            .rev()
            .find_map(|name| match name.as_str() {
                n if n == WITH_TRASHED => Some(TrashedView::WithTrashed),
                n if n == WITHOUT_TRASHED => Some(TrashedView::WithoutTrashed),
                n if n == ONLY_TRASHED => Some(TrashedView::OnlyTrashed),
                _ => None,
            })
            .unwrap_or(TrashedView::WithTrashed)
    }

    fn add_restore(&self, query: &mut DocumentQuery) {
        query.register_macro(
            RESTORE,
            Arc::new(|q: &mut DocumentQuery| -> Result<MacroAction> {
                q.apply_macro(WITH_TRASHED)?;
                let column = q.descriptor().deleted_flag_column().to_string();
                Ok(MacroAction::Update(vec![(column, Value::from(false))]))
            }),
        );
    }

    fn add_with_trashed(&self, query: &mut DocumentQuery) {
        query.register_macro(
            WITH_TRASHED,
            Arc::new(|q: &mut DocumentQuery| -> Result<MacroAction> {
                q.without_global_scope(SCOPE_NAME);
                Ok(MacroAction::Chain)
            }),
        );
    }

    fn add_without_trashed(&self, query: &mut DocumentQuery) {
        query.register_macro(
            WITHOUT_TRASHED,
            Arc::new(|q: &mut DocumentQuery| -> Result<MacroAction> {
                let column = q.descriptor().qualified_deleted_flag_column().to_string();
                q.without_global_scope(SCOPE_NAME)
                    .push_where(Expr::col(column_ref(&column)).eq(false));
                Ok(MacroAction::Chain)
            }),
        );
    }

    fn add_only_trashed(&self, query: &mut DocumentQuery) {
        query.register_macro(
            ONLY_TRASHED,
            Arc::new(|q: &mut DocumentQuery| -> Result<MacroAction> {
                let column = q.descriptor().qualified_deleted_flag_column().to_string();
                q.without_global_scope(SCOPE_NAME)
                    .push_where(Expr::col(column_ref(&column)).eq(true));
                Ok(MacroAction::Chain)
            }),
        );
    }
}

impl Scope for SoftDeletingScope {
    fn name(&self) -> &str {
        SCOPE_NAME
    }

    fn apply(&self, query: &mut DocumentQuery) {
        let column = query.descriptor().qualified_deleted_flag_column().to_string();
        query.push_where(Expr::col(column_ref(&column)).eq(false));
    }

    fn extend(&self, query: &mut DocumentQuery) {
        self.add_restore(query);
        self.add_with_trashed(query);
        self.add_without_trashed(query);
        self.add_only_trashed(query);

        query.on_delete(Arc::new(|q: &DocumentQuery| -> ColumnValues {
            vec![
                (
                    SoftDeletingScope::deleted_at_column(q),
                    Value::from(fresh_timestamp()),
                ),
                (SoftDeletingScope::deleted_flag_column(q), Value::from(true)),
            ]
        }));
    }
}

impl DocumentQuery {
    /// Drops the trashed filter. `with_trashed(false)` asks for the
    /// documents that are not trashed instead.
    pub fn with_trashed(mut self, with_trashed: bool) -> Result<Self> {
        if !with_trashed {
            return self.without_trashed();
        }
        self.apply_macro(WITH_TRASHED)?;
        Ok(self)
    }

    pub fn without_trashed(mut self) -> Result<Self> {
        self.apply_macro(WITHOUT_TRASHED)?;
        Ok(self)
    }

    pub fn only_trashed(mut self) -> Result<Self> {
        self.apply_macro(ONLY_TRASHED)?;
        Ok(self)
    }

    /// Clears the deletion flag of every matching document, trashed or not.
    /// Returns the number of affected rows.
    pub async fn restore<C>(&mut self, db: &C) -> Result<u64>
    where
        C: ConnectionTrait,
    {
        let affected = match self.call_macro(db, RESTORE).await? {
            MacroOutcome::Affected(affected) => affected,
            MacroOutcome::Chained => 0,
        };
        debug!(
            "Restored {} document(s) of {}",
            affected,
            self.descriptor().table()
        );
        Ok(affected)
    }

    pub fn trashed_view(&self) -> TrashedView {
        SoftDeletingScope::view(self)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use sea_query::PostgresQueryBuilder;

    use crate::{
        descriptor::CollectionDescriptor, document::Document, error::TombstoneError,
        query::unqualified,
    };

    use super::*;

    fn query_for(descriptor: CollectionDescriptor) -> DocumentQuery {
        let scope: Arc<dyn Scope> = Arc::new(SoftDeletingScope::new());
        let mut q = DocumentQuery::new(Document::new(Arc::new(descriptor)));
        q.with_global_scope(scope.clone());
        scope.extend(&mut q);
        q
    }

    fn query() -> DocumentQuery {
        query_for(CollectionDescriptor::builder().table("documents").build())
    }

    fn sql(q: &DocumentQuery) -> String {
        q.to_select_statement().to_string(PostgresQueryBuilder)
    }

    #[test]
    fn default_scope_hides_trashed() {
        let q = query();

        assert_eq!(
            sql(&q),
            r#"SELECT "documents".* FROM "documents" WHERE "deleted_flag" = FALSE"#
        );
        assert_eq!(q.trashed_view(), TrashedView::DefaultScoped);
    }

    #[test]
    fn with_trashed_drops_the_filter() {
        let q = query().with_trashed(true).unwrap();

        assert_eq!(sql(&q), r#"SELECT "documents".* FROM "documents""#);
        assert_eq!(q.trashed_view(), TrashedView::WithTrashed);
    }

    #[test]
    fn with_trashed_false_excludes_trashed() {
        let q = query().with_trashed(false).unwrap();

        assert_eq!(
            sql(&q),
            r#"SELECT "documents".* FROM "documents" WHERE "deleted_flag" = FALSE"#
        );
        assert!(!q.has_global_scope(SCOPE_NAME));
        assert_eq!(q.trashed_view(), TrashedView::WithoutTrashed);
    }

    #[test]
    fn without_trashed_matches_the_default_scope() {
        // Arrange
        let default_sql = sql(&query());

        // Act
        let q = query().without_trashed().unwrap();

        // Assert
        assert_eq!(sql(&q), default_sql);
        assert!(!q.has_global_scope(SCOPE_NAME));
        assert_eq!(q.trashed_view(), TrashedView::WithoutTrashed);
    }

    #[test]
    fn only_trashed_inverts_the_filter() {
        let q = query().only_trashed().unwrap();

        assert_eq!(
            sql(&q),
            r#"SELECT "documents".* FROM "documents" WHERE "deleted_flag" = TRUE"#
        );
        assert_eq!(q.trashed_view(), TrashedView::OnlyTrashed);
    }

    #[test]
    fn later_extension_calls_win() {
        let q = query()
            .only_trashed()
            .unwrap()
            .with_trashed(true)
            .unwrap();

        assert_eq!(
            sql(&q),
            r#"SELECT "documents".* FROM "documents" WHERE "deleted_flag" = TRUE"#
        );
        assert_eq!(q.trashed_view(), TrashedView::WithTrashed);
    }

    #[test]
    fn restore_macro_includes_trashed_and_clears_the_flag() {
        // Arrange
        let mut q = query().where_eq("title", "a");

        // Act
        let action = q.apply_macro(RESTORE).unwrap();

        // Assert
        assert_eq!(
            action,
            MacroAction::Update(vec![("deleted_flag".to_string(), Value::from(false))])
        );
        assert_eq!(
            sql(&q),
            r#"SELECT "documents".* FROM "documents" WHERE "title" = 'a'"#
        );
        assert_eq!(q.trashed_view(), TrashedView::WithTrashed);
    }

    #[test]
    fn custom_flag_column() {
        let q = query_for(
            CollectionDescriptor::builder()
                .table("notes")
                .deleted_at_column("removed_at")
                .deleted_flag_column("is_trashed")
                .build(),
        );

        assert_eq!(
            sql(&q),
            r#"SELECT "notes".* FROM "notes" WHERE "is_trashed" = FALSE"#
        );
        assert_eq!(SoftDeletingScope::deleted_at_column(&q), "removed_at");
    }

    #[test]
    fn joined_queries_qualify_the_timestamp_column() {
        // Arrange
        let q = query().join("notes", "notes.document_id", "documents.id");

        // Act
        let deleted_at = SoftDeletingScope::deleted_at_column(&q);
        let deleted_flag = SoftDeletingScope::deleted_flag_column(&q);

        // Assert
        assert_eq!(deleted_at, "documents.deleted_at");
        assert_eq!(deleted_flag, "deleted_flag");
        assert_eq!(
            sql(&q),
            r#"SELECT "documents".* FROM "documents" INNER JOIN "notes" ON "notes"."document_id" = "documents"."id" WHERE "deleted_flag" = FALSE"#
        );
    }

    #[test]
    fn delete_override_marks_with_the_plain_timestamp_column() {
        // Arrange
        let q = query().where_eq("id", "k1");

        // Act
        let columns = q.delete_override_columns().expect("override installed");

        // Assert
        let names: Vec<&str> = columns.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(names, vec!["deleted_at", "deleted_flag"]);
        assert!(matches!(columns[0].1, Value::ChronoDateTime(Some(_))));
        assert_eq!(columns[1].1, Value::from(true));

        let update = q.to_update_statement(&columns).to_string(PostgresQueryBuilder);
        assert!(update.starts_with(r#"UPDATE "documents" SET "deleted_at" = '"#));
        assert!(update.ends_with(
            r#""deleted_flag" = TRUE WHERE "id" = 'k1' AND "deleted_flag" = FALSE"#
        ));
    }

    #[test]
    fn delete_override_qualifies_the_timestamp_in_joins() {
        // Arrange
        let q = query().join("notes", "notes.document_id", "documents.id");

        // Act
        let columns = q.delete_override_columns().expect("override installed");

        // Assert
        let names: Vec<&str> = columns.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(names, vec!["documents.deleted_at", "deleted_flag"]);
        assert_eq!(columns[1].1, Value::from(true));
    }

    #[test]
    fn joined_delete_writes_unqualified_targets() {
        let q = query().join("notes", "notes.document_id", "documents.id");

        let column = SoftDeletingScope::deleted_at_column(&q);

        assert_eq!(unqualified(&column), "deleted_at");
    }

    #[test]
    fn extensions_need_the_scope() {
        let q = DocumentQuery::new(Document::new(Arc::new(
            CollectionDescriptor::builder().table("plain").build(),
        )));

        assert!(matches!(
            q.only_trashed(),
            Err(TombstoneError::UnknownMacro(n)) if n == ONLY_TRASHED
        ));
    }
}
