//! Soft deletes: documents are flagged as deleted instead of being removed.
//!
//! A repository opts in with [`Repository::with_soft_deletes`]. From then on
//! - every query hides documents whose flag column is `true`,
//! - deleting a loaded document sets the flag and the deletion timestamp,
//! - [`SoftDeletes::restore`] clears the flag again (the timestamp stays).

pub mod scope;

use std::sync::Arc;

use sea_orm::ConnectionTrait;
use sea_query::Value;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::{
    cast::{fresh_timestamp, from_date_time, Cast},
    document::Document,
    error::Result,
    events::{observer_fn, DocumentEvent, EventOutcome},
    query::{ColumnValues, DocumentQuery},
    repository::Repository,
};

pub use scope::{SoftDeletingScope, TrashedView};

#[derive(Debug, Default, Clone)]
pub struct SoftDeletes {}

impl SoftDeletes {
    pub fn new() -> Self {
        Self {}
    }

    /// Registers the global scope and the hook that clears the flag of new
    /// documents.
    pub fn boot(&self, repository: &mut Repository) {
        debug!(
            "Booting soft deletes for {}",
            repository.descriptor().table()
        );
        repository.add_global_scope(Arc::new(SoftDeletingScope::new()));
        repository.observe(
            DocumentEvent::Creating,
            observer_fn(|_, document| {
                let column = document.descriptor().deleted_flag_column().to_string();
                document.set(column, false);
                EventOutcome::Proceed
            }),
        );
    }

    /// Declares the casts of the soft delete columns unless the document
    /// already has one for the deletion timestamp.
    pub fn initialize(&self, document: &mut Document) {
        let descriptor = document.shared_descriptor();
        if !document.casts().contains(descriptor.deleted_at_column()) {
            let casts = document.casts_mut();
            casts.insert(descriptor.deleted_at_column(), Cast::DateTime);
            casts.insert(descriptor.deleted_flag_column(), Cast::Boolean);
        }
    }

    pub fn trashed(&self, document: &Document) -> bool {
        document.get(document.descriptor().deleted_flag_column()) == Some(&JsonValue::Bool(true))
    }

    /// Clears the deletion flag and saves the document.
    ///
    /// Returns `Ok(false)` without touching the document when a `Restoring`
    /// observer cancels, otherwise the result of the save.
    pub async fn restore(&self, repository: &Repository, document: &mut Document) -> Result<bool> {
        if repository
            .events()
            .fire(DocumentEvent::Restoring, document, true)
            .await
            == EventOutcome::Cancel
        {
            info!("Restoring a document of {} was cancelled", repository.descriptor().table());
            return Ok(false);
        }

        let column = document.descriptor().deleted_flag_column().to_string();
        document.set(column, false);
        document.set_exists(true);

        let saved = repository.save(document).await?;

        repository
            .events()
            .fire(DocumentEvent::Restored, document, false)
            .await;

        Ok(saved)
    }

    /// Flags a loaded document as deleted with a direct update of its row.
    /// No save events are fired.
    pub async fn run_soft_delete<C>(&self, db: &C, document: &mut Document) -> Result<()>
    where
        C: ConnectionTrait,
    {
        let descriptor = document.shared_descriptor();
        let mut query = DocumentQuery::new(document.new_instance());
        for (column, value) in document.key_values()? {
            let value = document.casts().to_db_value(&column, &value);
            query = query.where_eq(&column, value);
        }

        let now = fresh_timestamp();
        let stamp = from_date_time(&now);

        let mut columns: ColumnValues = vec![
            (descriptor.deleted_at_column().to_string(), Value::from(now)),
            (descriptor.deleted_flag_column().to_string(), Value::from(true)),
        ];

        document.set(descriptor.deleted_at_column(), stamp.clone());
        document.set(descriptor.deleted_flag_column(), true);

        if descriptor.uses_timestamps() {
            if let Some(updated_at) = descriptor.updated_at_column() {
                document.set(updated_at, stamp);
                columns.push((updated_at.to_string(), Value::from(now)));
            }
        }

        let names: Vec<String> = columns.iter().map(|(c, _)| c.clone()).collect();
        let affected = query.update(db, columns).await?;
        debug!(
            "Set delete flag on {} row(s) of {}",
            affected,
            descriptor.table()
        );

        document.sync_original_attributes(names);
        Ok(())
    }
}
