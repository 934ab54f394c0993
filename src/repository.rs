use std::{fmt::Debug, sync::Arc};

use sea_orm::{ConnectionTrait, DatabaseConnection};
use sea_query::{Alias, Query, SimpleExpr};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    cast::{fresh_timestamp_string, Cast},
    descriptor::CollectionDescriptor,
    document::Document,
    error::{Result, TombstoneError},
    events::{Dispatcher, DocumentEvent, DocumentObserver, EventOutcome},
    query::{ColumnValues, DocumentQuery},
    scope::Scope,
    soft_delete::SoftDeletes,
};

/// Loads, saves and deletes the documents of one collection.
pub struct Repository {
    db: DatabaseConnection,
    descriptor: Arc<CollectionDescriptor>,
    scopes: Vec<Arc<dyn Scope>>,
    events: Dispatcher,
    soft_deletes: Option<Arc<SoftDeletes>>,
}

impl Repository {
    pub fn new(db: &DatabaseConnection, descriptor: CollectionDescriptor) -> Self {
        Self {
            db: db.clone(),
            descriptor: Arc::new(descriptor),
            scopes: vec![],
            events: Dispatcher::new(),
            soft_deletes: None,
        }
    }

    /// Enables soft deletes for the collection.
    pub fn with_soft_deletes(mut self, soft_deletes: SoftDeletes) -> Self {
        if self.soft_deletes.is_some() {
            warn!(
                "Soft deletes already enabled for {}",
                self.descriptor.table()
            );
            return self;
        }
        soft_deletes.boot(&mut self);
        self.soft_deletes = Some(Arc::new(soft_deletes));
        self
    }

    pub fn add_global_scope(&mut self, scope: Arc<dyn Scope>) {
        self.scopes.retain(|s| s.name() != scope.name());
        self.scopes.push(scope);
    }

    pub fn observe(
        &mut self,
        event: DocumentEvent,
        observer: Arc<dyn DocumentObserver + Send + Sync>,
    ) {
        self.events.listen(event, observer);
    }

    pub fn events(&self) -> &Dispatcher {
        &self.events
    }

    pub fn descriptor(&self) -> &CollectionDescriptor {
        &self.descriptor
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn soft_deletes(&self) -> Option<&SoftDeletes> {
        self.soft_deletes.as_deref()
    }

    pub fn uses_soft_deletes(&self) -> bool {
        self.soft_deletes.is_some()
    }

    /// A blank document of the collection with all casts declared.
    pub fn new_document(&self) -> Document {
        let mut document = Document::new(self.descriptor.clone());
        if self.descriptor.uses_timestamps() {
            let columns = [
                self.descriptor.created_at_column(),
                self.descriptor.updated_at_column(),
            ];
            for column in columns.into_iter().flatten() {
                if !document.casts().contains(column) {
                    document.casts_mut().insert(column, Cast::DateTime);
                }
            }
        }
        if let Some(soft_deletes) = &self.soft_deletes {
            soft_deletes.initialize(&mut document);
        }
        document
    }

    pub fn make(&self, attributes: Map<String, JsonValue>) -> Document {
        let mut document = self.new_document();
        document.fill(attributes);
        document
    }

    /// A query with the repository's global scopes and their extensions.
    pub fn query(&self) -> DocumentQuery {
        let mut query = DocumentQuery::new(self.new_document());
        for scope in &self.scopes {
            query.with_global_scope(scope.clone());
            scope.extend(&mut query);
        }
        query
    }

    pub async fn find(&self, id: &str) -> Result<Option<Document>> {
        let column = match self.descriptor.primary_key() {
            [column] => column.clone(),
            keys => {
                return Err(TombstoneError::UnsupportedKey {
                    table: self.descriptor.table().to_string(),
                    columns: keys.join(", "),
                })
            }
        };
        self.query().where_eq(&column, id).first(&self.db).await
    }

    pub async fn create(&self, attributes: Map<String, JsonValue>) -> Result<Document> {
        let mut document = self.make(attributes);
        self.save(&mut document).await?;
        Ok(document)
    }

    /// Inserts or updates the document. Returns `Ok(false)` when an observer
    /// cancelled the save.
    pub async fn save(&self, document: &mut Document) -> Result<bool> {
        if self
            .events
            .fire(DocumentEvent::Saving, document, true)
            .await
            == EventOutcome::Cancel
        {
            return Ok(false);
        }

        let saved = if document.exists() {
            self.perform_update(document).await?
        } else {
            self.perform_insert(document).await?
        };

        if saved {
            self.events
                .fire(DocumentEvent::Saved, document, false)
                .await;
            document.sync_original();
        }
        Ok(saved)
    }

    /// Deletes the document, or marks it as deleted when soft deletes are
    /// enabled. Documents that were never stored are left alone.
    pub async fn delete(&self, document: &mut Document) -> Result<bool> {
        if !document.exists() {
            return Ok(false);
        }
        let keys = document.key_values()?;

        if self
            .events
            .fire(DocumentEvent::Deleting, document, true)
            .await
            == EventOutcome::Cancel
        {
            debug!("Delete on {} cancelled", self.descriptor.table());
            return Ok(false);
        }

        match &self.soft_deletes {
            Some(soft_deletes) => soft_deletes.run_soft_delete(&self.db, document).await?,
            None => {
                let mut query = DocumentQuery::new(document.new_instance());
                for (column, value) in keys {
                    let value = document.casts().to_db_value(&column, &value);
                    query = query.where_eq(&column, value);
                }
                query.delete(&self.db).await?;
                document.set_exists(false);
            }
        }

        self.events
            .fire(DocumentEvent::Deleted, document, false)
            .await;
        Ok(true)
    }

    pub fn trashed(&self, document: &Document) -> bool {
        self.soft_deletes
            .as_ref()
            .is_some_and(|soft_deletes| soft_deletes.trashed(document))
    }

    pub async fn restore(&self, document: &mut Document) -> Result<bool> {
        let soft_deletes = self
            .soft_deletes
            .clone()
            .ok_or_else(|| TombstoneError::SoftDeletesDisabled(self.descriptor.table().into()))?;
        soft_deletes.restore(self, document).await
    }

    async fn perform_insert(&self, document: &mut Document) -> Result<bool> {
        if self
            .events
            .fire(DocumentEvent::Creating, document, true)
            .await
            == EventOutcome::Cancel
        {
            return Ok(false);
        }

        if let [key] = self.descriptor.primary_key() {
            let missing = document.get(key).map_or(true, JsonValue::is_null);
            if missing && self.descriptor.generate_keys() {
                document.set(key.clone(), Uuid::new_v4().to_string());
            }
        }

        if self.descriptor.uses_timestamps() {
            let now = fresh_timestamp_string();
            let columns = [
                self.descriptor.created_at_column(),
                self.descriptor.updated_at_column(),
            ];
            for column in columns.into_iter().flatten() {
                if !document.is_dirty_attribute(column) {
                    document.set(column, now.clone());
                }
            }
        }

        let columns: Vec<String> = document.attributes().keys().cloned().collect();
        let values: Vec<SimpleExpr> = columns
            .iter()
            .map(|column| document.db_value(column).into())
            .collect();
        let mut stmt = Query::insert();
        stmt.into_table(Alias::new(self.descriptor.table()))
            .columns(columns.iter().map(|c| Alias::new(c.as_str())))
            .values(values)?;

        let stmt = self.db.get_database_backend().build(&stmt);
        debug!("Insert document: {}", stmt.sql);
        self.db.execute(stmt).await?;

        document.set_exists(true);
        self.events
            .fire(DocumentEvent::Created, document, false)
            .await;
        Ok(true)
    }

    async fn perform_update(&self, document: &mut Document) -> Result<bool> {
        if !document.is_dirty() {
            return Ok(true);
        }

        if self
            .events
            .fire(DocumentEvent::Updating, document, true)
            .await
            == EventOutcome::Cancel
        {
            return Ok(false);
        }

        if self.descriptor.uses_timestamps() {
            if let Some(updated_at) = self.descriptor.updated_at_column() {
                if !document.is_dirty_attribute(updated_at) {
                    document.set(updated_at, fresh_timestamp_string());
                }
            }
        }

        let mut query = DocumentQuery::new(document.new_instance());
        for (column, value) in document.key_values()? {
            let original = document.original(&column).cloned().unwrap_or(value);
            let value = document.casts().to_db_value(&column, &original);
            query = query.where_eq(&column, value);
        }
        let columns: ColumnValues = document
            .dirty()
            .keys()
            .map(|column| (column.clone(), document.db_value(column)))
            .collect();

        let affected = query.update(&self.db, columns).await?;
        debug!(
            "Updated {} row(s) of {}",
            affected,
            self.descriptor.table()
        );

        self.events
            .fire(DocumentEvent::Updated, document, false)
            .await;
        Ok(true)
    }
}

impl Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("descriptor", &self.descriptor)
            .field(
                "scopes",
                &self.scopes.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("events", &self.events)
            .field("soft_deletes", &self.soft_deletes.is_some())
            .finish()
    }
}
