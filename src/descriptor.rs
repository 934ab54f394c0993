use typed_builder::TypedBuilder;

use crate::cast::CastTable;

pub static DEFAULT_DELETED_AT: &str = "deleted_at";
pub static DEFAULT_DELETED_FLAG: &str = "deleted_flag";
pub static DEFAULT_CREATED_AT: &str = "created_at";
pub static DEFAULT_UPDATED_AT: &str = "updated_at";

/// Describes how documents of one collection are stored.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct CollectionDescriptor {
    #[builder(setter(into))]
    table: String,
    #[builder(default = vec!["id".to_string()])]
    primary_key: Vec<String>,
    /// Generate a UUID v4 for a missing single primary key on insert.
    #[builder(default = true)]
    generate_keys: bool,
    #[builder(default = DEFAULT_DELETED_AT.to_string(), setter(into))]
    deleted_at_column: String,
    #[builder(default = DEFAULT_DELETED_FLAG.to_string(), setter(into))]
    deleted_flag_column: String,
    #[builder(default = true)]
    timestamps: bool,
    #[builder(default = Some(DEFAULT_CREATED_AT.to_string()))]
    created_at_column: Option<String>,
    #[builder(default = Some(DEFAULT_UPDATED_AT.to_string()))]
    updated_at_column: Option<String>,
    #[builder(default)]
    casts: CastTable,
}

impl CollectionDescriptor {
    pub fn table(&self) -> &str {
        self.table.as_ref()
    }

    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn generate_keys(&self) -> bool {
        self.generate_keys
    }

    pub fn deleted_at_column(&self) -> &str {
        self.deleted_at_column.as_ref()
    }

    pub fn qualified_deleted_at_column(&self) -> String {
        self.qualify_column(&self.deleted_at_column)
    }

    pub fn deleted_flag_column(&self) -> &str {
        self.deleted_flag_column.as_ref()
    }

    /// The flag column is never prefixed with the table name.
    pub fn qualified_deleted_flag_column(&self) -> &str {
        self.deleted_flag_column()
    }

    pub fn uses_timestamps(&self) -> bool {
        self.timestamps
    }

    pub fn created_at_column(&self) -> Option<&str> {
        self.created_at_column.as_deref()
    }

    pub fn updated_at_column(&self) -> Option<&str> {
        self.updated_at_column.as_deref()
    }

    pub fn casts(&self) -> &CastTable {
        &self.casts
    }

    pub fn qualify_column(&self, column: &str) -> String {
        if column.contains('.') {
            return column.to_string();
        }
        format!("{}.{}", self.table, column)
    }

    pub fn with_deleted_flag_column(mut self, column: impl Into<String>) -> Self {
        self.deleted_flag_column = column.into();
        self
    }
}
