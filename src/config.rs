use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::descriptor::CollectionDescriptor;

pub static DATABASE_URL: &str = "TOMBSTONE_DATABASE_URL";
pub static MAX_CONNECTIONS: &str = "TOMBSTONE_MAX_CONNECTIONS";
pub static DELETED_FLAG_COLUMNS: &str = "TOMBSTONE_DELETED_FLAG_COLUMNS";

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    /// Collection name to deletion flag column.
    pub deleted_flag_columns: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 10,
            deleted_flag_columns: HashMap::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var(DATABASE_URL) {
            let url = url.trim();
            if !url.is_empty() {
                config.database_url = url.to_string();
            }
        }

        if let Ok(v) = std::env::var(MAX_CONNECTIONS) {
            config.max_connections = v
                .trim()
                .parse()
                .map_err(|e| anyhow!("Invalid value for {MAX_CONNECTIONS}: {e}"))?;
        }

        if let Ok(v) = std::env::var(DELETED_FLAG_COLUMNS) {
            config.deleted_flag_columns = Self::parse_flag_overrides(&v)?;
        }

        Ok(config)
    }

    /// Parses `(collection,column),(collection,column)`.
    pub fn parse_flag_overrides(value: &str) -> Result<HashMap<String, String>> {
        let mut overrides = HashMap::new();
        let value = value.trim();
        if value.is_empty() {
            return Ok(overrides);
        }

        let entries: Vec<&str> = value
            .strip_prefix('(')
            .ok_or_else(|| anyhow!("{DELETED_FLAG_COLUMNS} must start with an opening parenthesis."))?
            .strip_suffix(')')
            .ok_or_else(|| anyhow!("{DELETED_FLAG_COLUMNS} must end with a closing parenthesis."))?
            .split("),(")
            .collect();

        for entry in entries {
            debug!("Processing {entry}");
            let p: Vec<&str> = entry.split(',').map(str::trim).collect();
            if p.len() != 2 {
                bail!("Invalid value {entry} inside {DELETED_FLAG_COLUMNS}");
            }
            for name in &p {
                if !IDENTIFIER.is_match(name) {
                    bail!("Invalid identifier {name} inside {DELETED_FLAG_COLUMNS}");
                }
            }
            overrides.insert(p[0].to_string(), p[1].to_string());
        }

        Ok(overrides)
    }

    /// Applies the configured flag column of the descriptor's collection.
    pub fn descriptor(&self, descriptor: CollectionDescriptor) -> CollectionDescriptor {
        match self.deleted_flag_columns.get(descriptor.table()) {
            Some(column) => {
                debug!("Using {column} as delete flag of {}", descriptor.table());
                descriptor.with_deleted_flag_column(column.clone())
            }
            None => descriptor,
        }
    }
}
