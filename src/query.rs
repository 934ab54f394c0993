use std::{collections::HashMap, fmt::Debug, sync::Arc};

use sea_orm::{ConnectionTrait, FromQueryResult, JsonValue};
use sea_query::{
    Alias, Asterisk, ColumnRef, DeleteStatement, Expr, Func, IntoColumnRef, Order, Query,
    SelectStatement, SimpleExpr, UpdateStatement, Value,
};
use tracing::debug;

use crate::{
    cast::fresh_timestamp,
    descriptor::CollectionDescriptor,
    document::Document,
    error::{Result, TombstoneError},
    scope::Scope,
};

/// Column name and bound value pairs of an update.
pub type ColumnValues = Vec<(String, Value)>;

/// A named extension callable on a query.
pub type QueryMacro = Arc<dyn Fn(&mut DocumentQuery) -> Result<MacroAction> + Send + Sync>;

/// Replaces the physical delete of a query with an update of the returned
/// columns.
pub type DeleteOverride = Arc<dyn Fn(&DocumentQuery) -> ColumnValues + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum MacroAction {
    /// The macro only changed the query.
    Chain,
    /// The macro wants the matching rows updated.
    Update(ColumnValues),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroOutcome {
    Chained,
    Affected(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    table: String,
    left: String,
    right: String,
}

/// Query builder for the documents of one collection.
///
/// Global scopes are kept by name and only applied when a statement is
/// built, so they can still be removed after the query was created.
#[derive(Clone)]
pub struct DocumentQuery {
    model: Document,
    wheres: Vec<SimpleExpr>,
    joins: Vec<Join>,
    orders: Vec<(String, Order)>,
    limit: Option<u64>,
    offset: Option<u64>,
    scopes: Vec<(String, Arc<dyn Scope>)>,
    removed_scopes: Vec<String>,
    macros: HashMap<String, QueryMacro>,
    on_delete: Option<DeleteOverride>,
    macro_journal: Vec<String>,
}

impl DocumentQuery {
    /// `model` is the blank document rows are hydrated from.
    pub fn new(model: Document) -> Self {
        Self {
            model,
            wheres: vec![],
            joins: vec![],
            orders: vec![],
            limit: None,
            offset: None,
            scopes: vec![],
            removed_scopes: vec![],
            macros: HashMap::new(),
            on_delete: None,
            macro_journal: vec![],
        }
    }

    pub fn model(&self) -> &Document {
        &self.model
    }

    pub fn descriptor(&self) -> &CollectionDescriptor {
        self.model.descriptor()
    }

    pub fn push_where(&mut self, expr: SimpleExpr) -> &mut Self {
        self.wheres.push(expr);
        self
    }

    pub fn filter(mut self, expr: SimpleExpr) -> Self {
        self.push_where(expr);
        self
    }

    pub fn where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Expr::col(column_ref(column)).eq(value.into()))
    }

    pub fn where_null(self, column: &str) -> Self {
        self.filter(Expr::col(column_ref(column)).is_null())
    }

    pub fn where_not_null(self, column: &str) -> Self {
        self.filter(Expr::col(column_ref(column)).is_not_null())
    }

    pub fn join(mut self, table: &str, left: &str, right: &str) -> Self {
        self.joins.push(Join {
            table: table.to_string(),
            left: left.to_string(),
            right: right.to_string(),
        });
        self
    }

    pub fn has_joins(&self) -> bool {
        !self.joins.is_empty()
    }

    pub fn order_by(mut self, column: &str, order: Order) -> Self {
        self.orders.push((column.to_string(), order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Registers a global scope, replacing one of the same name.
    pub fn with_global_scope(&mut self, scope: Arc<dyn Scope>) -> &mut Self {
        let name = scope.name().to_string();
        self.scopes.retain(|(n, _)| n != &name);
        self.removed_scopes.retain(|n| n != &name);
        self.scopes.push((name, scope));
        self
    }

    pub fn without_global_scope(&mut self, name: &str) -> &mut Self {
        self.scopes.retain(|(n, _)| n != name);
        if !self.removed_scopes.iter().any(|n| n == name) {
            self.removed_scopes.push(name.to_string());
        }
        self
    }

    pub fn without_global_scopes(&mut self) -> &mut Self {
        let names: Vec<String> = self.scopes.iter().map(|(n, _)| n.clone()).collect();
        for name in names {
            self.without_global_scope(&name);
        }
        self
    }

    pub fn has_global_scope(&self, name: &str) -> bool {
        self.scopes.iter().any(|(n, _)| n == name)
    }

    pub fn removed_scopes(&self) -> &[String] {
        &self.removed_scopes
    }

    pub fn register_macro(&mut self, name: &str, query_macro: QueryMacro) -> &mut Self {
        self.macros.insert(name.to_string(), query_macro);
        self
    }

    pub fn has_macro(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Names of the macros applied to this query, oldest first.
    pub fn macro_journal(&self) -> &[String] {
        &self.macro_journal
    }

    pub fn on_delete(&mut self, on_delete: DeleteOverride) -> &mut Self {
        self.on_delete = Some(on_delete);
        self
    }

    pub fn has_delete_override(&self) -> bool {
        self.on_delete.is_some()
    }

    /// Columns the delete override would write for this query.
    pub fn delete_override_columns(&self) -> Option<ColumnValues> {
        self.on_delete.as_ref().map(|on_delete| on_delete(self))
    }

    /// Runs a macro without executing anything against storage.
    pub fn apply_macro(&mut self, name: &str) -> Result<MacroAction> {
        let query_macro = self
            .macros
            .get(name)
            .cloned()
            .ok_or_else(|| TombstoneError::UnknownMacro(name.to_string()))?;
        debug!("Applying query macro {name} on {}", self.descriptor().table());
        self.macro_journal.push(name.to_string());
        query_macro(self)
    }

    /// Runs a macro and executes the update it asks for, if any.
    pub async fn call_macro<C>(&mut self, db: &C, name: &str) -> Result<MacroOutcome>
    where
        C: ConnectionTrait,
    {
        match self.apply_macro(name)? {
            MacroAction::Chain => Ok(MacroOutcome::Chained),
            MacroAction::Update(columns) => {
                let affected = self.update(db, columns).await?;
                Ok(MacroOutcome::Affected(affected))
            }
        }
    }

    /// A copy of this query with every remaining global scope applied.
    pub fn with_scopes_applied(&self) -> DocumentQuery {
        let mut query = self.clone();
        let scopes = std::mem::take(&mut query.scopes);
        for (_, scope) in scopes {
            scope.apply(&mut query);
        }
        query
    }

    pub fn to_select_statement(&self) -> SelectStatement {
        let query = self.with_scopes_applied();
        let table = Alias::new(query.descriptor().table());
        let mut stmt = Query::select();
        stmt.column((table.clone(), Asterisk)).from(table);
        query.add_joins(&mut stmt);
        for expr in &query.wheres {
            stmt.and_where(expr.clone());
        }
        for (column, order) in &query.orders {
            stmt.order_by(column_ref(column), order.clone());
        }
        if let Some(limit) = query.limit {
            stmt.limit(limit);
        }
        if let Some(offset) = query.offset {
            stmt.offset(offset);
        }
        stmt
    }

    pub fn to_count_statement(&self) -> SelectStatement {
        let query = self.with_scopes_applied();
        let mut stmt = Query::select();
        stmt.expr_as(Func::count(Expr::col(Asterisk)), Alias::new("aggregate"))
            .from(Alias::new(query.descriptor().table()));
        query.add_joins(&mut stmt);
        for expr in &query.wheres {
            stmt.and_where(expr.clone());
        }
        stmt
    }

    /// Qualified `SET` targets are written without their table. A joined
    /// query updates the rows whose keys its joined select returns.
    pub fn to_update_statement(&self, columns: &ColumnValues) -> UpdateStatement {
        let query = self.with_scopes_applied();
        let mut stmt = Query::update();
        stmt.table(Alias::new(query.descriptor().table())).values(
            columns.iter().map(|(column, value)| {
                (
                    Alias::new(unqualified(column)),
                    SimpleExpr::Value(value.clone()),
                )
            }),
        );
        for expr in query.row_conditions() {
            stmt.and_where(expr);
        }
        stmt
    }

    pub fn to_delete_statement(&self) -> DeleteStatement {
        let query = self.with_scopes_applied();
        let mut stmt = Query::delete();
        stmt.from_table(Alias::new(query.descriptor().table()));
        for expr in query.row_conditions() {
            stmt.and_where(expr);
        }
        stmt
    }

    pub async fn get<C>(&self, db: &C) -> Result<Vec<Document>>
    where
        C: ConnectionTrait,
    {
        let stmt = db.get_database_backend().build(&self.to_select_statement());
        debug!("Select documents: {}", stmt.sql);
        let rows = JsonValue::find_by_statement(stmt).all(db).await?;
        debug!("Found {} documents", rows.len());
        Ok(rows
            .into_iter()
            .map(|row| self.model.new_from_row(row))
            .collect())
    }

    pub async fn first<C>(&self, db: &C) -> Result<Option<Document>>
    where
        C: ConnectionTrait,
    {
        let mut documents = self.clone().limit(1).get(db).await?;
        Ok(documents.pop())
    }

    pub async fn count<C>(&self, db: &C) -> Result<u64>
    where
        C: ConnectionTrait,
    {
        let stmt = db.get_database_backend().build(&self.to_count_statement());
        let total = match db.query_one(stmt).await? {
            Some(row) => row.try_get::<i64>("", "aggregate")?,
            None => 0,
        };
        Ok(u64::try_from(total).unwrap_or_default())
    }

    /// Updates all matching rows. `updated_at` is added when the collection
    /// tracks timestamps and the columns do not contain it yet.
    pub async fn update<C>(&self, db: &C, columns: ColumnValues) -> Result<u64>
    where
        C: ConnectionTrait,
    {
        let columns = self.add_updated_at_column(columns);
        let stmt = db
            .get_database_backend()
            .build(&self.to_update_statement(&columns));
        debug!("Update documents: {}", stmt.sql);
        let result = db.execute(stmt).await?;
        Ok(result.rows_affected())
    }

    /// Deletes all matching rows, or runs the delete override instead.
    pub async fn delete<C>(&self, db: &C) -> Result<u64>
    where
        C: ConnectionTrait,
    {
        if let Some(columns) = self.delete_override_columns() {
            debug!("Delete on {} replaced by update", self.descriptor().table());
            return self.update(db, columns).await;
        }
        let stmt = db.get_database_backend().build(&self.to_delete_statement());
        debug!("Delete documents: {}", stmt.sql);
        let result = db.execute(stmt).await?;
        Ok(result.rows_affected())
    }

    fn add_updated_at_column(&self, mut columns: ColumnValues) -> ColumnValues {
        let descriptor = self.descriptor();
        if !descriptor.uses_timestamps() {
            return columns;
        }
        if let Some(updated_at) = descriptor.updated_at_column() {
            if !columns.iter().any(|(c, _)| unqualified(c) == updated_at) {
                columns.push((updated_at.to_string(), Value::from(fresh_timestamp())));
            }
        }
        columns
    }

    /// Conditions selecting the affected rows of an update or delete, which
    /// cannot carry joins themselves. Expects the scopes to be applied.
    fn row_conditions(&self) -> Vec<SimpleExpr> {
        if !self.has_joins() {
            return self.wheres.clone();
        }
        let table = Alias::new(self.descriptor().table());
        let keys: Vec<(Alias, Alias)> = self
            .descriptor()
            .primary_key()
            .iter()
            .map(|key| (table.clone(), Alias::new(key.as_str())))
            .collect();

        let mut select = Query::select();
        select.columns(keys.clone()).from(table);
        self.add_joins(&mut select);
        for expr in &self.wheres {
            select.and_where(expr.clone());
        }

        let target = match keys.as_slice() {
            [key] => Expr::col(key.clone()),
            _ => Expr::tuple(keys.into_iter().map(|key| Expr::col(key).into())),
        };
        vec![target.in_subquery(select)]
    }

    fn add_joins(&self, stmt: &mut SelectStatement) {
        for join in &self.joins {
            stmt.inner_join(
                Alias::new(join.table.as_str()),
                Expr::col(column_ref(&join.left)).equals(column_ref(&join.right)),
            );
        }
    }
}

impl Debug for DocumentQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentQuery")
            .field("table", &self.descriptor().table())
            .field("wheres", &self.wheres)
            .field("joins", &self.joins)
            .field(
                "scopes",
                &self.scopes.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .field("removed_scopes", &self.removed_scopes)
            .field("macros", &self.macros.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// `table.column` becomes a qualified reference, anything else a plain
/// column.
pub fn column_ref(name: &str) -> ColumnRef {
    match name.split_once('.') {
        Some((table, column)) => (Alias::new(table), Alias::new(column)).into_column_ref(),
        None => Alias::new(name).into_column_ref(),
    }
}

pub fn unqualified(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}
