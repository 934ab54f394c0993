use crate::query::DocumentQuery;

/// A filter that is added to every query of a repository unless the query
/// removes it by name.
pub trait Scope: Send + Sync {
    fn name(&self) -> &str;

    /// Adds the scope's constraints. Called when the statement is built.
    fn apply(&self, query: &mut DocumentQuery);

    /// Installs macros or overrides on a freshly created query.
    fn extend(&self, _query: &mut DocumentQuery) {}
}
