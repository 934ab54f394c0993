pub mod documents;
pub mod notes;
