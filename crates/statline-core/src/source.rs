// Collaborator interfaces for the analytic store.
//
// The statistics subsystem never talks to a warehouse directly. It consumes
// two narrow capabilities: running a parameterized query, and listing the
// columns a table currently exposes.

use async_trait::async_trait;

use crate::value::{Row, Scalar};

/// A named query parameter, referenced in templates as `@name`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParam {
    pub name: String,
    pub value: Scalar,
}

impl QueryParam {
    pub fn new(name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Runs a query template with bound parameters and returns the rows in
/// order. Failures are upstream I/O errors and propagate to the caller.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn run_query(&self, template: &str, params: &[QueryParam]) -> anyhow::Result<Vec<Row>>;
}

/// Lists the column names a logical table currently exposes.
#[async_trait]
pub trait ColumnLister: Send + Sync {
    async fn list_columns(&self, table: &str) -> anyhow::Result<Vec<String>>;
}

/// Returns true if `name` is safe to interpolate as a table or column
/// identifier: non-empty, ASCII alphanumerics, `_`, `-` and `.` only
/// (`.` separates project/dataset/table qualifiers).
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
