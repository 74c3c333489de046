//! Result rows as handed from a driver to the materializer.

use std::sync::Arc;

use crate::value::Value;

/// One result row.
///
/// Column names are shared between every row of a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a row. `values` must be as long as `columns`.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    #[inline]
    pub fn columns(&self) -> &Arc<[String]> {
        &self.columns
    }

    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Cell at `idx`, or `None` past the end.
    #[inline]
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Name of column `idx`.
    #[inline]
    pub fn column_name(&self, idx: usize) -> Option<&str> {
        self.columns.get(idx).map(String::as_str)
    }

    /// Takes the cell at `idx`, leaving `NULL` behind.
    pub fn take(&mut self, idx: usize) -> Option<Value> {
        self.values.get_mut(idx).map(core::mem::take)
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Builds the shared column-name list for a result set.
pub fn column_names<I, S>(names: I) -> Arc<[String]>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(Into::into).collect()
}
