//! Row to entity materialization.
//!
//! A [`RowMapper`] is built once per result set and maps each column of the
//! row to a field of the target shape. Columns with no matching field are
//! ignored and fields with no matching column keep their `Default` value.
//! Every cell is routed through [`DialectProvider::convert_scalar`] before it
//! is assigned, and conversion failures name the column and field.

use crate::compose::{ColumnGroup, GroupLayout};
use crate::dialect::DialectProvider;
use crate::entity::{Entity, EntityShape, field_allowed};
use crate::error::{Result, TesseraError};
use crate::row::Row;
use crate::value::{FromValue, ValueError};

/// Column-to-field mapping for one result set.
#[derive(Debug, Clone)]
pub struct RowMapper {
    shape: &'static EntityShape,
    /// First column this mapper reads
    offset: usize,
    /// `slots[i]` is the field fed by column `offset + i`
    slots: Vec<Option<usize>>,
}

impl RowMapper {
    /// Maps `columns` to fields of `shape` by name, ignoring ASCII case.
    ///
    /// When several columns name the same field the first one wins. Fields
    /// outside `only` are never mapped.
    pub fn new(shape: &'static EntityShape, columns: &[String], only: Option<&[String]>) -> Self {
        let mut taken = vec![false; shape.len()];
        let slots = columns
            .iter()
            .map(|column| {
                let idx = shape.find(column)?;
                if taken[idx] || !field_allowed(only, shape.field(idx)) {
                    return None;
                }
                taken[idx] = true;
                Some(idx)
            })
            .collect();
        Self {
            shape,
            offset: 0,
            slots,
        }
    }

    /// Positional mapping for one column group of a multi-entity row.
    pub fn for_group(group: &ColumnGroup) -> Self {
        Self {
            shape: group.shape,
            offset: group.offset,
            slots: group.fields.iter().copied().map(Some).collect(),
        }
    }

    /// One mapper per group, in layout order.
    pub fn for_layout(layout: &GroupLayout) -> Vec<Self> {
        layout.groups().iter().map(Self::for_group).collect()
    }

    #[inline]
    pub fn shape(&self) -> &'static EntityShape {
        self.shape
    }

    /// Number of columns that feed a field.
    pub fn mapped(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Builds a fresh `T` from `row`, taking the mapped cells out of it.
    pub fn materialize<T: Entity>(&self, row: &mut Row, dialect: &dyn DialectProvider) -> Result<T> {
        let mut target = T::default();
        self.apply(&mut target, row, dialect)?;
        Ok(target)
    }

    /// Assigns the mapped cells of `row` onto `target`.
    pub fn apply<T: Entity>(
        &self,
        target: &mut T,
        row: &mut Row,
        dialect: &dyn DialectProvider,
    ) -> Result<()> {
        debug_assert!(core::ptr::eq(T::shape(), self.shape));

        for (i, slot) in self.slots.iter().enumerate() {
            let Some(field_idx) = *slot else {
                continue;
            };
            let column = self.offset + i;
            let Some(value) = row.take(column) else {
                continue;
            };
            let field = self.shape.field(field_idx);
            dialect
                .convert_scalar(value, field.sql_type)
                .and_then(|value| target.set(field_idx, value))
                .map_err(|source| conversion(row, column, field.name, source))?;
        }
        Ok(())
    }
}

fn conversion(row: &Row, column: usize, field: &'static str, source: ValueError) -> TesseraError {
    TesseraError::Conversion {
        column: row.column_name(column).unwrap_or_default().to_string(),
        field,
        source,
    }
}

/// Reads the first column of `row` as a scalar.
///
/// Returns `None` for a row without columns.
pub fn scalar<K: FromValue>(row: &mut Row, dialect: &dyn DialectProvider) -> Result<Option<K>> {
    let Some(value) = row.take(0) else {
        return Ok(None);
    };
    dialect
        .convert_scalar(value, K::SQL_TYPE)
        .and_then(K::from_value)
        .map(Some)
        .map_err(|source| conversion(row, 0, "scalar", source))
}

/// A tuple of entities materialized from one multi-select row.
pub trait EntityTuple: Sized + Send + 'static {
    /// Shapes of the tuple elements, in order.
    fn shapes() -> Vec<&'static EntityShape>;

    /// Builds the tuple from `row`, one element per mapper.
    fn from_row(row: &mut Row, mappers: &[RowMapper], dialect: &dyn DialectProvider)
    -> Result<Self>;
}

fn mapper_at(mappers: &[RowMapper], position: usize) -> Result<&RowMapper> {
    mappers.get(position).ok_or_else(|| {
        TesseraError::compilation(format!(
            "multi-select layout has {} groups, tuple needs position {position}",
            mappers.len()
        ))
    })
}

macro_rules! impl_entity_tuple {
    ($($T:ident),+; $($idx:tt),+) => {
        impl<$($T: Entity),+> EntityTuple for ($($T,)+) {
            fn shapes() -> Vec<&'static EntityShape> {
                vec![$($T::shape()),+]
            }

            fn from_row(
                row: &mut Row,
                mappers: &[RowMapper],
                dialect: &dyn DialectProvider,
            ) -> Result<Self> {
                Ok(($(
                    mapper_at(mappers, $idx)?.materialize::<$T>(row, dialect)?,
                )+))
            }
        }
    };
}

with_tuple_sizes_8!(impl_entity_tuple);

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::compose::compose;
    use crate::dialect::Dialect;
    use crate::row::column_names;
    use crate::value::Value;

    crate::entity! {
        #[derive(Debug, Clone, PartialEq)]
        struct Person in "people" {
            id: i64,
            name: String,
            nickname: Option<String>,
        }
    }

    crate::entity! {
        #[derive(Debug, Clone, PartialEq)]
        struct Pet in "pets" {
            id: i64,
            name: String,
        }
    }

    fn row(columns: &[&str], values: Vec<Value>) -> Row {
        Row::new(column_names(columns.iter().copied()), values)
    }

    #[test]
    fn maps_by_name_and_ignores_extras() {
        let mut r = row(
            &["NAME", "extra", "id"],
            vec!["ann".into(), Value::Integer(9), Value::Integer(1)],
        );
        let mapper = RowMapper::new(Person::shape(), r.columns().clone().as_ref(), None);
        let person: Person = mapper.materialize(&mut r, &Dialect::SQLite).unwrap();
        assert_eq!(
            person,
            Person {
                id: 1,
                name: "ann".into(),
                nickname: None
            }
        );
    }

    #[test]
    fn restriction_leaves_other_fields_untouched() {
        let only = vec!["id".to_string(), "name".to_string()];
        let mut r = row(
            &["id", "name", "nickname"],
            vec![Value::Integer(2), "bo".into(), "b".into()],
        );
        let columns: Arc<[String]> = r.columns().clone();
        let mapper = RowMapper::new(Person::shape(), &columns, Some(&only));
        assert_eq!(mapper.mapped(), 2);
        let person: Person = mapper.materialize(&mut r, &Dialect::SQLite).unwrap();
        assert_eq!(person.nickname, None);
        assert_eq!(person.name, "bo");
    }

    #[test]
    fn conversion_error_names_column_and_field() {
        let mut r = row(&["id"], vec!["not a number".into()]);
        let columns = r.columns().clone();
        let mapper = RowMapper::new(Person::shape(), &columns, None);
        let err = mapper
            .materialize::<Person>(&mut r, &Dialect::SQLite)
            .unwrap_err();
        match err {
            TesseraError::Conversion { column, field, .. } => {
                assert_eq!(column, "id");
                assert_eq!(field, "id");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn tuple_elements_match_slice_materialization() {
        let multi = compose(&<(Person, Pet)>::shapes(), None).unwrap();
        let values = vec![
            Value::Integer(1),
            "ann".into(),
            Value::Null,
            Value::Integer(7),
            "rex".into(),
        ];
        let names = [
            "t0_id",
            "t0_name",
            "t0_nickname",
            "t1_id",
            "t1_name",
        ];
        let mut r = row(&names, values.clone());
        let mappers = RowMapper::for_layout(&multi.layout);
        let (person, pet) =
            <(Person, Pet)>::from_row(&mut r, &mappers, &Dialect::SQLite).unwrap();

        let range = multi.layout.groups()[1].range();
        let mut slice = row(&["id", "name"], values[range].to_vec());
        let alone: Pet = RowMapper::new(Pet::shape(), &column_names(["id", "name"]), None)
            .materialize(&mut slice, &Dialect::SQLite)
            .unwrap();
        assert_eq!(pet, alone);
        assert_eq!(person.name, "ann");
    }

    #[test]
    fn scalar_reads_first_column() {
        let mut r = row(&["n"], vec![Value::Integer(3)]);
        assert_eq!(scalar::<i64>(&mut r, &Dialect::SQLite).unwrap(), Some(3));
        let mut empty = row(&[], vec![]);
        assert_eq!(scalar::<i64>(&mut empty, &Dialect::SQLite).unwrap(), None);
    }
}
