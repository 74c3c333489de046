//! Multi-entity projections.
//!
//! Given an ordered list of entity shapes, [`compose`] emits one projection
//! whose columns are split into contiguous groups, one per shape, and a
//! [`GroupLayout`] that records where each group starts. The layout depends
//! only on the shapes and the field-restriction set, never on the executed
//! row, so the materializer can slice rows by fixed offsets.
//!
//! Every column is aliased `t{position}_{column}`. The tag ends at the first
//! `_` after the position digits, so two positions can never produce the
//! same alias even when their tables share column names.

use core::ops::Range;

use crate::entity::{EntityShape, field_allowed};
use crate::error::{Result, TesseraError};
use crate::sql::{SQL, Token};

/// Alias tag prepended to every column of group `position`.
#[inline]
pub fn alias_tag(position: usize) -> String {
    format!("t{position}_")
}

/// One contiguous run of columns belonging to one entity position.
#[derive(Debug, Clone)]
pub struct ColumnGroup {
    pub position: usize,
    pub shape: &'static EntityShape,
    /// Field indices into `shape`, in projection order
    pub fields: Vec<usize>,
    /// Index of the group's first column in the row
    pub offset: usize,
}

impl ColumnGroup {
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Column range of this group within a row.
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.fields.len()
    }
}

/// Column groups of a multi-entity projection, in shape order.
#[derive(Debug, Clone, Default)]
pub struct GroupLayout {
    groups: Vec<ColumnGroup>,
    width: usize,
}

impl GroupLayout {
    /// Computes the layout for `shapes` under the optional restriction set.
    pub fn new(shapes: &[&'static EntityShape], only: Option<&[String]>) -> Result<Self> {
        if shapes.is_empty() {
            return Err(TesseraError::compilation(
                "multi-select needs at least one entity",
            ));
        }

        let mut groups = Vec::with_capacity(shapes.len());
        let mut offset = 0;
        for (position, shape) in shapes.iter().copied().enumerate() {
            let fields: Vec<usize> = shape
                .fields()
                .iter()
                .enumerate()
                .filter(|(_, field)| field_allowed(only, field))
                .map(|(idx, _)| idx)
                .collect();
            let len = fields.len();
            groups.push(ColumnGroup {
                position,
                shape,
                fields,
                offset,
            });
            offset += len;
        }

        if offset == 0 {
            return Err(TesseraError::compilation(
                "field restriction leaves no columns to select",
            ));
        }

        Ok(Self {
            groups,
            width: offset,
        })
    }

    #[inline]
    pub fn groups(&self) -> &[ColumnGroup] {
        &self.groups
    }

    #[inline]
    pub fn group(&self, position: usize) -> Option<&ColumnGroup> {
        self.groups.get(position)
    }

    /// Number of groups.
    #[inline]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of columns across all groups.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Renders the aliased projection for this layout.
    pub fn projection(&self) -> SQL {
        let columns = self.groups.iter().flat_map(|group| {
            let tag = alias_tag(group.position);
            group.fields.iter().map(move |&idx| {
                let field = group.shape.field(idx);
                SQL::qualified(group.shape.table(), field.column)
                    .alias(format!("{tag}{}", field.column))
            })
        });
        SQL::join(columns, Token::COMMA)
    }
}

/// A composed multi-entity projection.
#[derive(Debug, Clone)]
pub struct MultiSelect {
    pub projection: SQL,
    pub layout: GroupLayout,
}

/// Composes the projection and layout for `shapes`, in order.
pub fn compose(shapes: &[&'static EntityShape], only: Option<&[String]>) -> Result<MultiSelect> {
    let layout = GroupLayout::new(shapes, only)?;
    let projection = layout.projection();
    Ok(MultiSelect { projection, layout })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::entity::FieldDef;
    use crate::value::SqlType;
    use std::sync::OnceLock;

    fn shape(table: &'static str, cell: &'static OnceLock<EntityShape>) -> &'static EntityShape {
        cell.get_or_init(|| {
            EntityShape::new(
                table,
                vec![
                    FieldDef::new("id", "id", SqlType::Integer),
                    FieldDef::new("name", "name", SqlType::Text),
                ],
            )
        })
    }

    fn shapes() -> [&'static EntityShape; 2] {
        static A: OnceLock<EntityShape> = OnceLock::new();
        static B: OnceLock<EntityShape> = OnceLock::new();
        [shape("a", &A), shape("b", &B)]
    }

    #[test]
    fn groups_are_contiguous_and_tagged() {
        let multi = compose(&shapes(), None).unwrap();
        assert_eq!(multi.layout.width(), 4);
        assert_eq!(multi.layout.groups()[0].range(), 0..2);
        assert_eq!(multi.layout.groups()[1].range(), 2..4);
        assert_eq!(
            multi.projection.sql(&Dialect::SQLite),
            r#""a"."id" AS "t0_id", "a"."name" AS "t0_name", "b"."id" AS "t1_id", "b"."name" AS "t1_name""#
        );
    }

    #[test]
    fn restriction_narrows_every_group() {
        let only = vec!["name".to_string()];
        let layout = GroupLayout::new(&shapes(), Some(&only)).unwrap();
        assert_eq!(layout.groups()[0].fields, vec![1]);
        assert_eq!(layout.groups()[1].offset, 1);
        assert_eq!(layout.width(), 2);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(GroupLayout::new(&[], None).is_err());
        let only = vec!["nothing".to_string()];
        assert!(GroupLayout::new(&shapes(), Some(&only)).is_err());
    }
}
