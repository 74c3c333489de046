//! Entity-shape descriptors.
//!
//! An [`EntityShape`] is the table name plus the ordered list of mapped
//! fields of one Rust type. It is built once per type (see [`entity!`]) and
//! shared by the compiler, the multi-select composer and the materializer.
//!
//! [`entity!`]: crate::entity!

use hashbrown::HashMap;

use crate::value::{SqlType, Value, ValueError};

/// One mapped field of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// Rust field name
    pub name: &'static str,
    /// Column name in the table
    pub column: &'static str,
    pub sql_type: SqlType,
}

impl FieldDef {
    pub const fn new(name: &'static str, column: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            column,
            sql_type,
        }
    }
}

/// Table name and ordered field list of an entity type.
#[derive(Debug, Clone)]
pub struct EntityShape {
    table: &'static str,
    fields: Vec<FieldDef>,
    /// lowercased field and column names -> field index
    lookup: HashMap<String, usize>,
}

impl EntityShape {
    pub fn new(table: &'static str, fields: Vec<FieldDef>) -> Self {
        let mut lookup = HashMap::with_capacity(fields.len() * 2);
        for (idx, field) in fields.iter().enumerate() {
            lookup.entry(field.name.to_ascii_lowercase()).or_insert(idx);
            lookup.entry(field.column.to_ascii_lowercase()).or_insert(idx);
        }
        Self {
            table,
            fields,
            lookup,
        }
    }

    #[inline]
    pub fn table(&self) -> &'static str {
        self.table
    }

    #[inline]
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    #[inline]
    pub fn field(&self, idx: usize) -> &FieldDef {
        &self.fields[idx]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Finds a field by field or column name, ignoring ASCII case.
    pub fn find(&self, name: &str) -> Option<usize> {
        if let Some(idx) = self.lookup.get(name) {
            return Some(*idx);
        }
        self.lookup.get(&name.to_ascii_lowercase()).copied()
    }
}

/// Field-restriction check shared by projection and materialization.
///
/// `None` means unrestricted.
pub fn field_allowed(only: Option<&[String]>, field: &FieldDef) -> bool {
    match only {
        None => true,
        Some(names) => names.iter().any(|n| {
            n.eq_ignore_ascii_case(field.name) || n.eq_ignore_ascii_case(field.column)
        }),
    }
}

/// A Rust type that can be selected and materialized.
///
/// Usually implemented through [`entity!`](crate::entity!).
pub trait Entity: Default + Send + Sized + 'static {
    /// The cached shape of this type.
    fn shape() -> &'static EntityShape;

    /// Assigns field `field` (an index into `shape().fields()`).
    fn set(&mut self, field: usize, value: Value) -> Result<(), ValueError>;

    /// Reads field `field` back as a value.
    fn get(&self, field: usize) -> Value;
}

/// Declares a struct together with its [`Entity`] implementation.
///
/// The struct derives `Default`. Fields listed after `with` are carried on
/// the struct but are not mapped to columns (relation targets, for example).
///
/// ```
/// tessera_core::entity! {
///     #[derive(Debug, Clone)]
///     pub struct User in "users" {
///         pub id: i64,
///         pub name: String = "full_name",
///         pub email: Option<String>,
///     }
/// }
///
/// use tessera_core::Entity;
/// assert_eq!(User::shape().table(), "users");
/// assert_eq!(User::shape().field(1).column, "full_name");
/// ```
#[macro_export]
macro_rules! entity {
    (@column $field:ident) => { stringify!($field) };
    (@column $field:ident $column:literal) => { $column };

    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident in $table:literal {
            $($fvis:vis $field:ident : $fty:ty $(= $column:literal)?),+ $(,)?
        }
        $(with {
            $($rvis:vis $rfield:ident : $rty:ty),* $(,)?
        })?
    ) => {
        $(#[$meta])*
        #[derive(Default)]
        $vis struct $name {
            $($fvis $field: $fty,)+
            $($($rvis $rfield: $rty,)*)?
        }

        impl $crate::Entity for $name {
            fn shape() -> &'static $crate::EntityShape {
                static SHAPE: ::std::sync::OnceLock<$crate::EntityShape> = ::std::sync::OnceLock::new();
                SHAPE.get_or_init(|| {
                    $crate::EntityShape::new(
                        $table,
                        ::std::vec![$(
                            $crate::FieldDef::new(
                                stringify!($field),
                                $crate::entity!(@column $field $($column)?),
                                <$fty as $crate::FromValue>::SQL_TYPE,
                            ),
                        )+],
                    )
                })
            }

            #[allow(unused_assignments)]
            fn set(
                &mut self,
                field: usize,
                value: $crate::Value,
            ) -> ::core::result::Result<(), $crate::ValueError> {
                let mut idx = 0usize;
                $(
                    if field == idx {
                        self.$field = <$fty as $crate::FromValue>::from_value(value)?;
                        return Ok(());
                    }
                    idx += 1;
                )+
                Err($crate::ValueError::UnknownField(field))
            }

            #[allow(unused_assignments)]
            fn get(&self, field: usize) -> $crate::Value {
                let mut idx = 0usize;
                $(
                    if field == idx {
                        return $crate::Value::from(::core::clone::Clone::clone(&self.$field));
                    }
                    idx += 1;
                )+
                $crate::Value::Null
            }
        }
    };

}

#[cfg(test)]
mod tests {
    use super::*;

    crate::entity! {
        #[derive(Debug, Clone, PartialEq)]
        struct Account in "accounts" {
            id: i64,
            display_name: String = "DisplayName",
            balance: Option<f64>,
        }
        with {
            tags: Vec<String>,
        }
    }

    #[test]
    fn shape_is_cached() {
        let a = Account::shape() as *const EntityShape;
        let b = Account::shape() as *const EntityShape;
        assert_eq!(a, b);
    }

    #[test]
    fn find_is_case_insensitive() {
        let shape = Account::shape();
        assert_eq!(shape.find("ID"), Some(0));
        assert_eq!(shape.find("displayname"), Some(1));
        assert_eq!(shape.find("display_name"), Some(1));
        assert_eq!(shape.find("tags"), None);
    }

    #[test]
    fn set_and_get_round_trip_fields() {
        let mut account = Account::default();
        account.set(0, Value::Integer(7)).unwrap();
        account.set(2, Value::Null).unwrap();
        assert_eq!(account.id, 7);
        assert_eq!(account.balance, None);
        assert_eq!(account.get(0), Value::Integer(7));
        assert!(account.tags.is_empty());
        assert_eq!(account.set(9, Value::Null), Err(ValueError::UnknownField(9)));
    }

    #[test]
    fn restriction_matches_field_or_column() {
        let shape = Account::shape();
        let only = vec!["displayname".to_string()];
        assert!(field_allowed(Some(&only), shape.field(1)));
        assert!(!field_allowed(Some(&only), shape.field(0)));
        assert!(field_allowed(None, shape.field(0)));
    }
}
