mod common;

use std::borrow::Cow;
use std::sync::Arc;

use common::*;
use tessera::expr::{col, col_of, eq, gt, in_list, is_not_null, like, lt, ne, not, or};
use tessera::{Dialect, DialectProvider, OrderBy, SqlExpression, TesseraError};

fn query<T: tessera::Entity>(dialect: impl DialectProvider + 'static) -> SqlExpression<T> {
    SqlExpression::new(Arc::new(dialect))
}

/// `:1`, `:2`, ... placeholders and bracket quoting.
#[derive(Debug)]
struct Bracketed;

impl DialectProvider for Bracketed {
    fn write_quoted(&self, buf: &mut String, ident: &str) {
        buf.push('[');
        buf.push_str(ident);
        buf.push(']');
    }

    fn placeholder(&self, index: usize) -> Cow<'static, str> {
        Cow::Owned(format!(":{index}"))
    }

    fn paging_clause(&self, limit: Option<u64>, _offset: Option<u64>) -> Option<String> {
        limit.map(|n| format!("FETCH FIRST {n} ROWS ONLY"))
    }
}

#[test]
fn postgres_placeholders_follow_parameter_order() {
    let q = query::<Customer>(Dialect::PostgreSQL)
        .r#where(or([eq(col("name"), "alice"), in_list(col("id"), [4, 5])]))
        .and_then(|q| q.and_where(gt(col("id"), 1)))
        .unwrap();
    let stmt = q.to_select_statement();

    assert!(stmt.sql().ends_with(
        r#"WHERE ("customers"."name" = $1 OR "customers"."id" IN ($2, $3)) AND "customers"."id" > $4"#
    ));
    assert_eq!(stmt.params(), &[text("alice"), int(4), int(5), int(1)]);
    assert_eq!(q.params(), stmt.params());
}

#[test]
fn mysql_quotes_with_backticks_and_pages_with_offset_first() {
    let stmt = query::<Order>(Dialect::MySQL)
        .order_by(col("total"), OrderBy::Desc)
        .unwrap()
        .limit(10)
        .offset(20)
        .to_select_statement();

    assert_eq!(
        stmt.sql(),
        "SELECT `orders`.`id`, `orders`.`customer_id`, `orders`.`total` FROM `orders` ORDER BY `orders`.`total` DESC LIMIT 20, 10"
    );
}

#[test]
fn custom_dialects_drive_rendering() {
    let stmt = query::<Customer>(Bracketed)
        .r#where(like(col("name"), "a%"))
        .unwrap()
        .limit(3)
        .to_select_statement();

    assert_eq!(
        stmt.sql(),
        "SELECT [customers].[id], [customers].[name], [customers].[email] FROM [customers] WHERE [customers].[name] LIKE :1 FETCH FIRST 3 ROWS ONLY"
    );
}

#[test]
fn null_comparisons_become_null_tests() {
    let stmt = query::<Customer>(Dialect::SQLite)
        .r#where(ne(col("email"), None::<String>))
        .and_then(|q| q.or_where(not(is_not_null(col("name")))))
        .unwrap()
        .to_select_statement();

    assert!(stmt.sql().ends_with(
        r#"WHERE "customers"."email" IS NOT NULL OR NOT ("customers"."name" IS NOT NULL)"#
    ));
    assert!(stmt.params().is_empty());
}

#[test]
fn operators_combine_predicates() {
    let predicate = (gt(col("total"), 10) & lt(col("total"), 50)) | eq(col("customer_id"), 2);
    let stmt = query::<Order>(Dialect::SQLite)
        .r#where(predicate)
        .unwrap()
        .to_select_statement();

    assert!(stmt.sql().ends_with(
        r#"WHERE ("orders"."total" > ? AND "orders"."total" < ?) OR "orders"."customer_id" = ?"#
    ));
    assert_eq!(stmt.params(), &[int(10), int(50), int(2)]);
}

#[test]
fn restriction_narrows_projection() {
    let q = query::<Customer>(Dialect::SQLite).only(["id", "name"]);
    assert_eq!(
        q.to_select_statement().sql(),
        r#"SELECT "customers"."id", "customers"."name" FROM "customers""#
    );

    // `orders` is carried on the struct but is not a column.
    let none = query::<Customer>(Dialect::SQLite).only(["orders"]);
    assert_eq!(none.to_select_statement().sql(), r#"SELECT * FROM "customers""#);
}

#[test]
fn qualified_columns_must_belong_to_the_query() {
    let err = query::<Customer>(Dialect::SQLite)
        .r#where(eq(col_of::<Order>("id"), 1))
        .unwrap_err();
    assert!(matches!(err, TesseraError::Compilation(_)));

    let err = query::<Customer>(Dialect::SQLite)
        .join::<Order>(eq(col_of::<Order>("customer_id"), col("id")))
        .and_then(|q| q.join::<Order>(eq(col("id"), 1)))
        .unwrap_err();
    assert!(matches!(err, TesseraError::Compilation(_)));
}

#[test]
fn row_count_wraps_the_full_select() {
    let stmt = query::<Customer>(Dialect::PostgreSQL)
        .r#where(eq(col("id"), 1))
        .unwrap()
        .limit(1)
        .to_row_count_statement();

    assert_eq!(
        stmt.sql(),
        r#"SELECT COUNT(*) FROM (SELECT "customers"."id", "customers"."name", "customers"."email" FROM "customers" WHERE "customers"."id" = $1 LIMIT 1) AS "count""#
    );
    assert_eq!(stmt.params(), &[int(1)]);
}
