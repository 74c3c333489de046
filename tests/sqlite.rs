#![cfg(feature = "rusqlite")]

mod common;

use std::time::Duration;

use common::*;
use futures_util::TryStreamExt;
use tessera::expr::{alias, col, col_of, count_star, eq, gt, in_list, is_null, like, lower, max, sum};
use tessera::sqlite::SqliteConnection;
use tessera::{CancellationToken, Config, Db, OrderBy, TesseraError};

tessera::entity! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Spend in "spend" {
        pub customer_id: i64,
        pub orders: i64,
        pub total: f64,
    }
}

tessera::entity! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Flag in "flags" {
        pub id: i64,
        pub enabled: bool,
        pub note: Option<String>,
    }
}

#[tokio::test]
async fn filter_order_and_page() {
    let db = setup_sqlite();
    let cx = CancellationToken::new();

    let q = db
        .from::<Order>()
        .r#where(gt(col("total"), 5))
        .and_then(|q| q.order_by(col("total"), OrderBy::Desc))
        .unwrap()
        .limit(2)
        .offset(1);
    let orders = db.select(&q, &cx).await.unwrap();

    let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
    assert_eq!(ids, [10, 12]);
}

#[tokio::test]
async fn predicates_compile_to_valid_sqlite() {
    let db = setup_sqlite();
    let cx = CancellationToken::new();

    let no_email = db.select_where::<Customer>(is_null(col("email")), &cx).await.unwrap();
    assert_eq!(no_email.len(), 1);
    assert_eq!(no_email[0].name, "bob");

    let by_null_eq = db
        .count_where::<Customer>(eq(col("email"), None::<String>), &cx)
        .await
        .unwrap();
    assert_eq!(by_null_eq, 1);

    let some = db
        .select_where::<Customer>(in_list(col("id"), [1, 3]), &cx)
        .await
        .unwrap();
    assert_eq!(some.len(), 2);

    let none = db
        .select_where::<Customer>(in_list(col("id"), Vec::<i64>::new()), &cx)
        .await
        .unwrap();
    assert!(none.is_empty());

    let q = db
        .from::<Customer>()
        .r#where(like(lower(col("name")), "%o%"))
        .and_then(|q| q.or_where(eq(col("id"), 1)))
        .unwrap();
    assert_eq!(db.count(&q, &cx).await.unwrap(), 3);
}

#[tokio::test]
async fn grouped_projection_into_another_entity() {
    let db = setup_sqlite();
    let cx = CancellationToken::new();

    let q = db
        .from::<Order>()
        .select([
            col("customer_id"),
            alias(count_star(), "orders"),
            alias(sum(col("total")), "total"),
        ])
        .and_then(|q| q.group_by(col("customer_id")))
        .and_then(|q| q.order_by(col("customer_id"), OrderBy::Asc))
        .unwrap();
    let spend: Vec<Spend> = db.select_into(&q, &cx).await.unwrap();

    assert_eq!(
        spend,
        [
            Spend { customer_id: 1, orders: 3, total: 55.5 },
            Spend { customer_id: 2, orders: 1, total: 7.25 },
        ]
    );
}

#[tokio::test]
async fn scalar_aggregates() {
    let db = setup_sqlite();
    let cx = CancellationToken::new();

    let top: Option<f64> = db
        .scalar::<Order, f64>(max(col("total")), None, &cx)
        .await
        .unwrap();
    assert_eq!(top, Some(40.0));

    let nothing: Option<f64> = db
        .scalar::<Order, f64>(max(col("total")), Some(eq(col("customer_id"), 99)), &cx)
        .await
        .unwrap();
    assert_eq!(nothing, None);
}

#[tokio::test]
async fn join_and_multi_select() {
    let db = setup_sqlite();
    let cx = CancellationToken::new();

    let q = db
        .from::<Customer>()
        .join::<Order>(eq(col_of::<Order>("customer_id"), col_of::<Customer>("id")))
        .and_then(|q| q.r#where(gt(col_of::<Order>("total"), 10)))
        .and_then(|q| q.order_by(col_of::<Order>("id"), OrderBy::Asc))
        .unwrap();
    let pairs = db.select_multi::<(Customer, Order), _>(&q, &cx).await.unwrap();

    assert_eq!(pairs.len(), 2);
    for (customer, order) in &pairs {
        assert_eq!(customer.id, order.customer_id);
        assert_eq!(customer.name, "alice");
    }
    assert_eq!(pairs[0].1.id, 10);
    assert_eq!(pairs[1].1.id, 11);

    // A plain select over the join still projects the root table only.
    let plain = db.select(&q, &cx).await.unwrap();
    assert_eq!(plain.iter().map(|c| c.id).collect::<Vec<_>>(), [1, 1]);
}

#[tokio::test]
async fn left_join_keeps_unmatched_roots() {
    let db = setup_sqlite();
    let cx = CancellationToken::new();

    let q = db
        .from::<Customer>()
        .left_join::<Profile>(eq(col_of::<Profile>("customer_id"), col_of::<Customer>("id")))
        .and_then(|q| q.r#where(is_null(col_of::<Profile>("id"))))
        .unwrap();
    let lonely = db.select(&q, &cx).await.unwrap();
    assert_eq!(lonely.len(), 1);
    assert_eq!(lonely[0].name, "bob");
}

#[tokio::test]
async fn stream_yields_rows_in_order() {
    let db = setup_sqlite();
    let cx = CancellationToken::new();

    let q = db.from::<Order>().order_by(col("id"), OrderBy::Desc).unwrap();
    let orders: Vec<Order> = db.stream(&q, &cx).try_collect().await.unwrap();
    assert_eq!(orders.iter().map(|o| o.id).collect::<Vec<_>>(), [13, 12, 11, 10]);
}

#[tokio::test]
async fn storage_classes_convert_to_field_types() {
    let conn = SqliteConnection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE flags (id INTEGER PRIMARY KEY, enabled INTEGER NOT NULL, note TEXT);
         INSERT INTO flags VALUES (1, 1, 'on'), (2, 0, NULL);",
    )
    .unwrap();
    let db = Db::with_config(conn, &Config::parse("dialect = \"sqlite\"").unwrap());
    let cx = CancellationToken::new();

    let q = db.from::<Flag>().order_by(col("id"), OrderBy::Asc).unwrap();
    let flags = db.select(&q, &cx).await.unwrap();
    assert_eq!(
        flags,
        [
            Flag { id: 1, enabled: true, note: Some("on".into()) },
            Flag { id: 2, enabled: false, note: None },
        ]
    );
}

#[tokio::test]
async fn driver_errors_surface_as_execution_errors() {
    let conn = SqliteConnection::open_in_memory().unwrap();
    let db = Db::new(conn, tessera::Dialect::SQLite);
    let cx = CancellationToken::new();

    let err = db.select(&db.from::<Customer>(), &cx).await.unwrap_err();
    assert!(matches!(err, TesseraError::Execution(_)));
    assert!(err.to_string().contains("no such table"));
}

#[tokio::test]
async fn cancellation_interrupts_a_running_query() {
    let db = setup_sqlite();
    let cx = CancellationToken::new();
    let trigger = cx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let endless = "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 10000000000) SELECT x FROM n";
    let res = tokio::time::timeout(Duration::from_secs(10), db.row_count_sql(endless, &cx))
        .await
        .expect("cancellation did not interrupt the running query");
    assert!(matches!(res, Err(TesseraError::Cancelled)));

    // The interrupted statement released the connection.
    let fresh = CancellationToken::new();
    let count = tokio::time::timeout(Duration::from_secs(10), db.count_all::<Customer>(&fresh))
        .await
        .expect("connection still busy after cancellation")
        .unwrap();
    assert_eq!(count, 3);
}

#[tokio::test]
async fn invalid_utf8_text_is_a_conversion_error() {
    let db = setup_sqlite();
    db.connection()
        .execute_batch("UPDATE customers SET name = CAST(x'61ff' AS TEXT) WHERE id = 2;")
        .unwrap();
    let cx = CancellationToken::new();

    let err = db
        .single_where::<Customer>(eq(col("id"), 2), &cx)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TesseraError::Conversion { field, .. } if field == "name"
    ));
}
