mod common;
use common::{assert_sqlite_pragmas, seed_location, seed_retailer, setup_db};

use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::Integer;

#[derive(QueryableByName)]
struct TblCnt {
    #[diesel(sql_type = Integer)]
    cnt: i32,
}

#[test]
fn migrations_apply_and_pragmas_are_set() {
    let (_db, mut conn) = setup_db();

    // WAL is a persistent property of the .db file; FKs/timeout are per-connection
    assert_sqlite_pragmas(&mut conn);

    let tbls: TblCnt = sql_query(
        "SELECT COUNT(*) AS cnt
            FROM sqlite_master
            WHERE type='table'
            AND name IN ('retailers','locations','inventories','categories','products',
                         'variants','variant_categories','variant_images','customers',
                         'orders','order_items','order_pickups','expiry_tasks',
                         'webhook_events','failed_tasks');",
    )
    .get_result(&mut conn)
    .unwrap();
    assert_eq!(tbls.cnt, 15, "expected every table to be present");
}

#[test]
fn retailer_delete_cascades_to_locations() {
    let (_db, mut conn) = setup_db();
    let retailer = seed_retailer(&mut conn);
    seed_location(&mut conn, retailer.id, "L1");

    sql_query("DELETE FROM retailers WHERE id = ?")
        .bind::<Integer, _>(retailer.id)
        .execute(&mut conn)
        .unwrap();

    let left: TblCnt = sql_query("SELECT COUNT(*) AS cnt FROM locations")
        .get_result(&mut conn)
        .unwrap();
    assert_eq!(left.cnt, 0);
}

#[test]
fn half_set_tokens_are_rejected() {
    let (_db, mut conn) = setup_db();
    let err = sql_query(
        "INSERT INTO retailers (name, origin, app_id, app_secret, access_token)
         VALUES ('r', 'SQUARE', 'app', 'secret', 'token-without-type')",
    )
    .execute(&mut conn);
    assert!(err.is_err(), "token columns must be set together");
}
