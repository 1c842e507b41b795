// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use feeclip::db;
use feeclip::engine::snapshot::load_rule_set;
use feeclip::store::SqliteStore;
use rusqlite::Connection;

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    db::init_schema(&mut conn).unwrap();
    conn
}

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn insert_rule(conn: &Connection, id: i64, name: &str, rate: &str) {
    conn.execute(
        "INSERT INTO rules(id, entity_type, entity_name, rule_type, base_rate, applies_scope, vat_mode)
         VALUES (?1, 'distributor', ?2, 'percentage', ?3, 'fund', 'on_top')",
        rusqlite::params![id, name, rate],
    )
    .unwrap();
}

#[test]
fn checksum_ignores_row_insertion_order() {
    let a = setup();
    insert_rule(&a, 1, "Acme", "0.02");
    insert_rule(&a, 2, "Bolt", "0.01");

    let b = setup();
    insert_rule(&b, 2, "Bolt", "0.01");
    insert_rule(&b, 1, "Acme", "0.02");

    let store_a = SqliteStore::new(&a);
    let store_b = SqliteStore::new(&b);
    let rs_a = load_rule_set("run-a", &[], d("2024-06-30"), &store_a, &store_a, &store_a, &store_a)
        .unwrap();
    let rs_b = load_rule_set("run-b", &[], d("2024-06-30"), &store_b, &store_b, &store_b, &store_b)
        .unwrap();

    assert_eq!(rs_a.checksum, rs_b.checksum);
    assert_eq!(rs_a.checksum.len(), 64);
}

#[test]
fn checksum_changes_when_a_rule_changes() {
    let a = setup();
    insert_rule(&a, 1, "Acme", "0.02");
    let b = setup();
    insert_rule(&b, 1, "Acme", "0.03");

    let store_a = SqliteStore::new(&a);
    let store_b = SqliteStore::new(&b);
    let rs_a = load_rule_set("run-a", &[], d("2024-06-30"), &store_a, &store_a, &store_a, &store_a)
        .unwrap();
    let rs_b = load_rule_set("run-b", &[], d("2024-06-30"), &store_b, &store_b, &store_b, &store_b)
        .unwrap();
    assert_ne!(rs_a.checksum, rs_b.checksum);
}

#[test]
fn version_is_the_highest_rule_version() {
    let conn = setup();
    insert_rule(&conn, 1, "Acme", "0.02");
    conn.execute("UPDATE rules SET version=4 WHERE id=1", []).unwrap();
    insert_rule(&conn, 2, "Bolt", "0.01");

    let store = SqliteStore::new(&conn);
    let rs =
        load_rule_set("run-1", &[], d("2024-06-30"), &store, &store, &store, &store).unwrap();
    assert_eq!(rs.version, 4);
}

#[test]
fn loading_writes_the_rule_audit_snapshot() {
    let conn = setup();
    insert_rule(&conn, 1, "Acme", "0.02");
    insert_rule(&conn, 2, "Bolt", "0.01");

    let store = SqliteStore::new(&conn);
    load_rule_set("run-77", &[], d("2024-06-30"), &store, &store, &store, &store).unwrap();

    let n: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM rule_snapshots WHERE run_id='run-77'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(n, 2);
}

#[test]
fn archived_rules_are_excluded_from_the_snapshot() {
    let conn = setup();
    insert_rule(&conn, 1, "Acme", "0.02");
    insert_rule(&conn, 2, "Bolt", "0.01");
    conn.execute("UPDATE rules SET archived=1 WHERE id=2", []).unwrap();

    let store = SqliteStore::new(&conn);
    let rs =
        load_rule_set("run-1", &[], d("2024-06-30"), &store, &store, &store, &store).unwrap();
    assert_eq!(rs.rules.len(), 1);
    assert_eq!(rs.rules[0].id, 1);
}

#[test]
fn foreign_calculation_basis_aborts_the_load() {
    let conn = setup();
    insert_rule(&conn, 1, "Acme", "0.02");
    conn.execute(
        "UPDATE rules SET calculation_basis='committed_capital' WHERE id=1",
        [],
    )
    .unwrap();

    let store = SqliteStore::new(&conn);
    let err = load_rule_set("run-1", &[], d("2024-06-30"), &store, &store, &store, &store)
        .unwrap_err();
    assert!(err.to_string().contains("committed_capital"));
}

#[test]
fn fund_rule_with_a_deal_id_aborts_the_load() {
    let conn = setup();
    insert_rule(&conn, 1, "Acme", "0.02");
    conn.execute("UPDATE rules SET deal_id='D1' WHERE id=1", []).unwrap();

    let store = SqliteStore::new(&conn);
    let err = load_rule_set("run-1", &[], d("2024-06-30"), &store, &store, &store, &store)
        .unwrap_err();
    assert!(err.to_string().contains("fund-scoped"));
}

#[test]
fn only_named_investors_credits_are_loaded() {
    let conn = setup();
    insert_rule(&conn, 1, "Acme", "0.02");
    conn.execute(
        "INSERT INTO credits(investor, scope, original_balance, remaining_balance, status, date_posted)
         VALUES ('Alice','fund','500','500','active','2024-01-01'),
                ('Bob','fund','900','900','active','2024-01-01')",
        [],
    )
    .unwrap();

    let store = SqliteStore::new(&conn);
    let rs = load_rule_set(
        "run-1",
        &["Alice".to_string()],
        d("2024-06-30"),
        &store,
        &store,
        &store,
        &store,
    )
    .unwrap();
    assert_eq!(rs.credits.len(), 1);
    assert_eq!(rs.credits[0].investor, "Alice");
}
