// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use feeclip::db;
use feeclip::engine::calc::{RunState, calculate};
use feeclip::engine::money::Money;
use feeclip::engine::snapshot::load_rule_set;
use feeclip::models::Scope;
use feeclip::store::SqliteStore;
use rusqlite::{Connection, params};
use rust_decimal_macros::dec;

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    db::init_schema(&mut conn).unwrap();
    conn.execute(
        "INSERT INTO vat_rates(country, rate, effective_from, is_default)
         VALUES ('GB','0.20','2020-01-01',1)",
        [],
    )
    .unwrap();
    conn
}

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn insert_contribution(conn: &Connection, investor: &str, amount: &str, distributor: Option<&str>) -> i64 {
    conn.execute(
        "INSERT INTO contributions(investor, fund, amount, date, distributor)
         VALUES (?1, 'Growth Fund', ?2, '2024-06-15', ?3)",
        params![investor, amount, distributor],
    )
    .unwrap();
    conn.last_insert_rowid()
}

fn run(conn: &Connection, investors: &[&str]) -> feeclip::engine::calc::CalculationOutput {
    let store = SqliteStore::new(conn);
    let contributions = store.contributions(None, None).unwrap();
    let investors: Vec<String> = investors.iter().map(|s| s.to_string()).collect();
    let ruleset = load_rule_set(
        "run-test", &investors, d("2024-06-30"), &store, &store, &store, &store,
    )
    .unwrap();
    calculate(&contributions, &ruleset, "run-test", d("2024-06-30")).unwrap()
}

#[test]
fn percentage_rule_prices_a_contribution_end_to_end() {
    let conn = setup();
    conn.execute(
        "INSERT INTO rules(entity_type, rule_type, base_rate, applies_scope, vat_mode)
         VALUES ('distributor','percentage','0.02','fund','on_top')",
        [],
    )
    .unwrap();
    insert_contribution(&conn, "Alice", "100000", Some("Acme"));

    let out = run(&conn, &["Alice"]);
    assert_eq!(out.state, RunState::Completed);
    assert_eq!(out.lines.len(), 1);
    let line = &out.lines[0];
    assert_eq!(line.entity_name, "Acme");
    assert_eq!(line.fee_gross, Money::new(dec!(2000.00)));
    assert_eq!(line.vat_amount, Money::new(dec!(400.00)));
    assert_eq!(line.fee_net, Money::new(dec!(2000.00)));
    assert_eq!(line.total_payable, Money::new(dec!(2400.00)));
    assert_eq!(line.scope, Scope::Fund);
    assert!(line.deal_id.is_none());
    assert_eq!(out.total_gross, Money::new(dec!(2000.00)));
    assert_eq!(out.fund_totals.count, 1);
    assert_eq!(out.deal_totals.count, 0);
    assert!(out.errors.is_empty());
}

#[test]
fn included_vat_backs_the_net_out_of_the_fee() {
    let conn = setup();
    conn.execute(
        "INSERT INTO rules(entity_type, rule_type, base_rate, applies_scope, vat_mode)
         VALUES ('distributor','percentage','0.02','fund','included')",
        [],
    )
    .unwrap();
    insert_contribution(&conn, "Alice", "100000", Some("Acme"));

    let out = run(&conn, &["Alice"]);
    let line = &out.lines[0];
    assert_eq!(line.fee_gross, Money::new(dec!(2000.00)));
    assert_eq!(line.fee_net, Money::new(dec!(1666.67)));
    assert_eq!(line.vat_amount, Money::new(dec!(333.33)));
    assert_eq!(line.fee_net + line.vat_amount, line.fee_gross);
    assert_eq!(line.total_payable, Money::new(dec!(2000.00)));
}

#[test]
fn credits_reduce_the_payable_and_persist_balances() {
    let mut conn = setup();
    conn.execute(
        "INSERT INTO rules(entity_type, rule_type, base_rate, applies_scope, vat_mode)
         VALUES ('distributor','percentage','0.02','fund','on_top')",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO credits(investor, scope, original_balance, remaining_balance, status, date_posted)
         VALUES ('Alice','fund','500','500','active','2024-01-01')",
        [],
    )
    .unwrap();
    insert_contribution(&conn, "Alice", "100000", Some("Acme"));

    let tx = conn.transaction().unwrap();
    let out = {
        let store = SqliteStore::new(&tx);
        let contributions = store.contributions(None, None).unwrap();
        let ruleset = load_rule_set(
            "run-test",
            &["Alice".to_string()],
            d("2024-06-30"),
            &store,
            &store,
            &store,
            &store,
        )
        .unwrap();
        let out = calculate(&contributions, &ruleset, "run-test", d("2024-06-30")).unwrap();
        store.persist_run(&out).unwrap();
        out
    };
    tx.commit().unwrap();

    let line = &out.lines[0];
    // 2400 payable less the 500 credit
    assert_eq!(line.total_payable, Money::new(dec!(1900.00)));
    assert_eq!(line.credits_applied.len(), 1);
    assert_eq!(line.credits_applied[0].amount_applied, Money::new(dec!(500)));

    let (balance, status): (String, String) = conn
        .query_row(
            "SELECT remaining_balance, status FROM credits WHERE investor='Alice'",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert_eq!(balance, "0");
    assert_eq!(status, "exhausted");

    let apps: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM credit_applications WHERE run_id='run-test'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(apps, 1);
}

#[test]
fn entity_level_failure_spares_the_other_lines() {
    let conn = setup();
    conn.execute(
        "INSERT INTO rules(entity_type, rule_type, base_rate, applies_scope, vat_mode)
         VALUES ('distributor','percentage','0.02','fund','on_top')",
        [],
    )
    .unwrap();
    // Tiered rule with an empty tier table for the referrer.
    conn.execute(
        "INSERT INTO rules(entity_type, rule_type, applies_scope, vat_mode, tier_mode)
         VALUES ('referrer','tiered','fund','on_top','stepped')",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO contributions(investor, fund, amount, date, distributor, referrer)
         VALUES ('Alice','Growth Fund','100000','2024-06-15','Acme','RefCo')",
        [],
    )
    .unwrap();

    let out = run(&conn, &["Alice"]);
    assert_eq!(out.state, RunState::Completed);
    assert_eq!(out.lines.len(), 1);
    assert_eq!(out.lines[0].entity_name, "Acme");
    assert_eq!(out.errors.len(), 1);
    assert_eq!(out.errors[0].entity_name, "RefCo");
    assert!(out.errors[0].reason.contains("no tiers"));
}

#[test]
fn deferred_rate_resolves_through_the_agreement() {
    let conn = setup();
    conn.execute(
        "INSERT INTO rules(entity_type, rule_type, applies_scope, vat_mode)
         VALUES ('distributor','percentage','fund','on_top')",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO agreements(party, scope, effective_from, upfront_override, deferred_override)
         VALUES ('Acme','fund','2024-01-01','0.015','0.005')",
        [],
    )
    .unwrap();
    insert_contribution(&conn, "Alice", "100000", Some("Acme"));

    let out = run(&conn, &["Alice"]);
    assert_eq!(out.lines.len(), 1);
    let line = &out.lines[0];
    assert_eq!(line.applied_rate, Some(dec!(0.015)));
    assert_eq!(line.fee_gross, Money::new(dec!(1500.00)));
    assert!(line.notes.iter().any(|n| n.contains("agreement")));
}

#[test]
fn party_without_rate_or_agreement_is_an_entity_error() {
    let conn = setup();
    conn.execute(
        "INSERT INTO rules(entity_type, rule_type, applies_scope, vat_mode)
         VALUES ('distributor','percentage','fund','on_top')",
        [],
    )
    .unwrap();
    insert_contribution(&conn, "Alice", "100000", Some("Acme"));

    let out = run(&conn, &["Alice"]);
    assert!(out.lines.is_empty());
    assert_eq!(out.errors.len(), 1);
    assert!(out.errors[0].reason.contains("no agreement"));
}

#[test]
fn non_positive_contributions_are_skipped_with_a_warning() {
    let conn = setup();
    conn.execute(
        "INSERT INTO rules(entity_type, rule_type, base_rate, applies_scope, vat_mode)
         VALUES ('distributor','percentage','0.02','fund','on_top')",
        [],
    )
    .unwrap();
    insert_contribution(&conn, "Alice", "0", Some("Acme"));
    insert_contribution(&conn, "Alice", "-100", Some("Acme"));

    let out = run(&conn, &["Alice"]);
    assert!(out.lines.is_empty());
    assert_eq!(out.warnings.len(), 2);
}

#[test]
fn entity_without_a_matching_rule_only_warns() {
    let conn = setup();
    conn.execute(
        "INSERT INTO rules(entity_type, entity_name, rule_type, base_rate, applies_scope, vat_mode)
         VALUES ('distributor','SomeoneElse','percentage','0.02','fund','on_top')",
        [],
    )
    .unwrap();
    insert_contribution(&conn, "Alice", "100000", Some("Acme"));

    let out = run(&conn, &["Alice"]);
    assert!(out.lines.is_empty());
    assert!(out.errors.is_empty());
    assert_eq!(out.warnings.len(), 1);
    assert!(out.warnings[0].message.contains("Acme"));
}

#[test]
fn deal_contribution_lands_in_the_deal_bucket() {
    let conn = setup();
    conn.execute(
        "INSERT INTO rules(entity_type, rule_type, base_rate, applies_scope, deal_id, vat_mode)
         VALUES ('distributor','percentage','0.03','deal','D1','on_top')",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO rules(entity_type, rule_type, base_rate, applies_scope, vat_mode)
         VALUES ('distributor','percentage','0.02','fund','on_top')",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO contributions(investor, fund, deal_id, amount, date, distributor)
         VALUES ('Alice','Growth Fund','D1','100000','2024-06-15','Acme')",
        [],
    )
    .unwrap();

    let out = run(&conn, &["Alice"]);
    assert_eq!(out.lines.len(), 1);
    let line = &out.lines[0];
    assert_eq!(line.scope, Scope::Deal);
    assert_eq!(line.deal_id.as_deref(), Some("D1"));
    assert_eq!(line.fee_gross, Money::new(dec!(3000.00)));
    assert_eq!(out.deal_totals.count, 1);
    assert_eq!(out.fund_totals.count, 0);
}

#[test]
fn run_persistence_round_trips_through_the_store() {
    let mut conn = setup();
    conn.execute(
        "INSERT INTO rules(entity_type, rule_type, base_rate, applies_scope, vat_mode)
         VALUES ('distributor','percentage','0.02','fund','on_top')",
        [],
    )
    .unwrap();
    insert_contribution(&conn, "Alice", "100000", Some("Acme"));

    let tx = conn.transaction().unwrap();
    {
        let store = SqliteStore::new(&tx);
        let contributions = store.contributions(None, None).unwrap();
        let ruleset = load_rule_set(
            "run-persist",
            &["Alice".to_string()],
            d("2024-06-30"),
            &store,
            &store,
            &store,
            &store,
        )
        .unwrap();
        let out = calculate(&contributions, &ruleset, "run-persist", d("2024-06-30")).unwrap();
        store.persist_run(&out).unwrap();
    }
    tx.commit().unwrap();

    let store = SqliteStore::new(&conn);
    let row = store.run("run-persist").unwrap();
    assert_eq!(row.status, "completed");
    assert_eq!(row.errors, 0);

    let lines = store.fee_lines("run-persist").unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].entity_name, "Acme");
    assert_eq!(lines[0].total_payable, "2400.00");
}
