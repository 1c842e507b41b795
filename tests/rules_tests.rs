// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use feeclip::{cli, commands::rules, commands::vat, db};
use rusqlite::Connection;

fn base_conn() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    db::init_schema(&mut conn).unwrap();
    conn
}

fn run_rule(conn: &Connection, args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec!["feeclip", "rule"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    if let Some(("rule", rule_m)) = matches.subcommand() {
        rules::handle(conn, rule_m)
    } else {
        panic!("no rule subcommand");
    }
}

fn run_vat(conn: &Connection, args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec!["feeclip", "vat"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    if let Some(("vat", vat_m)) = matches.subcommand() {
        vat::handle(conn, vat_m)
    } else {
        panic!("no vat subcommand");
    }
}

#[test]
fn rule_add_stores_the_rule() {
    let conn = base_conn();
    run_rule(
        &conn,
        &[
            "add", "--entity-type", "distributor", "--entity-name", "Acme", "--type",
            "percentage", "--rate", "0.02", "--scope", "fund",
        ],
    )
    .unwrap();

    let (name, rule_type, rate, basis): (String, String, String, String) = conn
        .query_row(
            "SELECT entity_name, rule_type, base_rate, calculation_basis FROM rules",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .unwrap();
    assert_eq!(name, "Acme");
    assert_eq!(rule_type, "percentage");
    assert_eq!(rate, "0.02");
    assert_eq!(basis, "distribution_amount");
}

#[test]
fn deal_rule_without_deal_id_is_rejected() {
    let conn = base_conn();
    let err = run_rule(
        &conn,
        &[
            "add", "--entity-type", "distributor", "--type", "percentage", "--rate", "0.02",
            "--scope", "deal",
        ],
    )
    .unwrap_err();
    assert!(err.to_string().contains("--deal-id"));
}

#[test]
fn fund_rule_with_deal_id_is_rejected() {
    let conn = base_conn();
    let err = run_rule(
        &conn,
        &[
            "add", "--entity-type", "distributor", "--type", "percentage", "--rate", "0.02",
            "--scope", "fund", "--deal-id", "D1",
        ],
    )
    .unwrap_err();
    assert!(err.to_string().contains("must not carry"));
}

#[test]
fn whole_percentage_rate_is_rejected() {
    let conn = base_conn();
    let err = run_rule(
        &conn,
        &[
            "add", "--entity-type", "distributor", "--type", "percentage", "--rate", "2",
            "--scope", "fund",
        ],
    )
    .unwrap_err();
    assert!(err.to_string().contains("fraction"));
}

#[test]
fn adding_a_tier_bumps_the_rule_version() {
    let conn = base_conn();
    run_rule(
        &conn,
        &[
            "add", "--entity-type", "distributor", "--type", "tiered", "--scope", "fund",
            "--tier-mode", "stepped",
        ],
    )
    .unwrap();
    run_rule(
        &conn,
        &[
            "add-tier", "--rule", "1", "--order", "1", "--min", "0", "--max", "100000",
            "--rate", "0.01",
        ],
    )
    .unwrap();
    run_rule(
        &conn,
        &["add-tier", "--rule", "1", "--order", "2", "--min", "100000", "--rate", "0.02"],
    )
    .unwrap();

    let (version, tiers): (i64, i64) = conn
        .query_row(
            "SELECT version, (SELECT COUNT(*) FROM rule_tiers WHERE rule_id=1) FROM rules WHERE id=1",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert_eq!(version, 3);
    assert_eq!(tiers, 2);
}

#[test]
fn tiers_cannot_be_added_to_archived_rules() {
    let conn = base_conn();
    run_rule(
        &conn,
        &[
            "add", "--entity-type", "distributor", "--type", "tiered", "--scope", "fund",
        ],
    )
    .unwrap();
    run_rule(&conn, &["archive", "--rule", "1"]).unwrap();

    let err = run_rule(
        &conn,
        &["add-tier", "--rule", "1", "--order", "1", "--min", "0", "--rate", "0.01"],
    )
    .unwrap_err();
    assert!(err.to_string().contains("archived"));
}

#[test]
fn setting_a_new_default_vat_clears_the_old_one() {
    let conn = base_conn();
    run_vat(
        &conn,
        &["set", "--country", "GB", "--rate", "0.20", "--from", "2020-01-01", "--default"],
    )
    .unwrap();
    run_vat(
        &conn,
        &["set", "--country", "DE", "--rate", "0.19", "--from", "2021-01-01", "--default"],
    )
    .unwrap();

    let defaults: i64 = conn
        .query_row("SELECT COUNT(*) FROM vat_rates WHERE is_default=1", [], |r| r.get(0))
        .unwrap();
    assert_eq!(defaults, 1);
    let country: String = conn
        .query_row("SELECT country FROM vat_rates WHERE is_default=1", [], |r| r.get(0))
        .unwrap();
    assert_eq!(country, "DE");
}

#[test]
fn vat_set_upserts_on_country_and_start_date() {
    let conn = base_conn();
    run_vat(
        &conn,
        &["set", "--country", "gb", "--rate", "0.20", "--from", "2020-01-01"],
    )
    .unwrap();
    run_vat(
        &conn,
        &["set", "--country", "GB", "--rate", "0.175", "--from", "2020-01-01"],
    )
    .unwrap();

    let (count, rate): (i64, String) = conn
        .query_row("SELECT COUNT(*), rate FROM vat_rates", [], |r| {
            Ok((r.get(0)?, r.get(1)?))
        })
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(rate, "0.175");
}
