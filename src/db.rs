// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;

static APP: Lazy<(&str, &str, &str)> = Lazy::new(|| ("com.alphavelocity", "Feeclip", "feeclip"));

pub fn db_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("feeclip.sqlite"))
}

pub fn open_or_init() -> Result<Connection> {
    let path = db_path()?;
    let mut conn =
        Connection::open(&path).with_context(|| format!("Open DB at {}", path.display()))?;
    init_schema(&mut conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS rules(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        entity_type TEXT NOT NULL CHECK(entity_type IN ('distributor','referrer','partner')),
        entity_name TEXT,
        rule_type TEXT NOT NULL CHECK(rule_type IN ('percentage','fixed_amount','tiered','hybrid','conditional')),
        base_rate TEXT,
        fixed_amount TEXT,
        min_amount TEXT,
        max_amount TEXT,
        calculation_basis TEXT NOT NULL DEFAULT 'distribution_amount',
        applies_scope TEXT NOT NULL CHECK(applies_scope IN ('fund','deal')),
        deal_id TEXT,
        fund TEXT,
        priority INTEGER NOT NULL DEFAULT 0,
        vat_mode TEXT NOT NULL CHECK(vat_mode IN ('included','on_top')),
        vat_country TEXT,
        tier_mode TEXT CHECK(tier_mode IN ('stepped','threshold')),
        version INTEGER NOT NULL DEFAULT 1,
        archived INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS rule_tiers(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        rule_id INTEGER NOT NULL,
        tier_order INTEGER NOT NULL,
        min_threshold TEXT NOT NULL,
        max_threshold TEXT,
        rate TEXT NOT NULL DEFAULT '0',
        fixed_amount TEXT,
        description TEXT,
        UNIQUE(rule_id, tier_order),
        FOREIGN KEY(rule_id) REFERENCES rules(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS rule_conditions(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        rule_id INTEGER NOT NULL,
        cond_order INTEGER NOT NULL,
        min_amount TEXT,
        max_amount TEXT,
        rate TEXT NOT NULL,
        description TEXT,
        UNIQUE(rule_id, cond_order),
        FOREIGN KEY(rule_id) REFERENCES rules(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS vat_rates(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        country TEXT NOT NULL,
        rate TEXT NOT NULL,
        effective_from TEXT NOT NULL,
        effective_to TEXT,
        is_default INTEGER NOT NULL DEFAULT 0,
        UNIQUE(country, effective_from)
    );

    CREATE TABLE IF NOT EXISTS credits(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        investor TEXT NOT NULL,
        fund TEXT,
        scope TEXT NOT NULL CHECK(scope IN ('fund','deal')),
        deal_id TEXT,
        original_balance TEXT NOT NULL,
        remaining_balance TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'active' CHECK(status IN ('active','exhausted')),
        date_posted TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS credit_applications(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id TEXT NOT NULL,
        credit_id INTEGER NOT NULL,
        contribution_id INTEGER NOT NULL,
        amount_applied TEXT NOT NULL,
        balance_after TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(credit_id) REFERENCES credits(id)
    );

    CREATE TABLE IF NOT EXISTS contributions(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        investor TEXT NOT NULL,
        fund TEXT NOT NULL,
        deal_id TEXT,
        deal_code TEXT,
        deal_name TEXT,
        amount TEXT NOT NULL,
        date TEXT NOT NULL,
        distributor TEXT,
        referrer TEXT,
        partner TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE INDEX IF NOT EXISTS idx_contributions_date ON contributions(date);

    CREATE TABLE IF NOT EXISTS agreements(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        party TEXT NOT NULL,
        scope TEXT NOT NULL CHECK(scope IN ('fund','deal')),
        fund TEXT,
        deal_id TEXT,
        effective_from TEXT NOT NULL,
        effective_to TEXT,
        inherit_fund_rates INTEGER NOT NULL DEFAULT 0,
        upfront_override TEXT,
        deferred_override TEXT,
        track_key TEXT,
        vat_mode TEXT NOT NULL DEFAULT 'on_top' CHECK(vat_mode IN ('included','on_top'))
    );

    CREATE TABLE IF NOT EXISTS rate_tracks(
        key TEXT PRIMARY KEY,
        upfront_rate TEXT NOT NULL,
        deferred_rate TEXT NOT NULL,
        expected_min TEXT,
        expected_max TEXT
    );

    CREATE TABLE IF NOT EXISTS runs(
        id TEXT PRIMARY KEY,
        as_of TEXT NOT NULL,
        status TEXT NOT NULL,
        ruleset_version INTEGER NOT NULL,
        ruleset_checksum TEXT NOT NULL,
        total_gross TEXT NOT NULL,
        total_vat TEXT NOT NULL,
        total_net TEXT NOT NULL,
        warnings INTEGER NOT NULL DEFAULT 0,
        errors INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS fee_lines(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id TEXT NOT NULL,
        contribution_id INTEGER NOT NULL,
        rule_id INTEGER NOT NULL,
        rule_version INTEGER NOT NULL,
        entity_type TEXT NOT NULL,
        entity_name TEXT NOT NULL,
        base_amount TEXT NOT NULL,
        applied_rate TEXT,
        tier_applied TEXT,
        fee_gross TEXT NOT NULL,
        vat_rate TEXT NOT NULL,
        vat_amount TEXT NOT NULL,
        fee_net TEXT NOT NULL,
        total_payable TEXT NOT NULL,
        scope TEXT NOT NULL,
        deal_id TEXT,
        notes TEXT,
        FOREIGN KEY(run_id) REFERENCES runs(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_fee_lines_run ON fee_lines(run_id);

    -- Append-only audit copies of each rule as a run used it.
    CREATE TABLE IF NOT EXISTS rule_snapshots(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id TEXT NOT NULL,
        rule_id INTEGER NOT NULL,
        version INTEGER NOT NULL,
        payload TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    "#,
    )?;
    Ok(())
}
