// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::CONTRIBUTION_BASIS;
use crate::utils::{parse_decimal, pretty_table};
use anyhow::Result;
use rusqlite::Connection;
use rust_decimal::Decimal;

pub fn handle(conn: &Connection) -> Result<()> {
    let mut rows = Vec::new();

    // 1) Rules on an unsupported calculation basis
    let mut stmt = conn.prepare(
        "SELECT id, calculation_basis FROM rules WHERE archived=0 AND calculation_basis != ?1",
    )?;
    let mut cur = stmt.query([CONTRIBUTION_BASIS])?;
    while let Some(r) = cur.next()? {
        let id: i64 = r.get(0)?;
        let basis: String = r.get(1)?;
        rows.push(vec!["unsupported_basis".into(), format!("rule {} ({})", id, basis)]);
    }

    // 2) Scope and deal binding out of sync
    let mut stmt2 = conn.prepare(
        "SELECT id, scope, deal_id FROM rules WHERE archived=0
         AND ((scope='fund' AND deal_id IS NOT NULL) OR (scope='deal' AND deal_id IS NULL))",
    )?;
    let mut cur2 = stmt2.query([])?;
    while let Some(r) = cur2.next()? {
        let id: i64 = r.get(0)?;
        let scope: String = r.get(1)?;
        rows.push(vec!["scope_deal_mismatch".into(), format!("rule {} ({})", id, scope)]);
    }

    // 3) Tiered rules with no tier table, and malformed tier tables
    let mut stmt3 = conn.prepare(
        "SELECT r.id FROM rules r WHERE r.archived=0 AND r.rule_type IN ('tiered')
         AND NOT EXISTS (SELECT 1 FROM rule_tiers t WHERE t.rule_id=r.id)",
    )?;
    let mut cur3 = stmt3.query([])?;
    while let Some(r) = cur3.next()? {
        let id: i64 = r.get(0)?;
        rows.push(vec!["tiered_rule_no_tiers".into(), format!("rule {}", id)]);
    }
    check_tier_tables(conn, &mut rows)?;

    // 4) No default VAT rate to fall back on
    let defaults: i64 =
        conn.query_row("SELECT COUNT(*) FROM vat_rates WHERE is_default=1", [], |r| r.get(0))?;
    if defaults == 0 {
        rows.push(vec![
            "no_default_vat".into(),
            "runs will fail for contributions without a country rate".into(),
        ]);
    }

    // 5) Agreements pointing at tracks that do not exist
    let mut stmt5 = conn.prepare(
        "SELECT a.id, a.track_key FROM agreements a
         WHERE a.track_key IS NOT NULL
           AND NOT EXISTS (SELECT 1 FROM rate_tracks t WHERE t.key=a.track_key)",
    )?;
    let mut cur5 = stmt5.query([])?;
    while let Some(r) = cur5.next()? {
        let id: i64 = r.get(0)?;
        let key: String = r.get(1)?;
        rows.push(vec!["missing_track".into(), format!("agreement {} -> '{}'", id, key)]);
    }

    // 6) Credits driven below zero (should be impossible)
    let mut stmt6 = conn.prepare(
        "SELECT id, remaining_balance FROM credits WHERE CAST(remaining_balance AS REAL) < 0",
    )?;
    let mut cur6 = stmt6.query([])?;
    while let Some(r) = cur6.next()? {
        let id: i64 = r.get(0)?;
        let bal: String = r.get(1)?;
        rows.push(vec!["negative_credit".into(), format!("credit {} ({})", id, bal)]);
    }

    // 7) Contributions naming a party no active rule or agreement covers
    let mut stmt7 = conn.prepare(
        "SELECT DISTINCT name FROM (
            SELECT distributor AS name FROM contributions WHERE distributor IS NOT NULL
            UNION SELECT referrer FROM contributions WHERE referrer IS NOT NULL
            UNION SELECT partner FROM contributions WHERE partner IS NOT NULL)
         WHERE name NOT IN (SELECT entity_name FROM rules WHERE archived=0 AND entity_name IS NOT NULL)
           AND name NOT IN (SELECT party FROM agreements)
           AND NOT EXISTS (SELECT 1 FROM rules WHERE archived=0 AND entity_name IS NULL)",
    )?;
    let mut cur7 = stmt7.query([])?;
    while let Some(r) = cur7.next()? {
        let name: String = r.get(0)?;
        rows.push(vec!["party_uncovered".into(), name]);
    }

    if rows.is_empty() {
        println!("doctor: no issues found");
    } else {
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}

/// Tier tables must ascend contiguously with at most one open-ended top band.
fn check_tier_tables(conn: &Connection, rows: &mut Vec<Vec<String>>) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT rule_id, tier_order, min_threshold, max_threshold
         FROM rule_tiers ORDER BY rule_id, tier_order",
    )?;
    let mut cur = stmt.query([])?;
    let mut prev: Option<(i64, Option<Decimal>)> = None;
    while let Some(r) = cur.next()? {
        let rule_id: i64 = r.get(0)?;
        let order: i64 = r.get(1)?;
        let min = parse_decimal(&r.get::<_, String>(2)?)?;
        let max = r
            .get::<_, Option<String>>(3)?
            .map(|s| parse_decimal(&s))
            .transpose()?;

        if let Some(max) = max {
            if max <= min {
                rows.push(vec![
                    "tier_empty_band".into(),
                    format!("rule {} tier {}: max {} <= min {}", rule_id, order, max, min),
                ]);
            }
        }
        match prev {
            Some((prev_rule, prev_max)) if prev_rule == rule_id => match prev_max {
                None => rows.push(vec![
                    "tier_after_unbounded".into(),
                    format!("rule {} tier {}", rule_id, order),
                ]),
                Some(prev_max) if prev_max != min => rows.push(vec![
                    "tier_gap_or_overlap".into(),
                    format!("rule {} tier {}: starts at {}, expected {}", rule_id, order, min, prev_max),
                ]),
                _ => {}
            },
            _ => {}
        }
        prev = Some((rule_id, max));
    }
    Ok(())
}
