// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::agreements::{active_agreements, resolve_rates};
use crate::engine::snapshot::AgreementRepository;
use crate::store::SqliteStore;
use crate::utils::{maybe_print_json, opt_str, parse_date, parse_rate, pretty_table};
use anyhow::{Result, anyhow};
use rusqlite::{Connection, params};
use serde::Serialize;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub),
        Some(("list", sub)) => list(conn, sub),
        Some(("rates", sub)) => rates(conn, sub),
        _ => Ok(()),
    }
}

fn add(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let party = sub.get_one::<String>("party").unwrap();
    let scope = sub.get_one::<String>("scope").unwrap();
    let fund = opt_str(sub.get_one::<String>("fund"));
    let deal_id = opt_str(sub.get_one::<String>("deal_id"));
    let from = parse_date(sub.get_one::<String>("from").unwrap())?;
    let to = sub
        .get_one::<String>("to")
        .map(|s| parse_date(s))
        .transpose()?;
    let inherit = sub.get_flag("inherit");
    let track = opt_str(sub.get_one::<String>("track"));
    let upfront = sub
        .get_one::<String>("upfront")
        .map(|s| parse_rate(s))
        .transpose()?;
    let deferred = sub
        .get_one::<String>("deferred")
        .map(|s| parse_rate(s))
        .transpose()?;
    let vat_mode = sub.get_one::<String>("vat_mode").unwrap();

    if scope == "deal" && deal_id.is_none() {
        return Err(anyhow!("A deal-scoped agreement requires --deal-id"));
    }
    if track.is_none() && upfront.is_none() && !inherit {
        return Err(anyhow!(
            "Agreement needs --track, rate overrides, or --inherit-fund-rates"
        ));
    }

    conn.execute(
        "INSERT INTO agreements(party, scope, fund, deal_id, effective_from, effective_to,
             inherit_fund_rates, upfront_override, deferred_override, track_key, vat_mode)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
        params![
            party,
            scope,
            fund,
            deal_id,
            from.to_string(),
            to.map(|d| d.to_string()),
            inherit as i64,
            upfront.map(|r| r.to_string()),
            deferred.map(|r| r.to_string()),
            track,
            vat_mode,
        ],
    )?;
    println!(
        "Added agreement {} for '{}' ({} scope, from {})",
        conn.last_insert_rowid(),
        party,
        scope,
        from
    );
    Ok(())
}

#[derive(Serialize)]
struct AgreementRow {
    id: i64,
    party: String,
    scope: String,
    fund: String,
    deal_id: String,
    effective_from: String,
    effective_to: String,
    inherit: bool,
    track_key: String,
    upfront_override: String,
    deferred_override: String,
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT id, party, scope, COALESCE(fund,''), COALESCE(deal_id,''), effective_from,
                COALESCE(effective_to,''), inherit_fund_rates, COALESCE(track_key,''),
                COALESCE(upfront_override,''), COALESCE(deferred_override,'')
         FROM agreements ORDER BY party, effective_from",
    )?;
    let mut rows = stmt.query([])?;
    let mut data = Vec::new();
    while let Some(r) = rows.next()? {
        data.push(AgreementRow {
            id: r.get(0)?,
            party: r.get(1)?,
            scope: r.get(2)?,
            fund: r.get(3)?,
            deal_id: r.get(4)?,
            effective_from: r.get(5)?,
            effective_to: r.get(6)?,
            inherit: r.get::<_, i64>(7)? != 0,
            track_key: r.get(8)?,
            upfront_override: r.get(9)?,
            deferred_override: r.get(10)?,
        });
    }
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|a| {
                vec![
                    a.id.to_string(),
                    a.party.clone(),
                    a.scope.clone(),
                    a.fund.clone(),
                    a.deal_id.clone(),
                    a.effective_from.clone(),
                    a.effective_to.clone(),
                    if a.inherit { "yes".into() } else { "".into() },
                    a.track_key.clone(),
                    a.upfront_override.clone(),
                    a.deferred_override.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &[
                    "ID", "Party", "Scope", "Fund", "Deal", "From", "To", "Inherit", "Track",
                    "Upfront", "Deferred"
                ],
                rows,
            )
        );
    }
    Ok(())
}

/// Resolve and print an agreement's effective rates via the engine resolver,
/// exactly as a calculation run would see them.
fn rates(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let id = *sub.get_one::<i64>("id").unwrap();
    let as_of = match sub.get_one::<String>("as_of") {
        Some(s) => parse_date(s)?,
        None => chrono::Local::now().date_naive(),
    };

    let store = SqliteStore::new(conn);
    let agreements = store.active_agreements(as_of)?;
    let tracks = store.rate_tracks()?;
    let agreement = agreements
        .iter()
        .find(|a| a.id == id)
        .ok_or_else(|| anyhow!("Agreement {} not found or not active on {}", id, as_of))?;

    let active = active_agreements(&agreements, as_of);
    let resolved = resolve_rates(agreement, &active, &tracks)?;
    println!(
        "Agreement {} ('{}'): upfront {}, deferred {}{}",
        id,
        agreement.party,
        resolved.upfront,
        resolved.deferred,
        resolved
            .track_key
            .as_deref()
            .map(|k| format!(" (track '{}')", k))
            .unwrap_or_default()
    );
    Ok(())
}
