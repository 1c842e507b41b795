// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::calc::{self, CalculationOutput};
use crate::engine::snapshot;
use crate::store::SqliteStore;
use crate::utils::{fmt_money, maybe_print_json, parse_date, pretty_table};
use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("calc", sub)) => run_calc(conn, sub),
        Some(("list", sub)) => list(conn, sub),
        Some(("show", sub)) => show(conn, sub),
        _ => Ok(()),
    }
}

fn run_calc(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let as_of = parse_date(sub.get_one::<String>("as_of").unwrap())?;
    let fund = sub.get_one::<String>("fund").map(|s| s.as_str());
    let month = sub.get_one::<String>("month").map(|s| s.as_str());
    let run_id = format!("run-{}", chrono::Utc::now().format("%Y%m%d-%H%M%S"));

    // The whole run, snapshot audit writes included, commits atomically.
    // An aborted run leaves the database untouched.
    let tx = conn.transaction()?;
    let output = {
        let store = SqliteStore::new(&tx);
        let contributions = store.contributions(fund, month)?;
        if contributions.is_empty() {
            println!("No contributions match; nothing to calculate.");
            return Ok(());
        }
        let mut investors: Vec<String> =
            contributions.iter().map(|c| c.investor.clone()).collect();
        investors.sort();
        investors.dedup();

        let ruleset = snapshot::load_rule_set(
            &run_id, &investors, as_of, &store, &store, &store, &store,
        )
        .context("Run aborted while loading the rule set; nothing was persisted")?;
        let output = calc::calculate(&contributions, &ruleset, &run_id, as_of)
            .context("Run aborted; nothing was persisted")?;
        store.persist_run(&output)?;
        output
    };
    tx.commit()?;

    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &output)? {
        return Ok(());
    }
    print_output(&output);
    Ok(())
}

fn print_output(output: &CalculationOutput) {
    let rows: Vec<Vec<String>> = output
        .lines
        .iter()
        .map(|l| {
            vec![
                l.contribution_id.to_string(),
                l.entity_type.to_string(),
                l.entity_name.clone(),
                fmt_money(&l.base_amount),
                fmt_money(&l.fee_gross),
                fmt_money(&l.vat_amount),
                fmt_money(&l.fee_net),
                fmt_money(&l.total_payable),
                l.scope.to_string(),
                l.deal_id.clone().unwrap_or_default(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &[
                "Contrib", "Entity", "Name", "Base", "Gross", "VAT", "Net", "Payable",
                "Scope", "Deal"
            ],
            rows,
        )
    );
    println!(
        "Run {} [{}] ruleset v{} checksum {}",
        output.run_id,
        output.state.as_str(),
        output.ruleset_version,
        &output.ruleset_checksum[..12.min(output.ruleset_checksum.len())]
    );
    println!(
        "Totals: gross {}, VAT {}, net {}",
        fmt_money(&output.total_gross),
        fmt_money(&output.total_vat),
        fmt_money(&output.total_net)
    );
    println!(
        "Fund scope: {} lines, gross {} | Deal scope: {} lines, gross {}",
        output.fund_totals.count,
        fmt_money(&output.fund_totals.gross),
        output.deal_totals.count,
        fmt_money(&output.deal_totals.gross)
    );
    for w in &output.warnings {
        println!("warning: {}", w.message);
    }
    for e in &output.errors {
        println!(
            "error: contribution {} {} '{}': {}",
            e.contribution_id, e.entity_type, e.entity_name, e.reason
        );
    }
    if !output.errors.is_empty() || !output.warnings.is_empty() {
        println!(
            "{} warning(s), {} error(s); review before approval",
            output.warnings.len(),
            output.errors.len()
        );
    }
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let store = SqliteStore::new(conn);
    let runs = store.runs()?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &runs)? {
        let rows: Vec<Vec<String>> = runs
            .iter()
            .map(|r| {
                vec![
                    r.id.clone(),
                    r.as_of.clone(),
                    r.status.clone(),
                    r.total_gross.clone(),
                    r.total_vat.clone(),
                    r.total_net.clone(),
                    r.warnings.to_string(),
                    r.errors.to_string(),
                    r.created_at.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &[
                    "Run", "As of", "Status", "Gross", "VAT", "Net", "Warn", "Err", "Created"
                ],
                rows,
            )
        );
    }
    Ok(())
}

fn show(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let run_id = sub.get_one::<String>("id").unwrap();
    let store = SqliteStore::new(conn);
    let run = store.run(run_id)?;
    let lines = store.fee_lines(run_id)?;

    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &lines)? {
        return Ok(());
    }
    println!(
        "Run {} as of {} [{}] ruleset v{} checksum {}",
        run.id, run.as_of, run.status, run.ruleset_version, run.ruleset_checksum
    );
    let rows: Vec<Vec<String>> = lines
        .iter()
        .map(|l| {
            vec![
                l.contribution_id.to_string(),
                l.entity_type.clone(),
                l.entity_name.clone(),
                l.base_amount.clone(),
                l.fee_gross.clone(),
                l.vat_amount.clone(),
                l.fee_net.clone(),
                l.total_payable.clone(),
                l.scope.clone(),
                l.deal_id.clone(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &[
                "Contrib", "Entity", "Name", "Base", "Gross", "VAT", "Net", "Payable",
                "Scope", "Deal"
            ],
            rows,
        )
    );
    println!(
        "Totals: gross {}, VAT {}, net {} ({} warnings, {} errors)",
        run.total_gross, run.total_vat, run.total_net, run.warnings, run.errors
    );
    Ok(())
}
