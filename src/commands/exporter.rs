// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::store::SqliteStore;
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("lines", sub)) => export_lines(conn, sub),
        _ => Ok(()),
    }
}

fn export_lines(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let run_id = sub.get_one::<String>("run").unwrap();
    let fmt = sub.get_one::<String>("format").unwrap().to_lowercase();
    let out = sub.get_one::<String>("out").unwrap();

    let store = SqliteStore::new(conn);
    let lines = store.fee_lines(run_id)?;

    match fmt.as_str() {
        "csv" => {
            let mut wtr = csv::Writer::from_path(out)?;
            wtr.write_record([
                "contribution_id",
                "entity_type",
                "entity_name",
                "rule_id",
                "base_amount",
                "applied_rate",
                "tier_applied",
                "fee_gross",
                "vat_rate",
                "vat_amount",
                "fee_net",
                "total_payable",
                "scope",
                "deal_id",
                "notes",
            ])?;
            for l in &lines {
                wtr.write_record([
                    l.contribution_id.to_string(),
                    l.entity_type.clone(),
                    l.entity_name.clone(),
                    l.rule_id.to_string(),
                    l.base_amount.clone(),
                    l.applied_rate.clone(),
                    l.tier_applied.clone(),
                    l.fee_gross.clone(),
                    l.vat_rate.clone(),
                    l.vat_amount.clone(),
                    l.fee_net.clone(),
                    l.total_payable.clone(),
                    l.scope.clone(),
                    l.deal_id.clone(),
                    l.notes.clone(),
                ])?;
            }
            wtr.flush()?;
        }
        "json" => {
            std::fs::write(out, serde_json::to_string_pretty(&lines)?)?;
        }
        _ => {
            eprintln!("Unknown format: {} (use csv|json)", fmt);
            return Ok(());
        }
    }
    println!("Exported {} fee lines of run {} to {}", lines.len(), run_id, out);
    Ok(())
}
