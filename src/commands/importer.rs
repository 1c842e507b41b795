// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::utils::{parse_date, parse_money};
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use rusqlite::{Connection, params};

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("contributions", sub)) => import_contributions(conn, sub),
        _ => Ok(()),
    }
}

/// CSV columns: date, investor, fund, amount, deal_id, deal_code, deal_name,
/// distributor, referrer, partner. Trailing columns optional.
fn import_contributions(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let path = sub.get_one::<String>("path").unwrap().trim();
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Open CSV {}", path))?;

    let tx = conn.transaction()?;
    let mut imported = 0usize;

    for result in rdr.records() {
        let rec = result?;
        let date_raw = rec.get(0).context("date missing")?.trim().to_string();
        let investor = rec.get(1).context("investor missing")?.trim().to_string();
        let fund = rec.get(2).context("fund missing")?.trim().to_string();
        let amount_raw = rec.get(3).context("amount missing")?.trim().to_string();

        let opt = |i: usize| -> Option<String> {
            rec.get(i)
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
        };
        let deal_id = opt(4);
        let deal_code = opt(5);
        let deal_name = opt(6);
        let distributor = opt(7);
        let referrer = opt(8);
        let partner = opt(9);

        let date = parse_date(&date_raw)
            .with_context(|| format!("Invalid contribution date '{}'", date_raw))?;
        let amount = parse_money(&amount_raw)
            .with_context(|| format!("Invalid amount '{}' for {}", amount_raw, investor))?;

        tx.execute(
            "INSERT INTO contributions(investor, fund, deal_id, deal_code, deal_name,
                 amount, date, distributor, referrer, partner)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                investor,
                fund,
                deal_id,
                deal_code,
                deal_name,
                amount.to_string(),
                date.to_string(),
                distributor,
                referrer,
                partner,
            ],
        )?;
        imported += 1;
    }

    tx.commit()?;
    println!("Imported {} contributions from {}", imported, path);
    Ok(())
}
