// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::utils::{maybe_print_json, parse_date, parse_rate, pretty_table};
use anyhow::Result;
use rusqlite::{Connection, params};
use serde::Serialize;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("set", sub)) => set(conn, sub),
        Some(("list", sub)) => list(conn, sub),
        _ => Ok(()),
    }
}

fn set(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let country = sub.get_one::<String>("country").unwrap().to_uppercase();
    let rate = parse_rate(sub.get_one::<String>("rate").unwrap())?;
    let from = parse_date(sub.get_one::<String>("from").unwrap())?;
    let to = sub
        .get_one::<String>("to")
        .map(|s| parse_date(s))
        .transpose()?;
    let is_default = sub.get_flag("default");

    if is_default {
        // Only one default row at a time.
        conn.execute("UPDATE vat_rates SET is_default=0", [])?;
    }
    conn.execute(
        "INSERT INTO vat_rates(country, rate, effective_from, effective_to, is_default)
         VALUES (?1,?2,?3,?4,?5)
         ON CONFLICT(country, effective_from)
         DO UPDATE SET rate=excluded.rate, effective_to=excluded.effective_to,
                       is_default=excluded.is_default",
        params![
            country,
            rate.to_string(),
            from.to_string(),
            to.map(|d| d.to_string()),
            is_default as i64,
        ],
    )?;
    println!(
        "VAT {} = {} from {}{}",
        country,
        rate,
        from,
        if is_default { " (default)" } else { "" }
    );
    Ok(())
}

#[derive(Serialize)]
struct VatRow {
    country: String,
    rate: String,
    effective_from: String,
    effective_to: String,
    is_default: bool,
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT country, rate, effective_from, COALESCE(effective_to,''), is_default
         FROM vat_rates ORDER BY country, effective_from",
    )?;
    let mut rows = stmt.query([])?;
    let mut data = Vec::new();
    while let Some(r) = rows.next()? {
        data.push(VatRow {
            country: r.get(0)?,
            rate: r.get(1)?,
            effective_from: r.get(2)?,
            effective_to: r.get(3)?,
            is_default: r.get::<_, i64>(4)? != 0,
        });
    }
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|v| {
                vec![
                    v.country.clone(),
                    v.rate.clone(),
                    v.effective_from.clone(),
                    v.effective_to.clone(),
                    if v.is_default { "yes".into() } else { "".into() },
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Country", "Rate", "From", "To", "Default"], rows)
        );
    }
    Ok(())
}
