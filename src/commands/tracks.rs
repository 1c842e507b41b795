// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::utils::{maybe_print_json, parse_money, parse_rate, pretty_table};
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
    let key = sub.get_one::<String>("key").unwrap();
    let upfront = parse_rate(sub.get_one::<String>("upfront").unwrap())?;
    let deferred = parse_rate(sub.get_one::<String>("deferred").unwrap())?;
    let expected_min = sub
        .get_one::<String>("expected_min")
        .map(|s| parse_money(s))
        .transpose()?;
    let expected_max = sub
        .get_one::<String>("expected_max")
        .map(|s| parse_money(s))
        .transpose()?;

    conn.execute(
        "INSERT INTO rate_tracks(key, upfront_rate, deferred_rate, expected_min, expected_max)
         VALUES (?1,?2,?3,?4,?5)
         ON CONFLICT(key) DO UPDATE SET upfront_rate=excluded.upfront_rate,
             deferred_rate=excluded.deferred_rate, expected_min=excluded.expected_min,
             expected_max=excluded.expected_max",
        params![
            key,
            upfront.to_string(),
            deferred.to_string(),
            expected_min.map(|m| m.to_string()),
            expected_max.map(|m| m.to_string()),
        ],
    )?;
    println!("Track '{}': upfront {}, deferred {}", key, upfront, deferred);
    Ok(())
}

#[derive(Serialize)]
struct TrackRow {
    key: String,
    upfront_rate: String,
    deferred_rate: String,
    expected_min: String,
    expected_max: String,
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT key, upfront_rate, deferred_rate, COALESCE(expected_min,''),
                COALESCE(expected_max,'')
         FROM rate_tracks ORDER BY key",
    )?;
    let mut rows = stmt.query([])?;
    let mut data = Vec::new();
    while let Some(r) = rows.next()? {
        data.push(TrackRow {
            key: r.get(0)?,
            upfront_rate: r.get(1)?,
            deferred_rate: r.get(2)?,
            expected_min: r.get(3)?,
            expected_max: r.get(4)?,
        });
    }
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|t| {
                vec![
                    t.key.clone(),
                    t.upfront_rate.clone(),
                    t.deferred_rate.clone(),
                    t.expected_min.clone(),
                    t.expected_max.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Key", "Upfront", "Deferred", "Expected Min", "Expected Max"],
                rows,
            )
        );
    }
    Ok(())
}
