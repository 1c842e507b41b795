// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::utils::{maybe_print_json, opt_str, parse_date, parse_money, pretty_table};
use anyhow::{Result, anyhow};
use rusqlite::{Connection, params};
use serde::Serialize;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub),
        Some(("list", sub)) => list(conn, sub),
        _ => Ok(()),
    }
}

fn add(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let investor = sub.get_one::<String>("investor").unwrap();
    let amount = parse_money(sub.get_one::<String>("amount").unwrap())?;
    let date = parse_date(sub.get_one::<String>("date").unwrap())?;
    let fund = opt_str(sub.get_one::<String>("fund"));
    let scope = sub.get_one::<String>("scope").unwrap();
    let deal_id = opt_str(sub.get_one::<String>("deal_id"));

    if !amount.is_positive() {
        return Err(anyhow!("Credit amount must be positive, got {}", amount));
    }
    if scope == "deal" && deal_id.is_none() {
        return Err(anyhow!("A deal-scoped credit requires --deal-id"));
    }

    conn.execute(
        "INSERT INTO credits(investor, fund, scope, deal_id, original_balance,
             remaining_balance, status, date_posted)
         VALUES (?1,?2,?3,?4,?5,?5,'active',?6)",
        params![
            investor,
            fund,
            scope,
            deal_id,
            amount.to_string(),
            date.to_string(),
        ],
    )?;
    println!(
        "Posted credit {} for '{}' ({} scope, {})",
        amount,
        investor,
        scope,
        date
    );
    Ok(())
}

#[derive(Serialize)]
struct CreditRow {
    id: i64,
    investor: String,
    fund: String,
    scope: String,
    deal_id: String,
    original_balance: String,
    remaining_balance: String,
    status: String,
    date_posted: String,
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let mut sql = String::from(
        "SELECT id, investor, COALESCE(fund,''), scope, COALESCE(deal_id,''),
                original_balance, remaining_balance, status, date_posted
         FROM credits WHERE 1=1",
    );
    let mut args: Vec<String> = Vec::new();
    if let Some(inv) = sub.get_one::<String>("investor") {
        sql.push_str(" AND investor=?");
        args.push(inv.clone());
    }
    sql.push_str(" ORDER BY date_posted, id");

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn rusqlite::ToSql> = args.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
    let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
    let mut data = Vec::new();
    while let Some(r) = rows.next()? {
        data.push(CreditRow {
            id: r.get(0)?,
            investor: r.get(1)?,
            fund: r.get(2)?,
            scope: r.get(3)?,
            deal_id: r.get(4)?,
            original_balance: r.get(5)?,
            remaining_balance: r.get(6)?,
            status: r.get(7)?,
            date_posted: r.get(8)?,
        });
    }
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|c| {
                vec![
                    c.id.to_string(),
                    c.investor.clone(),
                    c.fund.clone(),
                    c.scope.clone(),
                    c.deal_id.clone(),
                    c.original_balance.clone(),
                    c.remaining_balance.clone(),
                    c.status.clone(),
                    c.date_posted.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &[
                    "ID", "Investor", "Fund", "Scope", "Deal", "Original", "Remaining",
                    "Status", "Posted"
                ],
                rows,
            )
        );
    }
    Ok(())
}
