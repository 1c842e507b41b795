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
    let fund = sub.get_one::<String>("fund").unwrap();
    let amount = parse_money(sub.get_one::<String>("amount").unwrap())?;
    let date = parse_date(sub.get_one::<String>("date").unwrap())?;
    let deal_id = opt_str(sub.get_one::<String>("deal_id"));
    let deal_code = opt_str(sub.get_one::<String>("deal_code"));
    let deal_name = opt_str(sub.get_one::<String>("deal_name"));
    let distributor = opt_str(sub.get_one::<String>("distributor"));
    let referrer = opt_str(sub.get_one::<String>("referrer"));
    let partner = opt_str(sub.get_one::<String>("partner"));

    if !amount.is_positive() {
        return Err(anyhow!("Contribution amount must be positive, got {}", amount));
    }

    conn.execute(
        "INSERT INTO contributions(investor, fund, deal_id, deal_code, deal_name, amount,
             date, distributor, referrer, partner)
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
    println!(
        "Recorded contribution {} by '{}' into '{}' on {}",
        amount, investor, fund, date
    );
    Ok(())
}

#[derive(Serialize)]
pub struct ContributionRow {
    pub id: i64,
    pub date: String,
    pub investor: String,
    pub fund: String,
    pub deal_id: String,
    pub amount: String,
    pub distributor: String,
    pub referrer: String,
    pub partner: String,
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let mut sql = String::from(
        "SELECT id, date, investor, fund, COALESCE(deal_id,''), amount,
                COALESCE(distributor,''), COALESCE(referrer,''), COALESCE(partner,'')
         FROM contributions WHERE 1=1",
    );
    let mut args: Vec<String> = Vec::new();
    if let Some(fund) = sub.get_one::<String>("fund") {
        sql.push_str(" AND fund=?");
        args.push(fund.clone());
    }
    if let Some(month) = sub.get_one::<String>("month") {
        sql.push_str(" AND substr(date,1,7)=?");
        args.push(month.clone());
    }
    sql.push_str(" ORDER BY date DESC, id DESC");

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn rusqlite::ToSql> = args.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
    let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
    let mut data = Vec::new();
    while let Some(r) = rows.next()? {
        data.push(ContributionRow {
            id: r.get(0)?,
            date: r.get(1)?,
            investor: r.get(2)?,
            fund: r.get(3)?,
            deal_id: r.get(4)?,
            amount: r.get(5)?,
            distributor: r.get(6)?,
            referrer: r.get(7)?,
            partner: r.get(8)?,
        });
    }
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|c| {
                vec![
                    c.id.to_string(),
                    c.date.clone(),
                    c.investor.clone(),
                    c.fund.clone(),
                    c.deal_id.clone(),
                    c.amount.clone(),
                    c.distributor.clone(),
                    c.referrer.clone(),
                    c.partner.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &[
                    "ID", "Date", "Investor", "Fund", "Deal", "Amount", "Distributor",
                    "Referrer", "Partner"
                ],
                rows,
            )
        );
    }
    Ok(())
}
