// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::CONTRIBUTION_BASIS;
use crate::utils::{maybe_print_json, opt_str, parse_money, parse_rate, pretty_table};
use anyhow::{Result, anyhow};
use rusqlite::{Connection, params};
use serde::Serialize;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub),
        Some(("list", sub)) => list(conn, sub),
        Some(("add-tier", sub)) => add_tier(conn, sub),
        Some(("add-condition", sub)) => add_condition(conn, sub),
        Some(("tiers", sub)) => tiers(conn, sub),
        Some(("archive", sub)) => archive(conn, sub),
        _ => Ok(()),
    }
}

fn add(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let entity_type = sub.get_one::<String>("entity_type").unwrap();
    let entity_name = opt_str(sub.get_one::<String>("entity_name"));
    let rule_type = sub.get_one::<String>("type").unwrap();
    let rate = sub
        .get_one::<String>("rate")
        .map(|s| parse_rate(s))
        .transpose()?;
    let fixed = sub
        .get_one::<String>("fixed_amount")
        .map(|s| parse_money(s))
        .transpose()?;
    let min = sub
        .get_one::<String>("min")
        .map(|s| parse_money(s))
        .transpose()?;
    let max = sub
        .get_one::<String>("max")
        .map(|s| parse_money(s))
        .transpose()?;
    let scope = sub.get_one::<String>("scope").unwrap();
    let deal_id = opt_str(sub.get_one::<String>("deal_id"));
    let fund = opt_str(sub.get_one::<String>("fund"));
    let priority = *sub.get_one::<i32>("priority").unwrap();
    let vat_mode = sub.get_one::<String>("vat_mode").unwrap();
    let vat_country = opt_str(sub.get_one::<String>("vat_country"));
    let tier_mode = sub.get_one::<String>("tier_mode").map(|s| s.to_string());

    // Catch the scope mistakes the engine would reject at snapshot time.
    if scope == "deal" && deal_id.is_none() {
        return Err(anyhow!("A deal-scoped rule requires --deal-id"));
    }
    if scope == "fund" && deal_id.is_some() {
        return Err(anyhow!("A fund-scoped rule must not carry --deal-id"));
    }
    if rule_type == "fixed_amount" || rule_type == "hybrid" {
        if fixed.is_none() {
            return Err(anyhow!("Rule type '{}' requires --fixed-amount", rule_type));
        }
    }

    conn.execute(
        "INSERT INTO rules(entity_type, entity_name, rule_type, base_rate, fixed_amount,
             min_amount, max_amount, calculation_basis, applies_scope, deal_id, fund,
             priority, vat_mode, vat_country, tier_mode)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
        params![
            entity_type,
            entity_name,
            rule_type,
            rate.map(|r| r.to_string()),
            fixed.map(|f| f.to_string()),
            min.map(|v| v.to_string()),
            max.map(|v| v.to_string()),
            CONTRIBUTION_BASIS,
            scope,
            deal_id,
            fund,
            priority,
            vat_mode,
            vat_country,
            tier_mode,
        ],
    )?;
    let id = conn.last_insert_rowid();
    println!(
        "Added rule {}: {} {} ({}, {} scope)",
        id,
        rule_type,
        entity_name.as_deref().unwrap_or("<any>"),
        entity_type,
        scope
    );
    Ok(())
}

#[derive(Serialize)]
struct RuleRow {
    id: i64,
    entity_type: String,
    entity_name: String,
    rule_type: String,
    base_rate: String,
    scope: String,
    deal_id: String,
    fund: String,
    priority: i64,
    vat_mode: String,
    version: i64,
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let include_archived = sub.get_flag("archived");
    let mut sql = String::from(
        "SELECT id, entity_type, COALESCE(entity_name,''), rule_type, COALESCE(base_rate,''),
                applies_scope, COALESCE(deal_id,''), COALESCE(fund,''), priority, vat_mode, version
         FROM rules WHERE 1=1",
    );
    if !include_archived {
        sql.push_str(" AND archived=0");
    }
    let mut args: Vec<String> = Vec::new();
    if let Some(et) = sub.get_one::<String>("entity_type") {
        sql.push_str(" AND entity_type=?");
        args.push(et.clone());
    }
    sql.push_str(" ORDER BY priority DESC, id");

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn rusqlite::ToSql> = args.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
    let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
    let mut data = Vec::new();
    while let Some(r) = rows.next()? {
        data.push(RuleRow {
            id: r.get(0)?,
            entity_type: r.get(1)?,
            entity_name: r.get(2)?,
            rule_type: r.get(3)?,
            base_rate: r.get(4)?,
            scope: r.get(5)?,
            deal_id: r.get(6)?,
            fund: r.get(7)?,
            priority: r.get(8)?,
            vat_mode: r.get(9)?,
            version: r.get(10)?,
        });
    }

    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| {
                vec![
                    r.id.to_string(),
                    r.entity_type.clone(),
                    r.entity_name.clone(),
                    r.rule_type.clone(),
                    r.base_rate.clone(),
                    r.scope.clone(),
                    r.deal_id.clone(),
                    r.fund.clone(),
                    r.priority.to_string(),
                    r.vat_mode.clone(),
                    r.version.to_string(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &[
                    "ID", "Entity", "Name", "Type", "Rate", "Scope", "Deal", "Fund", "Prio",
                    "VAT", "Ver"
                ],
                rows,
            )
        );
    }
    Ok(())
}

fn rule_exists(conn: &Connection, id: i64) -> Result<()> {
    let found: i64 = conn.query_row(
        "SELECT COUNT(*) FROM rules WHERE id=?1 AND archived=0",
        params![id],
        |r| r.get(0),
    )?;
    if found == 0 {
        return Err(anyhow!("Rule {} not found (or archived)", id));
    }
    Ok(())
}

/// Any change to a rule's bands is a new version of the rule.
fn bump_version(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("UPDATE rules SET version=version+1 WHERE id=?1", params![id])?;
    Ok(())
}

fn add_tier(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let rule_id = *sub.get_one::<i64>("rule").unwrap();
    rule_exists(conn, rule_id)?;
    let order = *sub.get_one::<i32>("order").unwrap();
    let min = parse_money(sub.get_one::<String>("min").unwrap())?;
    let max = sub
        .get_one::<String>("max")
        .map(|s| parse_money(s))
        .transpose()?;
    let rate = parse_rate(sub.get_one::<String>("rate").unwrap())?;
    let fixed = sub
        .get_one::<String>("fixed_amount")
        .map(|s| parse_money(s))
        .transpose()?;
    let description = opt_str(sub.get_one::<String>("description"));

    conn.execute(
        "INSERT INTO rule_tiers(rule_id, tier_order, min_threshold, max_threshold, rate,
             fixed_amount, description)
         VALUES (?1,?2,?3,?4,?5,?6,?7)",
        params![
            rule_id,
            order,
            min.to_string(),
            max.map(|m| m.to_string()),
            rate.to_string(),
            fixed.map(|f| f.to_string()),
            description,
        ],
    )?;
    bump_version(conn, rule_id)?;
    println!("Added tier {} to rule {}", order, rule_id);
    Ok(())
}

fn add_condition(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let rule_id = *sub.get_one::<i64>("rule").unwrap();
    rule_exists(conn, rule_id)?;
    let order = *sub.get_one::<i32>("order").unwrap();
    let min = sub
        .get_one::<String>("min")
        .map(|s| parse_money(s))
        .transpose()?;
    let max = sub
        .get_one::<String>("max")
        .map(|s| parse_money(s))
        .transpose()?;
    let rate = parse_rate(sub.get_one::<String>("rate").unwrap())?;
    let description = opt_str(sub.get_one::<String>("description"));

    conn.execute(
        "INSERT INTO rule_conditions(rule_id, cond_order, min_amount, max_amount, rate, description)
         VALUES (?1,?2,?3,?4,?5,?6)",
        params![
            rule_id,
            order,
            min.map(|m| m.to_string()),
            max.map(|m| m.to_string()),
            rate.to_string(),
            description,
        ],
    )?;
    bump_version(conn, rule_id)?;
    println!("Added condition {} to rule {}", order, rule_id);
    Ok(())
}

fn tiers(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let rule_id = *sub.get_one::<i64>("rule").unwrap();
    let mut stmt = conn.prepare(
        "SELECT tier_order, min_threshold, COALESCE(max_threshold,''), rate,
                COALESCE(fixed_amount,''), COALESCE(description,'')
         FROM rule_tiers WHERE rule_id=?1 ORDER BY tier_order",
    )?;
    let mut rows = stmt.query(params![rule_id])?;
    let mut data = Vec::new();
    while let Some(r) = rows.next()? {
        data.push(vec![
            r.get::<_, i64>(0)?.to_string(),
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
            r.get::<_, String>(5)?,
        ]);
    }
    println!(
        "{}",
        pretty_table(&["Order", "Min", "Max", "Rate", "Fixed", "Description"], data)
    );
    Ok(())
}

fn archive(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let rule_id = *sub.get_one::<i64>("rule").unwrap();
    rule_exists(conn, rule_id)?;
    conn.execute("UPDATE rules SET archived=1 WHERE id=?1", params![rule_id])?;
    println!("Archived rule {}", rule_id);
    Ok(())
}
