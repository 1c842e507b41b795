// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::calc::CalculationOutput;
use crate::engine::snapshot::{
    AgreementRepository, CreditRepository, RuleRepository, VatRateRepository,
};
use crate::models::{
    Agreement, CommissionRule, CommissionTier, Contribution, Credit, CreditStatus, EntityType,
    RateTrack, RuleCondition, RuleKind, Scope, TierMode, VatMode, VatRate,
};
use crate::utils::{parse_date, parse_decimal, parse_money};
use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

/// SQLite-backed implementation of the engine's repository traits, plus run
/// persistence. Callers that need all-or-nothing semantics hand this a
/// transaction's connection.
pub struct SqliteStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        SqliteStore { conn }
    }

    pub fn contributions(
        &self,
        fund: Option<&str>,
        month: Option<&str>,
    ) -> Result<Vec<Contribution>> {
        let mut sql = String::from(
            "SELECT id, investor, fund, deal_id, deal_code, deal_name, amount, date,
                    distributor, referrer, partner
             FROM contributions WHERE 1=1",
        );
        let mut args: Vec<String> = Vec::new();
        if let Some(f) = fund {
            sql.push_str(" AND fund=?");
            args.push(f.to_string());
        }
        if let Some(m) = month {
            sql.push_str(" AND substr(date,1,7)=?");
            args.push(m.to_string());
        }
        sql.push_str(" ORDER BY date, id");

        let mut stmt = self.conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> =
            args.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
        let mut rows = stmt.query(rusqlite::params_from_iter(params))?;

        let mut out = Vec::new();
        while let Some(r) = rows.next()? {
            let amount: String = r.get(6)?;
            let date: String = r.get(7)?;
            out.push(Contribution {
                id: r.get(0)?,
                investor: r.get(1)?,
                fund: r.get(2)?,
                deal_id: r.get(3)?,
                deal_code: r.get(4)?,
                deal_name: r.get(5)?,
                amount: parse_money(&amount)?,
                date: parse_date(&date)?,
                distributor: r.get(8)?,
                referrer: r.get(9)?,
                partner: r.get(10)?,
            });
        }
        Ok(out)
    }

    fn tiers_for_rule(&self, rule_id: i64) -> Result<Vec<CommissionTier>> {
        let mut stmt = self.conn.prepare(
            "SELECT tier_order, min_threshold, max_threshold, rate, fixed_amount, description
             FROM rule_tiers WHERE rule_id=?1 ORDER BY tier_order",
        )?;
        let mut rows = stmt.query(params![rule_id])?;
        let mut tiers = Vec::new();
        while let Some(r) = rows.next()? {
            let min: String = r.get(1)?;
            let max: Option<String> = r.get(2)?;
            let rate: String = r.get(3)?;
            let fixed: Option<String> = r.get(4)?;
            tiers.push(CommissionTier {
                tier_order: r.get(0)?,
                min_threshold: parse_money(&min)?,
                max_threshold: max.as_deref().map(parse_money).transpose()?,
                rate: parse_decimal(&rate)?,
                fixed_amount: fixed.as_deref().map(parse_money).transpose()?,
                description: r.get(5)?,
            });
        }
        Ok(tiers)
    }

    fn conditions_for_rule(&self, rule_id: i64) -> Result<Vec<RuleCondition>> {
        let mut stmt = self.conn.prepare(
            "SELECT cond_order, min_amount, max_amount, rate, description
             FROM rule_conditions WHERE rule_id=?1 ORDER BY cond_order",
        )?;
        let mut rows = stmt.query(params![rule_id])?;
        let mut conds = Vec::new();
        while let Some(r) = rows.next()? {
            let min: Option<String> = r.get(1)?;
            let max: Option<String> = r.get(2)?;
            let rate: String = r.get(3)?;
            conds.push(RuleCondition {
                cond_order: r.get(0)?,
                min_amount: min.as_deref().map(parse_money).transpose()?,
                max_amount: max.as_deref().map(parse_money).transpose()?,
                rate: parse_decimal(&rate)?,
                description: r.get(4)?,
            });
        }
        Ok(conds)
    }

    /// Persist the run, its fee lines, credit applications, and updated
    /// credit balances. Run inside a transaction together with the rule
    /// snapshot writes so an aborted run leaves no trace.
    pub fn persist_run(&self, output: &CalculationOutput) -> Result<()> {
        self.conn.execute(
            "INSERT INTO runs(id, as_of, status, ruleset_version, ruleset_checksum,
                              total_gross, total_vat, total_net, warnings, errors)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                output.run_id,
                output.as_of.to_string(),
                output.state.as_str(),
                output.ruleset_version,
                output.ruleset_checksum,
                output.total_gross.to_string(),
                output.total_vat.to_string(),
                output.total_net.to_string(),
                output.warnings.len() as i64,
                output.errors.len() as i64,
            ],
        )?;

        for line in &output.lines {
            self.conn.execute(
                "INSERT INTO fee_lines(run_id, contribution_id, rule_id, rule_version,
                     entity_type, entity_name, base_amount, applied_rate, tier_applied,
                     fee_gross, vat_rate, vat_amount, fee_net, total_payable, scope,
                     deal_id, notes)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17)",
                params![
                    output.run_id,
                    line.contribution_id,
                    line.rule_id,
                    line.rule_version,
                    line.entity_type.as_str(),
                    line.entity_name,
                    line.base_amount.to_string(),
                    line.applied_rate.map(|r| r.to_string()),
                    line.tier_applied,
                    line.fee_gross.to_string(),
                    line.vat_rate.to_string(),
                    line.vat_amount.to_string(),
                    line.fee_net.to_string(),
                    line.total_payable.to_string(),
                    line.scope.as_str(),
                    line.deal_id,
                    line.notes.join("; "),
                ],
            )?;
            for app in &line.credits_applied {
                self.conn.execute(
                    "INSERT INTO credit_applications(run_id, credit_id, contribution_id,
                         amount_applied, balance_after)
                     VALUES (?1,?2,?3,?4,?5)",
                    params![
                        output.run_id,
                        app.credit_id,
                        line.contribution_id,
                        app.amount_applied.to_string(),
                        app.balance_after.to_string(),
                    ],
                )?;
            }
        }

        for credit in &output.credits {
            self.conn.execute(
                "UPDATE credits SET remaining_balance=?1, status=?2 WHERE id=?3",
                params![
                    credit.remaining_balance.to_string(),
                    credit.status.as_str(),
                    credit.id,
                ],
            )?;
        }
        Ok(())
    }

    pub fn runs(&self) -> Result<Vec<RunRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, as_of, status, ruleset_version, ruleset_checksum,
                    total_gross, total_vat, total_net, warnings, errors, created_at
             FROM runs ORDER BY created_at DESC, id DESC",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(r) = rows.next()? {
            out.push(RunRow {
                id: r.get(0)?,
                as_of: r.get(1)?,
                status: r.get(2)?,
                ruleset_version: r.get(3)?,
                ruleset_checksum: r.get(4)?,
                total_gross: r.get(5)?,
                total_vat: r.get(6)?,
                total_net: r.get(7)?,
                warnings: r.get(8)?,
                errors: r.get(9)?,
                created_at: r.get(10)?,
            });
        }
        Ok(out)
    }

    pub fn run(&self, run_id: &str) -> Result<RunRow> {
        let mut stmt = self.conn.prepare(
            "SELECT id, as_of, status, ruleset_version, ruleset_checksum,
                    total_gross, total_vat, total_net, warnings, errors, created_at
             FROM runs WHERE id=?1",
        )?;
        stmt.query_row(params![run_id], |r| {
            Ok(RunRow {
                id: r.get(0)?,
                as_of: r.get(1)?,
                status: r.get(2)?,
                ruleset_version: r.get(3)?,
                ruleset_checksum: r.get(4)?,
                total_gross: r.get(5)?,
                total_vat: r.get(6)?,
                total_net: r.get(7)?,
                warnings: r.get(8)?,
                errors: r.get(9)?,
                created_at: r.get(10)?,
            })
        })
        .optional()?
        .ok_or_else(|| anyhow!("Run '{}' not found", run_id))
    }

    pub fn fee_lines(&self, run_id: &str) -> Result<Vec<FeeLineRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT contribution_id, rule_id, rule_version, entity_type, entity_name,
                    base_amount, applied_rate, tier_applied, fee_gross, vat_rate,
                    vat_amount, fee_net, total_payable, scope, deal_id, notes
             FROM fee_lines WHERE run_id=?1 ORDER BY id",
        )?;
        let mut rows = stmt.query(params![run_id])?;
        let mut out = Vec::new();
        while let Some(r) = rows.next()? {
            out.push(FeeLineRow {
                contribution_id: r.get(0)?,
                rule_id: r.get(1)?,
                rule_version: r.get(2)?,
                entity_type: r.get(3)?,
                entity_name: r.get(4)?,
                base_amount: r.get(5)?,
                applied_rate: r.get::<_, Option<String>>(6)?.unwrap_or_default(),
                tier_applied: r.get::<_, Option<String>>(7)?.unwrap_or_default(),
                fee_gross: r.get(8)?,
                vat_rate: r.get(9)?,
                vat_amount: r.get(10)?,
                fee_net: r.get(11)?,
                total_payable: r.get(12)?,
                scope: r.get(13)?,
                deal_id: r.get::<_, Option<String>>(14)?.unwrap_or_default(),
                notes: r.get::<_, Option<String>>(15)?.unwrap_or_default(),
            });
        }
        Ok(out)
    }
}

#[derive(Serialize)]
pub struct RunRow {
    pub id: String,
    pub as_of: String,
    pub status: String,
    pub ruleset_version: i64,
    pub ruleset_checksum: String,
    pub total_gross: String,
    pub total_vat: String,
    pub total_net: String,
    pub warnings: i64,
    pub errors: i64,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct FeeLineRow {
    pub contribution_id: i64,
    pub rule_id: i64,
    pub rule_version: i64,
    pub entity_type: String,
    pub entity_name: String,
    pub base_amount: String,
    pub applied_rate: String,
    pub tier_applied: String,
    pub fee_gross: String,
    pub vat_rate: String,
    pub vat_amount: String,
    pub fee_net: String,
    pub total_payable: String,
    pub scope: String,
    pub deal_id: String,
    pub notes: String,
}

fn parse_entity_type(s: &str) -> Result<EntityType> {
    EntityType::parse(s).ok_or_else(|| anyhow!("Unknown entity type '{}'", s))
}

fn parse_scope(s: &str) -> Result<Scope> {
    Scope::parse(s).ok_or_else(|| anyhow!("Unknown scope '{}'", s))
}

fn parse_vat_mode(s: &str) -> Result<VatMode> {
    VatMode::parse(s).ok_or_else(|| anyhow!("Unknown VAT mode '{}'", s))
}

impl RuleRepository for SqliteStore<'_> {
    fn active_rules(&self) -> Result<Vec<CommissionRule>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, entity_type, entity_name, rule_type, base_rate, fixed_amount,
                    min_amount, max_amount, calculation_basis, applies_scope, deal_id,
                    fund, priority, vat_mode, vat_country, tier_mode, version
             FROM rules WHERE archived=0 ORDER BY id",
        )?;
        let mut rows = stmt.query([])?;

        struct Raw {
            id: i64,
            entity_type: String,
            entity_name: Option<String>,
            rule_type: String,
            base_rate: Option<String>,
            fixed_amount: Option<String>,
            min_amount: Option<String>,
            max_amount: Option<String>,
            calculation_basis: String,
            applies_scope: String,
            deal_id: Option<String>,
            fund: Option<String>,
            priority: i32,
            vat_mode: String,
            vat_country: Option<String>,
            tier_mode: Option<String>,
            version: i32,
        }

        let mut raws = Vec::new();
        while let Some(r) = rows.next()? {
            raws.push(Raw {
                id: r.get(0)?,
                entity_type: r.get(1)?,
                entity_name: r.get(2)?,
                rule_type: r.get(3)?,
                base_rate: r.get(4)?,
                fixed_amount: r.get(5)?,
                min_amount: r.get(6)?,
                max_amount: r.get(7)?,
                calculation_basis: r.get(8)?,
                applies_scope: r.get(9)?,
                deal_id: r.get(10)?,
                fund: r.get(11)?,
                priority: r.get(12)?,
                vat_mode: r.get(13)?,
                vat_country: r.get(14)?,
                tier_mode: r.get(15)?,
                version: r.get(16)?,
            });
        }

        let mut out = Vec::new();
        for raw in raws {
            let base_rate = raw.base_rate.as_deref().map(parse_decimal).transpose()?;
            let fixed = raw.fixed_amount.as_deref().map(parse_money).transpose()?;
            let kind = match raw.rule_type.as_str() {
                "percentage" => RuleKind::Percentage { rate: base_rate },
                "fixed_amount" => RuleKind::FixedAmount {
                    amount: fixed
                        .ok_or_else(|| anyhow!("rule {} has no fixed amount", raw.id))?,
                },
                "tiered" => {
                    let mode = match raw.tier_mode.as_deref() {
                        Some(m) => TierMode::parse(m)
                            .ok_or_else(|| anyhow!("Unknown tier mode '{}'", m))?,
                        None => TierMode::Stepped,
                    };
                    RuleKind::Tiered {
                        mode,
                        tiers: self.tiers_for_rule(raw.id)?,
                    }
                }
                "hybrid" => RuleKind::Hybrid {
                    rate: base_rate,
                    amount: fixed
                        .ok_or_else(|| anyhow!("rule {} has no fixed amount", raw.id))?,
                },
                "conditional" => RuleKind::Conditional {
                    conditions: self.conditions_for_rule(raw.id)?,
                    fallback_rate: base_rate,
                },
                other => return Err(anyhow!("Unknown rule type '{}'", other)),
            };
            out.push(CommissionRule {
                id: raw.id,
                entity_type: parse_entity_type(&raw.entity_type)?,
                entity_name: raw.entity_name,
                kind,
                min_amount: raw.min_amount.as_deref().map(parse_money).transpose()?,
                max_amount: raw.max_amount.as_deref().map(parse_money).transpose()?,
                calculation_basis: raw.calculation_basis,
                scope: parse_scope(&raw.applies_scope)?,
                deal_id: raw.deal_id,
                fund: raw.fund,
                priority: raw.priority,
                vat_mode: parse_vat_mode(&raw.vat_mode)?,
                vat_country: raw.vat_country,
                version: raw.version,
            });
        }
        Ok(out)
    }

    fn persist_snapshot(&self, run_id: &str, rules: &[CommissionRule]) -> Result<()> {
        for rule in rules {
            let payload =
                serde_json::to_string(rule).context("Serialize rule snapshot payload")?;
            self.conn.execute(
                "INSERT INTO rule_snapshots(run_id, rule_id, version, payload)
                 VALUES (?1,?2,?3,?4)",
                params![run_id, rule.id, rule.version, payload],
            )?;
        }
        Ok(())
    }
}

impl VatRateRepository for SqliteStore<'_> {
    fn vat_rates(&self) -> Result<Vec<VatRate>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, country, rate, effective_from, effective_to, is_default FROM vat_rates",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(r) = rows.next()? {
            let rate: String = r.get(2)?;
            let from: String = r.get(3)?;
            let to: Option<String> = r.get(4)?;
            out.push(VatRate {
                id: r.get(0)?,
                country: r.get(1)?,
                rate: parse_decimal(&rate)?,
                effective_from: parse_date(&from)?,
                effective_to: to.as_deref().map(parse_date).transpose()?,
                is_default: r.get::<_, i64>(5)? != 0,
            });
        }
        Ok(out)
    }
}

impl CreditRepository for SqliteStore<'_> {
    fn active_credits(&self, investors: &[String]) -> Result<Vec<Credit>> {
        if investors.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; investors.len()].join(",");
        let sql = format!(
            "SELECT id, investor, fund, scope, deal_id, original_balance,
                    remaining_balance, status, date_posted
             FROM credits WHERE status='active' AND investor IN ({})",
            placeholders
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> =
            investors.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
        let mut rows = stmt.query(rusqlite::params_from_iter(params))?;

        let mut out = Vec::new();
        while let Some(r) = rows.next()? {
            let scope: String = r.get(3)?;
            let original: String = r.get(5)?;
            let remaining: String = r.get(6)?;
            let status: String = r.get(7)?;
            let posted: String = r.get(8)?;
            let credit = Credit {
                id: r.get(0)?,
                investor: r.get(1)?,
                fund: r.get(2)?,
                scope: parse_scope(&scope)?,
                deal_id: r.get(4)?,
                original_balance: parse_money(&original)?,
                remaining_balance: parse_money(&remaining)?,
                status: CreditStatus::parse(&status)
                    .ok_or_else(|| anyhow!("Unknown credit status '{}'", status))?,
                date_posted: parse_date(&posted)?,
            };
            if credit.remaining_balance.is_positive() {
                out.push(credit);
            }
        }
        Ok(out)
    }
}

impl AgreementRepository for SqliteStore<'_> {
    fn active_agreements(&self, as_of: NaiveDate) -> Result<Vec<Agreement>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, party, scope, fund, deal_id, effective_from, effective_to,
                    inherit_fund_rates, upfront_override, deferred_override, track_key, vat_mode
             FROM agreements
             WHERE effective_from <= ?1 AND (effective_to IS NULL OR effective_to >= ?1)",
        )?;
        let mut rows = stmt.query(params![as_of.to_string()])?;
        let mut out = Vec::new();
        while let Some(r) = rows.next()? {
            let scope: String = r.get(2)?;
            let from: String = r.get(5)?;
            let to: Option<String> = r.get(6)?;
            let upfront: Option<String> = r.get(8)?;
            let deferred: Option<String> = r.get(9)?;
            let vat_mode: String = r.get(11)?;
            out.push(Agreement {
                id: r.get(0)?,
                party: r.get(1)?,
                scope: parse_scope(&scope)?,
                fund: r.get(3)?,
                deal_id: r.get(4)?,
                effective_from: parse_date(&from)?,
                effective_to: to.as_deref().map(parse_date).transpose()?,
                inherit_fund_rates: r.get::<_, i64>(7)? != 0,
                upfront_override: upfront.as_deref().map(parse_decimal).transpose()?,
                deferred_override: deferred.as_deref().map(parse_decimal).transpose()?,
                track_key: r.get(10)?,
                vat_mode: parse_vat_mode(&vat_mode)?,
            });
        }
        Ok(out)
    }

    fn rate_tracks(&self) -> Result<Vec<RateTrack>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, upfront_rate, deferred_rate, expected_min, expected_max FROM rate_tracks",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(r) = rows.next()? {
            let upfront: String = r.get(1)?;
            let deferred: String = r.get(2)?;
            let min: Option<String> = r.get(3)?;
            let max: Option<String> = r.get(4)?;
            out.push(RateTrack {
                key: r.get(0)?,
                upfront_rate: parse_decimal(&upfront)?,
                deferred_rate: parse_decimal(&deferred)?,
                expected_min: min.as_deref().map(parse_money).transpose()?,
                expected_max: max.as_deref().map(parse_money).transpose()?,
            });
        }
        Ok(out)
    }
}
