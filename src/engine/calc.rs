// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::agreements;
use crate::engine::credits::CreditLedger;
use crate::engine::error::{EngineError, EntityError, LineError, LineFailure, RunWarning};
use crate::engine::money::Money;
use crate::engine::precedence;
use crate::engine::tiers;
use crate::engine::vat;
use crate::models::{
    CommissionRule, Contribution, Credit, EntityType, FeeLine, RuleKind, RuleSet, Scope,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// Run-level state machine. Aborted is reached only from a fatal
/// (configuration/invariant) failure; entity-level failures accumulate on an
/// otherwise completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    LoadingRuleset,
    ProcessingContributions,
    Aggregating,
    Completed,
    Aborted,
}

impl RunState {
    /// The only legal forward transition; terminal states stay put.
    pub fn advance(self) -> RunState {
        match self {
            RunState::LoadingRuleset => RunState::ProcessingContributions,
            RunState::ProcessingContributions => RunState::Aggregating,
            RunState::Aggregating => RunState::Completed,
            terminal => terminal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::LoadingRuleset => "loading_ruleset",
            RunState::ProcessingContributions => "processing_contributions",
            RunState::Aggregating => "aggregating",
            RunState::Completed => "completed",
            RunState::Aborted => "aborted",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScopeTotals {
    pub gross: Money,
    pub vat: Money,
    pub net: Money,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct CalculationOutput {
    pub run_id: String,
    pub as_of: NaiveDate,
    pub state: RunState,
    pub ruleset_version: i32,
    pub ruleset_checksum: String,
    pub lines: Vec<FeeLine>,
    pub total_gross: Money,
    pub total_vat: Money,
    pub total_net: Money,
    pub fund_totals: ScopeTotals,
    pub deal_totals: ScopeTotals,
    pub warnings: Vec<RunWarning>,
    pub errors: Vec<EntityError>,
    /// Credit states after consumption, for persistence.
    pub credits: Vec<Credit>,
}

/// Single-pass deterministic calculation over an immutable snapshot.
///
/// The snapshot is read-only throughout; the credit ledger is the run's only
/// mutable state and every consumption is serialized through it.
pub fn calculate(
    contributions: &[Contribution],
    ruleset: &RuleSet,
    run_id: &str,
    as_of: NaiveDate,
) -> Result<CalculationOutput, EngineError> {
    // The snapshot arrives already loaded; the machine starts past that gate.
    let mut state = RunState::LoadingRuleset.advance();
    let mut ledger = CreditLedger::new(ruleset.credits.clone());
    let mut lines: Vec<FeeLine> = Vec::new();
    let mut warnings: Vec<RunWarning> = Vec::new();
    let mut errors: Vec<EntityError> = Vec::new();
    for c in contributions {
        if !c.amount.is_positive() {
            warnings.push(RunWarning {
                contribution_id: Some(c.id),
                message: format!("contribution {} has non-positive amount {}, skipped", c.id, c.amount),
            });
            continue;
        }

        // One rule per role present on the contribution, in fixed role order.
        let mut selected: Vec<(EntityType, &str, &CommissionRule)> = Vec::new();
        for role in EntityType::ALL {
            let Some(name) = c.entity_name(role) else {
                continue;
            };
            let candidates: Vec<&CommissionRule> = ruleset
                .rules
                .iter()
                .filter(|r| r.entity_type == role)
                .filter(|r| r.entity_name.as_deref().map_or(true, |n| n == name))
                .collect();
            match precedence::find_applicable_rule(&candidates, c.deal_id.as_deref(), &c.fund) {
                Some(rule) => selected.push((role, name, rule)),
                None => warnings.push(RunWarning {
                    contribution_id: Some(c.id),
                    message: format!("no applicable rule for {} '{}'", role, name),
                }),
            }
        }

        let scopes: Vec<(EntityType, &str, Scope)> = selected
            .iter()
            .map(|(role, name, rule)| (*role, *name, rule.scope))
            .collect();
        precedence::validate_no_duplicate_scope(c.id, &scopes)?;

        for (role, name, rule) in selected {
            match compute_line(c, role, name, rule, ruleset, &mut ledger, &mut warnings) {
                Ok(line) => lines.push(line),
                Err(LineFailure::Entity(e)) => errors.push(EntityError {
                    contribution_id: c.id,
                    entity_type: role,
                    entity_name: name.to_string(),
                    reason: e.to_string(),
                }),
                Err(LineFailure::Fatal(e)) => return Err(e),
            }
        }
    }

    state = state.advance();
    let mut total_gross = Money::ZERO;
    let mut total_vat = Money::ZERO;
    let mut total_net = Money::ZERO;
    let mut fund_totals = ScopeTotals::default();
    let mut deal_totals = ScopeTotals::default();
    for line in &lines {
        total_gross += line.fee_gross;
        total_vat += line.vat_amount;
        total_net += line.fee_net;
        let bucket = match line.scope {
            Scope::Fund => &mut fund_totals,
            Scope::Deal => &mut deal_totals,
        };
        bucket.gross += line.fee_gross;
        bucket.vat += line.vat_amount;
        bucket.net += line.fee_net;
        bucket.count += 1;
    }

    state = state.advance();
    Ok(CalculationOutput {
        run_id: run_id.to_string(),
        as_of,
        state,
        ruleset_version: ruleset.version,
        ruleset_checksum: ruleset.checksum.clone(),
        lines,
        total_gross,
        total_vat,
        total_net,
        fund_totals,
        deal_totals,
        warnings,
        errors,
        credits: ledger.into_credits(),
    })
}

/// Base fee before caps, plus how it was arrived at.
struct BaseFee {
    fee: Money,
    applied_rate: Option<Decimal>,
    tier_applied: Option<String>,
    notes: Vec<String>,
    track_key: Option<String>,
}

fn compute_line(
    c: &Contribution,
    role: EntityType,
    name: &str,
    rule: &CommissionRule,
    ruleset: &RuleSet,
    ledger: &mut CreditLedger,
    warnings: &mut Vec<RunWarning>,
) -> Result<FeeLine, LineFailure> {
    let base = base_fee(c, name, rule, ruleset)?;

    if let Some(key) = &base.track_key {
        if let Some(track) = agreements::find_track(&ruleset.tracks, key) {
            if let Some(msg) = agreements::check_track_band(track, c.amount) {
                warnings.push(RunWarning {
                    contribution_id: Some(c.id),
                    message: msg,
                });
            }
        }
    }

    let mut notes = base.notes;
    let (capped, cap_note) = tiers::apply_caps(base.fee, rule.min_amount, rule.max_amount);
    if let Some(n) = cap_note {
        notes.push(n);
    }

    let vat_rate = vat::applicable_rate(&ruleset.vat_rates, rule.vat_country.as_deref(), c.date)
        .map_err(LineFailure::Fatal)?;
    let split = vat::calculate(capped, vat_rate, rule.vat_mode);

    let line_deal_id = match rule.scope {
        Scope::Deal => c.deal_id.clone(),
        Scope::Fund => None,
    };
    let eligible = ledger.applicable_ids(&c.investor, &c.fund, rule.scope, line_deal_id.as_deref());
    let outcome = ledger
        .apply(split.total_payable, &eligible)
        .map_err(LineFailure::Fatal)?;
    notes.extend(outcome.notes);

    Ok(FeeLine {
        contribution_id: c.id,
        rule_id: rule.id,
        rule_version: rule.version,
        entity_type: role,
        entity_name: name.to_string(),
        base_amount: c.amount,
        applied_rate: base.applied_rate,
        tier_applied: base.tier_applied,
        fee_gross: split.fee_gross,
        vat_rate: split.vat_rate,
        vat_amount: split.vat_amount,
        fee_net: split.fee_net,
        total_payable: outcome.final_amount,
        credits_applied: outcome.applied,
        scope: rule.scope,
        deal_id: line_deal_id,
        notes,
    })
}

fn base_fee(
    c: &Contribution,
    name: &str,
    rule: &CommissionRule,
    ruleset: &RuleSet,
) -> Result<BaseFee, LineFailure> {
    match &rule.kind {
        RuleKind::Percentage { rate } => {
            let (rate, track_key, note) = effective_rate(*rate, c, name, ruleset)?;
            let mut notes = Vec::new();
            if let Some(n) = note {
                notes.push(n);
            }
            Ok(BaseFee {
                fee: c.amount.apply_rate(rate),
                applied_rate: Some(rate),
                tier_applied: None,
                notes,
                track_key,
            })
        }
        RuleKind::FixedAmount { amount } => Ok(BaseFee {
            fee: *amount,
            applied_rate: None,
            tier_applied: None,
            notes: vec![format!("fixed fee {}", amount)],
            track_key: None,
        }),
        RuleKind::Tiered { mode, tiers } => {
            let outcome = tiers::calculate_tiered(c.amount, tiers, *mode, rule.id)?;
            Ok(BaseFee {
                fee: outcome.fee_gross,
                applied_rate: outcome.applied_rate,
                tier_applied: outcome.tier_applied,
                notes: outcome.notes,
                track_key: None,
            })
        }
        RuleKind::Hybrid { rate, amount } => {
            let (rate, track_key, note) = effective_rate(*rate, c, name, ruleset)?;
            let mut notes = vec![format!("hybrid: fixed {} + {} @ {}", amount, c.amount, rate)];
            if let Some(n) = note {
                notes.push(n);
            }
            Ok(BaseFee {
                fee: *amount + c.amount.apply_rate(rate),
                applied_rate: Some(rate),
                tier_applied: None,
                notes,
                track_key,
            })
        }
        RuleKind::Conditional {
            conditions,
            fallback_rate,
        } => {
            let mut ordered: Vec<_> = conditions.iter().collect();
            ordered.sort_by_key(|cond| cond.cond_order);
            let hit = ordered.iter().find(|cond| {
                cond.min_amount.map_or(true, |min| c.amount >= min)
                    && cond.max_amount.map_or(true, |max| c.amount < max)
            });
            let (rate, note) = match hit {
                Some(cond) => (
                    cond.rate,
                    format!(
                        "condition {} matched{}",
                        cond.cond_order,
                        cond.description
                            .as_deref()
                            .map(|d| format!(" ({})", d))
                            .unwrap_or_default()
                    ),
                ),
                None => {
                    let rate = fallback_rate.ok_or(LineError::MissingRate(
                        rule.id,
                        "no condition matched and no fallback rate".to_string(),
                    ))?;
                    (rate, "fallback rate".to_string())
                }
            };
            Ok(BaseFee {
                fee: c.amount.apply_rate(rate),
                applied_rate: Some(rate),
                tier_applied: None,
                notes: vec![note],
                track_key: None,
            })
        }
    }
}

/// Explicit rule rate, or the party's agreement upfront rate when the rule
/// defers. A party without any agreement is an entity-level miss.
fn effective_rate(
    explicit: Option<Decimal>,
    c: &Contribution,
    party: &str,
    ruleset: &RuleSet,
) -> Result<(Decimal, Option<String>, Option<String>), LineFailure> {
    if let Some(rate) = explicit {
        return Ok((rate, None, None));
    }
    let resolved = agreements::rates_for_party(
        party,
        &c.fund,
        c.deal_id.as_deref(),
        &ruleset.agreements,
        &ruleset.tracks,
        c.date,
    )
    .map_err(LineFailure::Fatal)?;
    match resolved {
        Some(res) => {
            let note = match &res.track_key {
                Some(key) => format!("rate {} from agreement track '{}'", res.upfront, key),
                None => format!("rate {} from agreement override", res.upfront),
            };
            Ok((res.upfront, res.track_key, Some(note)))
        }
        None => Err(LineError::NoAgreement(party.to_string(), c.date).into()),
    }
}
