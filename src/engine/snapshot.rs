// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::error::EngineError;
use crate::models::{
    Agreement, CommissionRule, Credit, RateTrack, RuleSet, Scope, VatRate, CONTRIBUTION_BASIS,
};
use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Read access to commission rules plus the append-only audit write of the
/// rules exactly as a run used them.
pub trait RuleRepository {
    fn active_rules(&self) -> Result<Vec<CommissionRule>>;
    fn persist_snapshot(&self, run_id: &str, rules: &[CommissionRule]) -> Result<()>;
}

pub trait VatRateRepository {
    fn vat_rates(&self) -> Result<Vec<VatRate>>;
}

pub trait CreditRepository {
    /// Active credits with balance left, for the given investors only.
    fn active_credits(&self, investors: &[String]) -> Result<Vec<Credit>>;
}

pub trait AgreementRepository {
    fn active_agreements(&self, as_of: NaiveDate) -> Result<Vec<Agreement>>;
    fn rate_tracks(&self) -> Result<Vec<RateTrack>>;
}

/// Canonical, order-independent body the checksum is taken over.
#[derive(Serialize)]
struct SnapshotBody<'a> {
    rules: &'a [CommissionRule],
    vat_rates: &'a [VatRate],
    credits: &'a [Credit],
    agreements: &'a [Agreement],
    tracks: &'a [RateTrack],
}

/// Build the immutable snapshot a run calculates from.
///
/// Every collection is sorted by a stable key before checksumming, so two
/// runs over identical data produce identical checksums no matter what order
/// the repositories returned rows in. As a side effect the rules are written
/// to the audit trail under the run id.
pub fn load_rule_set(
    run_id: &str,
    investors: &[String],
    as_of: NaiveDate,
    rules: &impl RuleRepository,
    vat: &impl VatRateRepository,
    credits: &impl CreditRepository,
    agreements: &impl AgreementRepository,
) -> Result<RuleSet> {
    let mut all_rules = rules.active_rules()?;
    let mut all_vat = vat.vat_rates()?;
    let mut all_credits = credits.active_credits(investors)?;
    let mut all_agreements = agreements.active_agreements(as_of)?;
    let mut all_tracks = agreements.rate_tracks()?;

    all_rules.sort_by_key(|r| r.id);
    all_vat.sort_by(|a, b| {
        a.country
            .cmp(&b.country)
            .then_with(|| a.effective_from.cmp(&b.effective_from))
            .then_with(|| a.id.cmp(&b.id))
    });
    all_credits.sort_by_key(|c| c.id);
    all_agreements.sort_by_key(|a| a.id);
    all_tracks.sort_by(|a, b| a.key.cmp(&b.key));

    assert_contribution_basis(&all_rules)?;
    validate_rule_scopes(&all_rules)?;

    let body = SnapshotBody {
        rules: &all_rules,
        vat_rates: &all_vat,
        credits: &all_credits,
        agreements: &all_agreements,
        tracks: &all_tracks,
    };
    let checksum = checksum_of(&body)?;
    let version = all_rules.iter().map(|r| r.version).max().unwrap_or(0);

    rules.persist_snapshot(run_id, &all_rules)?;

    Ok(RuleSet {
        rules: all_rules,
        vat_rates: all_vat,
        credits: all_credits,
        agreements: all_agreements,
        tracks: all_tracks,
        version,
        checksum,
    })
}

fn checksum_of(body: &SnapshotBody<'_>) -> Result<String> {
    let bytes = serde_json::to_vec(body)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{:x}", digest))
}

/// Hard business invariant: fees are charged on contribution amounts only.
/// A single rule on any other basis aborts the whole run before any line is
/// produced.
pub fn assert_contribution_basis(rules: &[CommissionRule]) -> Result<(), EngineError> {
    for rule in rules {
        if rule.calculation_basis != CONTRIBUTION_BASIS {
            return Err(EngineError::Configuration(format!(
                "rule {} uses calculation basis '{}'; only '{}' is allowed",
                rule.id, rule.calculation_basis, CONTRIBUTION_BASIS
            )));
        }
    }
    Ok(())
}

/// A fund-scoped rule carrying a deal id is malformed and would defeat the
/// precedence scope qualifiers.
fn validate_rule_scopes(rules: &[CommissionRule]) -> Result<(), EngineError> {
    for rule in rules {
        if rule.scope == Scope::Fund && rule.deal_id.is_some() {
            return Err(EngineError::Configuration(format!(
                "rule {} is fund-scoped but carries deal id '{}'",
                rule.id,
                rule.deal_id.as_deref().unwrap_or_default()
            )));
        }
        if rule.scope == Scope::Deal && rule.deal_id.is_none() {
            return Err(EngineError::Configuration(format!(
                "rule {} is deal-scoped but names no deal",
                rule.id
            )));
        }
    }
    Ok(())
}
