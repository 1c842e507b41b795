// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::error::EngineError;
use crate::engine::money::Money;
use crate::models::{Agreement, RateTrack, Scope};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Effective upfront/deferred rates for an agreement, with the track they
/// came from (if any) for band checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRates {
    pub upfront: Decimal,
    pub deferred: Decimal,
    pub track_key: Option<String>,
}

/// Agreements whose effective window contains `as_of`.
pub fn active_agreements(all: &[Agreement], as_of: NaiveDate) -> Vec<&Agreement> {
    all.iter()
        .filter(|a| {
            a.effective_from <= as_of && a.effective_to.map_or(true, |to| as_of <= to)
        })
        .collect()
}

pub fn find_track<'a>(tracks: &'a [RateTrack], key: &str) -> Option<&'a RateTrack> {
    tracks.iter().find(|t| t.key == key)
}

/// Resolve an agreement's effective rates.
///
/// Agreement-level overrides win outright. Otherwise the referenced track
/// supplies the rates (a missing track is a configuration error, not a
/// silent zero). A deal agreement with `inherit_fund_rates` and no rates of
/// its own resolves through the party's fund agreement.
pub fn resolve_rates(
    agreement: &Agreement,
    active: &[&Agreement],
    tracks: &[RateTrack],
) -> Result<ResolvedRates, EngineError> {
    if let (Some(upfront), Some(deferred)) =
        (agreement.upfront_override, agreement.deferred_override)
    {
        return Ok(ResolvedRates {
            upfront,
            deferred,
            track_key: None,
        });
    }

    if let Some(key) = &agreement.track_key {
        let track = find_track(tracks, key).ok_or_else(|| {
            EngineError::Configuration(format!(
                "agreement {} references missing rate track '{}'",
                agreement.id, key
            ))
        })?;
        return Ok(ResolvedRates {
            upfront: agreement.upfront_override.unwrap_or(track.upfront_rate),
            deferred: agreement.deferred_override.unwrap_or(track.deferred_rate),
            track_key: Some(track.key.clone()),
        });
    }

    if agreement.scope == Scope::Deal && agreement.inherit_fund_rates {
        let parent = active.iter().find(|p| {
            p.scope == Scope::Fund
                && p.party == agreement.party
                && (agreement.fund.is_none() || p.fund == agreement.fund)
        });
        return match parent {
            // Fund agreements never inherit, so this recursion terminates.
            Some(parent) => resolve_rates(parent, active, tracks),
            None => Err(EngineError::Configuration(format!(
                "agreement {} inherits fund rates but party '{}' has no fund agreement",
                agreement.id, agreement.party
            ))),
        };
    }

    Err(EngineError::Configuration(format!(
        "agreement {} has neither rate overrides nor a track",
        agreement.id
    )))
}

/// Orchestrator entry point: resolve rates for a party on a contribution.
///
/// Prefers a deal agreement matching the contribution's deal, then a fund
/// agreement. `Ok(None)` means the party simply has no agreement in effect;
/// the caller treats that as an entity-level condition, not a fatal one.
pub fn rates_for_party(
    party: &str,
    fund: &str,
    deal_id: Option<&str>,
    agreements: &[Agreement],
    tracks: &[RateTrack],
    as_of: NaiveDate,
) -> Result<Option<ResolvedRates>, EngineError> {
    let active = active_agreements(agreements, as_of);

    let deal_pick = deal_id.and_then(|d| {
        active.iter().find(|a| {
            a.scope == Scope::Deal && a.party == party && a.deal_id.as_deref() == Some(d)
        })
    });
    let pick = deal_pick.or_else(|| {
        active.iter().find(|a| {
            a.scope == Scope::Fund
                && a.party == party
                && a.fund.as_deref().map_or(true, |f| f == fund)
        })
    });

    match pick {
        Some(agreement) => resolve_rates(agreement, &active, tracks).map(Some),
        None => Ok(None),
    }
}

/// Contribution amounts outside a track's expected band are worth a human
/// look but never block the run.
pub fn check_track_band(track: &RateTrack, amount: Money) -> Option<String> {
    if let Some(min) = track.expected_min {
        if amount < min {
            return Some(format!(
                "amount {} below track '{}' expected minimum {}",
                amount, track.key, min
            ));
        }
    }
    if let Some(max) = track.expected_max {
        if amount > max {
            return Some(format!(
                "amount {} above track '{}' expected maximum {}",
                amount, track.key, max
            ));
        }
    }
    None
}
