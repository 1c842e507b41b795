// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::error::LineError;
use crate::engine::money::Money;
use crate::models::{CommissionTier, TierMode};
use rust_decimal::Decimal;

/// Result of a tier computation, before caps and VAT.
#[derive(Debug, Clone)]
pub struct TierOutcome {
    pub fee_gross: Money,
    pub applied_rate: Option<Decimal>,
    pub tier_applied: Option<String>,
    pub notes: Vec<String>,
}

/// Compute the base fee for `amount` from a tier table.
///
/// Stepped mode rates each band's slice separately; threshold mode rates the
/// whole amount at the single band containing it. Bands are half-open
/// [min, max), so an amount sitting exactly on a threshold belongs to the
/// upper band.
pub fn calculate_tiered(
    amount: Money,
    tiers: &[CommissionTier],
    mode: TierMode,
    rule_id: i64,
) -> Result<TierOutcome, LineError> {
    if tiers.is_empty() {
        return Err(LineError::MissingTiers(rule_id));
    }
    let mut ordered: Vec<&CommissionTier> = tiers.iter().collect();
    ordered.sort_by_key(|t| t.tier_order);
    validate_tiers(&ordered, rule_id)?;

    match mode {
        TierMode::Stepped => stepped(amount, &ordered),
        TierMode::Threshold => threshold(amount, &ordered),
    }
}

/// Tier bands must ascend without gaps or overlap; only the top band may be
/// unbounded.
fn validate_tiers(ordered: &[&CommissionTier], rule_id: i64) -> Result<(), LineError> {
    for (i, tier) in ordered.iter().enumerate() {
        let last = i == ordered.len() - 1;
        match tier.max_threshold {
            Some(max) if max <= tier.min_threshold => {
                return Err(LineError::InvalidTiers {
                    rule_id,
                    reason: format!(
                        "tier {} has max {} <= min {}",
                        tier.tier_order, max, tier.min_threshold
                    ),
                });
            }
            None if !last => {
                return Err(LineError::InvalidTiers {
                    rule_id,
                    reason: format!("tier {} is unbounded but not last", tier.tier_order),
                });
            }
            _ => {}
        }
        if let Some(next) = ordered.get(i + 1) {
            let max = tier.max_threshold.ok_or_else(|| LineError::InvalidTiers {
                rule_id,
                reason: format!("tier {} is unbounded but not last", tier.tier_order),
            })?;
            if next.min_threshold != max {
                return Err(LineError::InvalidTiers {
                    rule_id,
                    reason: format!(
                        "tier {} starts at {} but tier {} ends at {}",
                        next.tier_order, next.min_threshold, tier.tier_order, max
                    ),
                });
            }
        }
    }
    Ok(())
}

fn stepped(amount: Money, ordered: &[&CommissionTier]) -> Result<TierOutcome, LineError> {
    let mut fee = Money::ZERO;
    let mut notes = Vec::new();
    let mut bands_hit = 0usize;

    for (i, tier) in ordered.iter().enumerate() {
        if amount <= tier.min_threshold {
            break;
        }
        // The top band absorbs everything above its floor.
        let ceiling = if i == ordered.len() - 1 {
            amount
        } else {
            tier.max_threshold.unwrap_or(amount).min(amount)
        };
        let slice = ceiling - tier.min_threshold;
        if !slice.is_positive() {
            continue;
        }
        bands_hit += 1;
        if let Some(fixed) = tier.fixed_amount {
            fee += fixed;
            notes.push(format!("tier {}: fixed {}", tier.tier_order, fixed));
        } else {
            fee += slice.apply_rate(tier.rate);
            notes.push(format!(
                "tier {}: {} @ {}",
                tier.tier_order, slice, tier.rate
            ));
        }
        if ceiling == amount {
            break;
        }
    }

    Ok(TierOutcome {
        fee_gross: fee,
        applied_rate: None,
        tier_applied: Some(format!("stepped:{}", bands_hit)),
        notes,
    })
}

fn threshold(amount: Money, ordered: &[&CommissionTier]) -> Result<TierOutcome, LineError> {
    // Highest band first; [min, max) containment.
    let hit = ordered.iter().rev().find(|t| {
        amount >= t.min_threshold && t.max_threshold.map_or(true, |max| amount < max)
    });
    // Below every band: charge at the first tier.
    let tier = hit.unwrap_or(&ordered[0]);

    let (fee, rate, note) = if let Some(fixed) = tier.fixed_amount {
        (
            fixed,
            None,
            format!("threshold tier {}: fixed {}", tier.tier_order, fixed),
        )
    } else {
        (
            amount.apply_rate(tier.rate),
            Some(tier.rate),
            format!("threshold tier {}: {} @ {}", tier.tier_order, amount, tier.rate),
        )
    };

    let label = tier
        .description
        .clone()
        .unwrap_or_else(|| format!("tier {}", tier.tier_order));

    Ok(TierOutcome {
        fee_gross: fee,
        applied_rate: rate,
        tier_applied: Some(label),
        notes: vec![note],
    })
}

/// Clamp a computed fee into [min_amount, max_amount]. Runs after the tier
/// computation and before VAT.
pub fn apply_caps(
    fee: Money,
    min_amount: Option<Money>,
    max_amount: Option<Money>,
) -> (Money, Option<String>) {
    if let Some(min) = min_amount {
        if fee < min {
            return (min, Some(format!("raised to minimum {}", min)));
        }
    }
    if let Some(max) = max_amount {
        if fee > max {
            return (max, Some(format!("capped at maximum {}", max)));
        }
    }
    (fee, None)
}
