// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::error::EngineError;
use crate::models::{CommissionRule, EntityType, Scope};
use std::collections::HashMap;

/// Pick the single applicable rule for one entity on one contribution.
///
/// Candidates are ranked by priority (desc), exact entity name before
/// wildcard, then id for a stable tiebreak. With a deal id present, a
/// deal-scoped rule matching that deal (and the fund, if the rule constrains
/// one) wins; otherwise a fund-scoped rule applies. A deal rule is never
/// selected without its deal id.
pub fn find_applicable_rule<'a>(
    candidates: &[&'a CommissionRule],
    deal_id: Option<&str>,
    fund: &str,
) -> Option<&'a CommissionRule> {
    let mut ranked: Vec<&CommissionRule> = candidates.to_vec();
    ranked.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.entity_name.is_none().cmp(&b.entity_name.is_none()))
            .then_with(|| a.id.cmp(&b.id))
    });

    let fund_matches = |r: &CommissionRule| r.fund.as_deref().map_or(true, |f| f == fund);

    if let Some(deal) = deal_id {
        if let Some(rule) = ranked.iter().find(|r| {
            r.scope == Scope::Deal && r.deal_id.as_deref() == Some(deal) && fund_matches(r)
        }) {
            return Some(rule);
        }
    }
    ranked
        .iter()
        .find(|r| r.scope == Scope::Fund && r.deal_id.is_none() && fund_matches(r))
        .copied()
}

/// Double-charge guard: no entity may be assigned rules under more than one
/// scope for a single contribution. The selection algorithm already prevents
/// this, but the guard runs unconditionally; a hit is a logic defect and is
/// always fatal.
pub fn validate_no_duplicate_scope(
    contribution_id: i64,
    selections: &[(EntityType, &str, Scope)],
) -> Result<(), EngineError> {
    let mut scopes: HashMap<(EntityType, &str), Vec<Scope>> = HashMap::new();
    for (role, name, scope) in selections {
        let entry = scopes.entry((*role, name)).or_default();
        if !entry.contains(scope) {
            entry.push(*scope);
        }
    }
    for ((role, name), seen) in scopes {
        if seen.len() > 1 {
            return Err(EngineError::Invariant(format!(
                "{} '{}' charged under both fund and deal scope on contribution {}",
                role, name, contribution_id
            )));
        }
    }
    Ok(())
}
