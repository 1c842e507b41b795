// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use feeclip::engine::precedence::{find_applicable_rule, validate_no_duplicate_scope};
use feeclip::models::{CommissionRule, EntityType, RuleKind, Scope, VatMode};
use rust_decimal_macros::dec;

fn rule(id: i64, name: Option<&str>, scope: Scope, deal: Option<&str>, priority: i32) -> CommissionRule {
    CommissionRule {
        id,
        entity_type: EntityType::Distributor,
        entity_name: name.map(|s| s.to_string()),
        kind: RuleKind::Percentage {
            rate: Some(dec!(0.02)),
        },
        min_amount: None,
        max_amount: None,
        calculation_basis: "distribution_amount".to_string(),
        scope,
        deal_id: deal.map(|s| s.to_string()),
        fund: None,
        priority,
        vat_mode: VatMode::OnTop,
        vat_country: None,
        version: 1,
    }
}

#[test]
fn deal_rule_beats_fund_rule_when_deal_matches() {
    let fund_rule = rule(1, Some("Acme"), Scope::Fund, None, 0);
    let deal_rule = rule(2, Some("Acme"), Scope::Deal, Some("D1"), 0);
    let picked =
        find_applicable_rule(&[&fund_rule, &deal_rule], Some("D1"), "Growth Fund").unwrap();
    assert_eq!(picked.id, 2);
}

#[test]
fn fund_rule_applies_when_contribution_has_no_deal() {
    let fund_rule = rule(1, Some("Acme"), Scope::Fund, None, 0);
    let deal_rule = rule(2, Some("Acme"), Scope::Deal, Some("D1"), 5);
    let picked = find_applicable_rule(&[&fund_rule, &deal_rule], None, "Growth Fund").unwrap();
    assert_eq!(picked.id, 1);
}

#[test]
fn deal_rule_for_another_deal_is_skipped() {
    let fund_rule = rule(1, Some("Acme"), Scope::Fund, None, 0);
    let deal_rule = rule(2, Some("Acme"), Scope::Deal, Some("D1"), 5);
    let picked =
        find_applicable_rule(&[&fund_rule, &deal_rule], Some("D2"), "Growth Fund").unwrap();
    assert_eq!(picked.id, 1);
}

#[test]
fn named_rule_beats_wildcard_at_equal_priority() {
    let wildcard = rule(1, None, Scope::Fund, None, 0);
    let named = rule(2, Some("Acme"), Scope::Fund, None, 0);
    let picked = find_applicable_rule(&[&wildcard, &named], None, "Growth Fund").unwrap();
    assert_eq!(picked.id, 2);
}

#[test]
fn higher_priority_wildcard_beats_named_rule() {
    let wildcard = rule(1, None, Scope::Fund, None, 10);
    let named = rule(2, Some("Acme"), Scope::Fund, None, 0);
    let picked = find_applicable_rule(&[&wildcard, &named], None, "Growth Fund").unwrap();
    assert_eq!(picked.id, 1);
}

#[test]
fn fund_constrained_rule_is_skipped_for_other_funds() {
    let mut constrained = rule(1, Some("Acme"), Scope::Fund, None, 5);
    constrained.fund = Some("Income Fund".to_string());
    let open = rule(2, Some("Acme"), Scope::Fund, None, 0);
    let picked = find_applicable_rule(&[&constrained, &open], None, "Growth Fund").unwrap();
    assert_eq!(picked.id, 2);
}

#[test]
fn lower_id_wins_a_full_tie() {
    let a = rule(7, Some("Acme"), Scope::Fund, None, 0);
    let b = rule(3, Some("Acme"), Scope::Fund, None, 0);
    let picked = find_applicable_rule(&[&a, &b], None, "Growth Fund").unwrap();
    assert_eq!(picked.id, 3);
}

#[test]
fn no_candidates_means_no_rule() {
    assert!(find_applicable_rule(&[], Some("D1"), "Growth Fund").is_none());
}

#[test]
fn duplicate_scope_guard_accepts_one_scope_per_entity() {
    let selections = [
        (EntityType::Distributor, "Acme", Scope::Deal),
        (EntityType::Referrer, "RefCo", Scope::Fund),
        (EntityType::Distributor, "Acme", Scope::Deal),
    ];
    assert!(validate_no_duplicate_scope(1, &selections).is_ok());
}

#[test]
fn duplicate_scope_guard_rejects_fund_and_deal_for_same_entity() {
    let selections = [
        (EntityType::Distributor, "Acme", Scope::Fund),
        (EntityType::Distributor, "Acme", Scope::Deal),
    ];
    let err = validate_no_duplicate_scope(12, &selections).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("invariant"));
    assert!(msg.contains("Acme"));
    assert!(msg.contains("12"));
}
