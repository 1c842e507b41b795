// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::money::Money;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The only calculation basis the engine accepts. Commissions are charged on
/// paid-in contribution amounts, never on committed capital.
pub const CONTRIBUTION_BASIS: &str = "distribution_amount";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Distributor,
    Referrer,
    Partner,
}

impl EntityType {
    /// Fixed iteration order; keeps per-contribution output deterministic.
    pub const ALL: [EntityType; 3] = [
        EntityType::Distributor,
        EntityType::Referrer,
        EntityType::Partner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Distributor => "distributor",
            EntityType::Referrer => "referrer",
            EntityType::Partner => "partner",
        }
    }

    pub fn parse(s: &str) -> Option<EntityType> {
        match s {
            "distributor" => Some(EntityType::Distributor),
            "referrer" => Some(EntityType::Referrer),
            "partner" => Some(EntityType::Partner),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Fund,
    Deal,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Fund => "fund",
            Scope::Deal => "deal",
        }
    }

    pub fn parse(s: &str) -> Option<Scope> {
        match s {
            "fund" => Some(Scope::Fund),
            "deal" => Some(Scope::Deal),
            _ => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VatMode {
    /// The computed fee already contains VAT; the net is backed out.
    Included,
    /// The computed fee is net; VAT is added on top.
    OnTop,
}

impl VatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VatMode::Included => "included",
            VatMode::OnTop => "on_top",
        }
    }

    pub fn parse(s: &str) -> Option<VatMode> {
        match s {
            "included" => Some(VatMode::Included),
            "on_top" => Some(VatMode::OnTop),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierMode {
    /// Each tier's rate applies only to the slice of the amount inside its band.
    Stepped,
    /// The single band containing the total amount rates the whole amount.
    Threshold,
}

impl TierMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierMode::Stepped => "stepped",
            TierMode::Threshold => "threshold",
        }
    }

    pub fn parse(s: &str) -> Option<TierMode> {
        match s {
            "stepped" => Some(TierMode::Stepped),
            "threshold" => Some(TierMode::Threshold),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditStatus {
    Active,
    Exhausted,
}

impl CreditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditStatus::Active => "active",
            CreditStatus::Exhausted => "exhausted",
        }
    }

    pub fn parse(s: &str) -> Option<CreditStatus> {
        match s {
            "active" => Some(CreditStatus::Active),
            "exhausted" => Some(CreditStatus::Exhausted),
            _ => None,
        }
    }
}

/// An investor capital-contribution event. Immutable once loaded into a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contribution {
    pub id: i64,
    pub investor: String,
    pub fund: String,
    pub deal_id: Option<String>,
    pub deal_code: Option<String>,
    pub deal_name: Option<String>,
    pub amount: Money,
    pub date: NaiveDate,
    pub distributor: Option<String>,
    pub referrer: Option<String>,
    pub partner: Option<String>,
}

impl Contribution {
    pub fn entity_name(&self, role: EntityType) -> Option<&str> {
        match role {
            EntityType::Distributor => self.distributor.as_deref(),
            EntityType::Referrer => self.referrer.as_deref(),
            EntityType::Partner => self.partner.as_deref(),
        }
    }
}

/// One band of a tiered rule. Bands are half-open [min, max); a missing max
/// marks the unbounded top band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionTier {
    pub tier_order: i32,
    pub min_threshold: Money,
    pub max_threshold: Option<Money>,
    pub rate: Decimal,
    /// When set, charged for the band instead of rate x slice.
    pub fixed_amount: Option<Money>,
    pub description: Option<String>,
}

/// One branch of a conditional rule: the first band containing the amount
/// supplies the rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCondition {
    pub cond_order: i32,
    pub min_amount: Option<Money>,
    pub max_amount: Option<Money>,
    pub rate: Decimal,
    pub description: Option<String>,
}

/// Closed rule-type dispatch. A rate of `None` on Percentage/Hybrid defers to
/// the party's agreement via the rate resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    Percentage {
        rate: Option<Decimal>,
    },
    FixedAmount {
        amount: Money,
    },
    Tiered {
        mode: TierMode,
        tiers: Vec<CommissionTier>,
    },
    Hybrid {
        rate: Option<Decimal>,
        amount: Money,
    },
    Conditional {
        conditions: Vec<RuleCondition>,
        fallback_rate: Option<Decimal>,
    },
}

impl RuleKind {
    pub fn type_str(&self) -> &'static str {
        match self {
            RuleKind::Percentage { .. } => "percentage",
            RuleKind::FixedAmount { .. } => "fixed_amount",
            RuleKind::Tiered { .. } => "tiered",
            RuleKind::Hybrid { .. } => "hybrid",
            RuleKind::Conditional { .. } => "conditional",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionRule {
    pub id: i64,
    pub entity_type: EntityType,
    /// None acts as a wildcard default for the entity type.
    pub entity_name: Option<String>,
    pub kind: RuleKind,
    pub min_amount: Option<Money>,
    pub max_amount: Option<Money>,
    pub calculation_basis: String,
    pub scope: Scope,
    pub deal_id: Option<String>,
    /// When set, the rule only applies to contributions into this fund.
    pub fund: Option<String>,
    pub priority: i32,
    pub vat_mode: VatMode,
    pub vat_country: Option<String>,
    pub version: i32,
}

/// A commercial agreement governing rate resolution for a party and scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agreement {
    pub id: i64,
    pub party: String,
    pub scope: Scope,
    pub fund: Option<String>,
    pub deal_id: Option<String>,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
    pub inherit_fund_rates: bool,
    pub upfront_override: Option<Decimal>,
    pub deferred_override: Option<Decimal>,
    pub track_key: Option<String>,
    pub vat_mode: VatMode,
}

/// Shared rate table entry referenced by agreements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateTrack {
    pub key: String,
    pub upfront_rate: Decimal,
    pub deferred_rate: Decimal,
    pub expected_min: Option<Money>,
    pub expected_max: Option<Money>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VatRate {
    pub id: i64,
    pub country: String,
    pub rate: Decimal,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
    pub is_default: bool,
}

/// Prepaid balance that offsets future fee obligations. The remaining
/// balance only ever decreases within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credit {
    pub id: i64,
    pub investor: String,
    pub fund: Option<String>,
    pub scope: Scope,
    pub deal_id: Option<String>,
    pub original_balance: Money,
    pub remaining_balance: Money,
    pub status: CreditStatus,
    pub date_posted: NaiveDate,
}

/// Immutable, checksummed capture of everything a run calculates from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    pub rules: Vec<CommissionRule>,
    pub vat_rates: Vec<VatRate>,
    pub credits: Vec<Credit>,
    pub agreements: Vec<Agreement>,
    pub tracks: Vec<RateTrack>,
    pub version: i32,
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditApplication {
    pub credit_id: i64,
    pub amount_applied: Money,
    pub balance_after: Money,
}

/// One priced (contribution, entity) pair. Amount fields are at invoice
/// precision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeLine {
    pub contribution_id: i64,
    pub rule_id: i64,
    pub rule_version: i32,
    pub entity_type: EntityType,
    pub entity_name: String,
    pub base_amount: Money,
    pub applied_rate: Option<Decimal>,
    pub tier_applied: Option<String>,
    pub fee_gross: Money,
    pub vat_rate: Decimal,
    pub vat_amount: Money,
    pub fee_net: Money,
    /// Amount actually owed after credit offsets.
    pub total_payable: Money,
    pub credits_applied: Vec<CreditApplication>,
    pub scope: Scope,
    pub deal_id: Option<String>,
    pub notes: Vec<String>,
}
