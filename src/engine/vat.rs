// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::error::EngineError;
use crate::engine::money::Money;
use crate::models::{VatMode, VatRate};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// VAT split for a fee line, at invoice precision. The identities
/// `fee_net + vat_amount == total_payable` (on_top) and
/// `fee_net + vat_amount == fee_gross` (included) hold exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VatBreakdown {
    pub fee_gross: Money,
    pub vat_amount: Money,
    pub fee_net: Money,
    pub total_payable: Money,
    pub vat_rate: Decimal,
}

/// Split a base fee into net/VAT/payable.
///
/// Included: the fee already contains VAT; the net is backed out and the VAT
/// derived by exact subtraction so the parts always reassemble the gross.
/// OnTop: the fee is net and VAT is added.
pub fn calculate(fee_gross: Money, vat_rate: Decimal, mode: VatMode) -> VatBreakdown {
    match mode {
        VatMode::Included => {
            let gross = fee_gross.invoice();
            let net = gross.div_by_one_plus(vat_rate).invoice();
            let vat = gross - net;
            VatBreakdown {
                fee_gross: gross,
                vat_amount: vat,
                fee_net: net,
                total_payable: gross,
                vat_rate,
            }
        }
        VatMode::OnTop => {
            let net = fee_gross.invoice();
            let vat = net.apply_rate(vat_rate).invoice();
            VatBreakdown {
                fee_gross: net,
                vat_amount: vat,
                fee_net: net,
                total_payable: net + vat,
                vat_rate,
            }
        }
    }
}

/// Resolve the VAT rate for a jurisdiction as of a date.
///
/// Country match with a covering effective window wins; otherwise the row
/// flagged as default; otherwise this is a configuration error. 0% is never
/// assumed silently.
pub fn applicable_rate(
    rates: &[VatRate],
    country: Option<&str>,
    as_of: NaiveDate,
) -> Result<Decimal, EngineError> {
    if let Some(cc) = country {
        if let Some(r) = rates
            .iter()
            .filter(|r| r.country == cc && covers(r, as_of))
            .max_by_key(|r| r.effective_from)
        {
            return Ok(r.rate);
        }
    }
    if let Some(r) = rates
        .iter()
        .filter(|r| r.is_default && covers(r, as_of))
        .max_by_key(|r| r.effective_from)
    {
        return Ok(r.rate);
    }
    Err(EngineError::Configuration(format!(
        "no VAT rate for {} on {}",
        country.unwrap_or("<default>"),
        as_of
    )))
}

fn covers(rate: &VatRate, as_of: NaiveDate) -> bool {
    rate.effective_from <= as_of && rate.effective_to.map_or(true, |to| as_of <= to)
}
