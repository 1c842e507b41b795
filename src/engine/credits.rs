// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::error::EngineError;
use crate::engine::money::Money;
use crate::models::{Credit, CreditApplication, CreditStatus, Scope};

/// Outcome of netting credits against one fee line.
#[derive(Debug, Clone)]
pub struct CreditOutcome {
    /// Fee remaining after consumption; zero or positive, never negative.
    pub final_amount: Money,
    pub applied: Vec<CreditApplication>,
    pub notes: Vec<String>,
}

/// The run's working copy of all credits. Consumption is FIFO by
/// (date_posted, id) and serialized through this single ledger, so a credit
/// can never be over-applied across fee lines.
#[derive(Debug)]
pub struct CreditLedger {
    credits: Vec<Credit>,
}

impl CreditLedger {
    pub fn new(mut credits: Vec<Credit>) -> Self {
        credits.sort_by(|a, b| {
            a.date_posted
                .cmp(&b.date_posted)
                .then_with(|| a.id.cmp(&b.id))
        });
        CreditLedger { credits }
    }

    /// Credits eligible to offset a fee line, in consumption order.
    ///
    /// A credit must belong to the investor, be active with balance left, and
    /// match its fund binding if it has one. Fund-scoped credits offset any
    /// line for the investor; deal-scoped credits only a deal line with the
    /// exact same deal id.
    pub fn applicable_ids(
        &self,
        investor: &str,
        fund: &str,
        line_scope: Scope,
        line_deal_id: Option<&str>,
    ) -> Vec<i64> {
        self.credits
            .iter()
            .filter(|c| c.investor == investor)
            .filter(|c| c.status == CreditStatus::Active && c.remaining_balance.is_positive())
            .filter(|c| c.fund.as_deref().map_or(true, |f| f == fund))
            .filter(|c| match c.scope {
                Scope::Fund => true,
                Scope::Deal => {
                    line_scope == Scope::Deal
                        && c.deal_id.is_some()
                        && c.deal_id.as_deref() == line_deal_id
                }
            })
            .map(|c| c.id)
            .collect()
    }

    /// Consume credits against a fee, FIFO, stopping when the fee reaches
    /// zero or the eligible credits are exhausted.
    pub fn apply(
        &mut self,
        fee_amount: Money,
        credit_ids: &[i64],
    ) -> Result<CreditOutcome, EngineError> {
        let mut remaining = fee_amount;
        let mut applied = Vec::new();
        let mut notes = Vec::new();

        for id in credit_ids {
            if !remaining.is_positive() {
                break;
            }
            let credit = self
                .credits
                .iter_mut()
                .find(|c| c.id == *id)
                .ok_or_else(|| {
                    EngineError::Invariant(format!("credit {} vanished from ledger", id))
                })?;
            let take = remaining.min(credit.remaining_balance);
            if !take.is_positive() {
                continue;
            }
            credit.remaining_balance -= take;
            if credit.remaining_balance.is_negative() {
                return Err(EngineError::Invariant(format!(
                    "credit {} over-applied: balance went negative",
                    credit.id
                )));
            }
            if credit.remaining_balance.is_zero() {
                credit.status = CreditStatus::Exhausted;
            }
            remaining -= take;
            applied.push(CreditApplication {
                credit_id: credit.id,
                amount_applied: take,
                balance_after: credit.remaining_balance,
            });
            notes.push(format!(
                "credit {}: applied {}, {} left",
                credit.id, take, credit.remaining_balance
            ));
        }

        Ok(CreditOutcome {
            final_amount: remaining,
            applied,
            notes,
        })
    }

    /// Final credit states for persistence after the run.
    pub fn into_credits(self) -> Vec<Credit> {
        self.credits
    }
}
