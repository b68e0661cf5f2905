//! Allocation rules for `budgeting` and `geo-budgeting` sections.
//!
//! All arithmetic runs on integer minor units (`amount * 10^decimals`, rounded
//! half-up), so every amount the engine hands out is exactly representable at
//! the unit's granularity and re-applying an accepted value is a no-op.
//!
//! Interactive edits never fail on budget overflow: they clamp to what is left.
//! Only malformed input (negative, not a number, unknown target) is rejected.
//! Hard checks on a complete allocation happen in [`validate_budget_allocation`].

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::spec::{AllocationDirection, BudgetTarget, BudgetingSpec, InputMode};

/// Per-target amounts keyed by target id.
pub type Allocation = BTreeMap<String, f64>;

/// Largest supported `decimals` setting.
pub const MAX_DECIMALS: u32 = 6;

/// Why a single allocation (or a complete allocation map) was refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AllocationRejected {
    #[error("target '{target_id}' does not exist")]
    UnknownTarget { target_id: String },
    #[error("amount for target '{target_id}' is not a number")]
    NotANumber { target_id: String },
    #[error("amount {amount} for target '{target_id}' is negative")]
    NegativeAmount { target_id: String, amount: f64 },
    #[error("amount {amount} for target '{target_id}' is not a multiple of its price {price}")]
    NotMultipleOfPrice {
        target_id: String,
        amount: f64,
        price: f64,
    },
    #[error("amount {amount} for target '{target_id}' is finer than {decimals} decimal places")]
    OffGranularity {
        target_id: String,
        amount: f64,
        decimals: u32,
    },
    #[error("allocated {allocated} exceeds the total budget {total}")]
    OverBudget { allocated: f64, total: f64 },
}

/// Submission-time budget failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BudgetViolation {
    #[error(transparent)]
    Rejected(#[from] AllocationRejected),
    #[error("allocated {allocated} of {total}; the full budget must be allocated")]
    NotFullyAllocated { allocated: f64, total: f64 },
}

struct Ledger<'a> {
    spec: &'a BudgetingSpec,
    scale: f64,
}

impl<'a> Ledger<'a> {
    fn new(spec: &'a BudgetingSpec) -> Self {
        Self {
            spec,
            scale: 10f64.powi(spec.decimals.min(MAX_DECIMALS) as i32),
        }
    }

    /// Saturates at the `i64` bounds for out-of-range amounts.
    fn to_minor(&self, amount: f64) -> i64 {
        (amount * self.scale).round() as i64
    }

    fn decimals(&self) -> u32 {
        self.spec.decimals.min(MAX_DECIMALS)
    }

    /// Sum of the declared targets' amounts, saturating instead of wrapping.
    fn spent(&self, allocation: &Allocation) -> i64 {
        self.spec
            .targets
            .iter()
            .map(|target| self.amount_of(allocation, target))
            .fold(0i64, i64::saturating_add)
    }

    fn to_amount(&self, minor: i64) -> f64 {
        minor as f64 / self.scale
    }

    fn total(&self) -> i64 {
        self.to_minor(self.spec.total_budget)
    }

    /// Unit price in minor units; `None` outside pieces mode.
    fn price(&self, target: &BudgetTarget) -> Option<i64> {
        if !self.spec.is_pieces() {
            return None;
        }
        target
            .price
            .map(|price| self.to_minor(price))
            .filter(|price| *price > 0)
    }

    fn quantize(&self, target: &BudgetTarget, minor: i64) -> i64 {
        match self.price(target) {
            Some(price) => minor / price * price,
            None => minor,
        }
    }

    fn amount_of(&self, allocation: &Allocation, target: &BudgetTarget) -> i64 {
        allocation
            .get(&target.id)
            .filter(|amount| amount.is_finite())
            .map(|amount| self.to_minor(*amount).max(0))
            .unwrap_or(0)
    }

    fn build(&self, amounts: &[i64]) -> Allocation {
        self.spec
            .targets
            .iter()
            .zip(amounts)
            .map(|(target, minor)| (target.id.clone(), self.to_amount(*minor)))
            .collect()
    }

    /// Hands `leftover` to targets in declared order, whole units at a time in pieces mode.
    fn distribute_leftover(&self, amounts: &mut [i64], mut leftover: i64) {
        for (target, amount) in self.spec.targets.iter().zip(amounts.iter_mut()) {
            if leftover <= 0 {
                break;
            }
            let granted = self.quantize(target, leftover);
            *amount += granted;
            leftover -= granted;
        }
    }
}

/// Whether `amount` sits exactly on the unit granularity of `spec`.
pub fn is_representable(spec: &BudgetingSpec, amount: f64) -> bool {
    let ledger = Ledger::new(spec);
    let scaled = amount * ledger.scale;
    (scaled - scaled.round()).abs() < 1e-6
}

/// Applies one interactive edit to `current` and returns the normalized allocation
/// for every declared target.
///
/// Percentage input is converted to an absolute amount of `total_budget` first.
/// The result is clamped to the budget left over by the other targets and, in
/// pieces mode, rounded down to a whole number of units.
pub fn apply_allocation(
    spec: &BudgetingSpec,
    current: &Allocation,
    target_id: &str,
    raw_input: f64,
) -> Result<Allocation, AllocationRejected> {
    let target = spec
        .target(target_id)
        .ok_or_else(|| AllocationRejected::UnknownTarget {
            target_id: target_id.to_string(),
        })?;
    if !raw_input.is_finite() {
        return Err(AllocationRejected::NotANumber {
            target_id: target_id.to_string(),
        });
    }
    if raw_input < 0.0 {
        return Err(AllocationRejected::NegativeAmount {
            target_id: target_id.to_string(),
            amount: raw_input,
        });
    }

    let ledger = Ledger::new(spec);
    let total = ledger.total();
    let requested = match spec.input_mode {
        InputMode::Absolute => ledger.to_minor(raw_input),
        InputMode::Percentage => (raw_input * total as f64 / 100.0).round() as i64,
    };

    let others = spec
        .targets
        .iter()
        .filter(|other| other.id != target_id)
        .map(|other| ledger.amount_of(current, other))
        .fold(0i64, i64::saturating_add);
    let remaining = total.saturating_sub(others).max(0);
    let accepted = ledger.quantize(target, requested.min(remaining));
    if accepted != requested {
        debug!(
            target_id,
            requested = ledger.to_amount(requested),
            accepted = ledger.to_amount(accepted),
            "allocation adjusted to budget and price"
        );
    }

    let amounts: Vec<i64> = spec
        .targets
        .iter()
        .map(|other| {
            if other.id == target_id {
                accepted
            } else {
                ledger.amount_of(current, other)
            }
        })
        .collect();
    Ok(ledger.build(&amounts))
}

/// Starting allocation before the respondent touches anything.
///
/// `increasing` starts every target at zero. `decreasing` starts from the full
/// budget split evenly, with the rounding leftover going to the earliest targets.
pub fn initial_allocation(spec: &BudgetingSpec) -> Allocation {
    let ledger = Ledger::new(spec);
    let mut amounts = vec![0i64; spec.targets.len()];
    if spec.allocation_direction == AllocationDirection::Decreasing && !amounts.is_empty() {
        let total = ledger.total();
        let share = total / spec.targets.len() as i64;
        for (target, amount) in spec.targets.iter().zip(amounts.iter_mut()) {
            *amount = ledger.quantize(target, share);
        }
        let leftover = total - amounts.iter().sum::<i64>();
        ledger.distribute_leftover(&mut amounts, leftover);
    }
    ledger.build(&amounts)
}

/// Re-fits an allocation to the currently declared targets.
///
/// Amounts of removed targets are dropped, new targets start at zero, and
/// targets keep their amounts in declared order until the budget runs out. With
/// `decreasing` direction whatever is left afterwards goes to the earliest targets.
pub fn reconcile_targets(spec: &BudgetingSpec, current: &Allocation) -> Allocation {
    let ledger = Ledger::new(spec);
    let total = ledger.total();
    let mut remaining = total;
    let mut amounts = Vec::with_capacity(spec.targets.len());
    for target in &spec.targets {
        let wanted = ledger.quantize(target, ledger.amount_of(current, target));
        let kept = ledger.quantize(target, wanted.min(remaining));
        remaining -= kept;
        amounts.push(kept);
    }
    if spec.allocation_direction == AllocationDirection::Decreasing {
        ledger.distribute_leftover(&mut amounts, remaining);
    }
    ledger.build(&amounts)
}

/// Sum of all declared targets' amounts.
pub fn spent(spec: &BudgetingSpec, allocation: &Allocation) -> f64 {
    let ledger = Ledger::new(spec);
    ledger.to_amount(ledger.spent(allocation))
}

/// Budget not yet allocated; never negative.
pub fn remaining(spec: &BudgetingSpec, allocation: &Allocation) -> f64 {
    let ledger = Ledger::new(spec);
    let spent = ledger.spent(allocation);
    ledger.to_amount(ledger.total().saturating_sub(spent).max(0))
}

/// Share of the total budget an amount represents, for percentage-mode display.
pub fn as_percentage(spec: &BudgetingSpec, amount: f64) -> f64 {
    amount / spec.total_budget * 100.0
}

/// Checks the hard invariants of a complete allocation map.
///
/// Every amount must sit on the unit granularity, so the integer sum compared
/// against the budget is the exact sum of the submitted amounts.
pub fn check_allocation(
    spec: &BudgetingSpec,
    allocation: &Allocation,
) -> Result<(), AllocationRejected> {
    let ledger = Ledger::new(spec);
    let mut sum = 0i64;
    for (target_id, amount) in allocation {
        let target = spec
            .target(target_id)
            .ok_or_else(|| AllocationRejected::UnknownTarget {
                target_id: target_id.clone(),
            })?;
        if !amount.is_finite() {
            return Err(AllocationRejected::NotANumber {
                target_id: target_id.clone(),
            });
        }
        if *amount < 0.0 {
            return Err(AllocationRejected::NegativeAmount {
                target_id: target_id.clone(),
                amount: *amount,
            });
        }
        if *amount > spec.total_budget {
            return Err(AllocationRejected::OverBudget {
                allocated: *amount,
                total: spec.total_budget,
            });
        }
        let minor = ledger.to_minor(*amount);
        if let Some(price) = ledger.price(target) {
            if minor % price != 0 || !is_representable(spec, *amount) {
                return Err(AllocationRejected::NotMultipleOfPrice {
                    target_id: target_id.clone(),
                    amount: *amount,
                    price: ledger.to_amount(price),
                });
            }
        } else if !is_representable(spec, *amount) {
            return Err(AllocationRejected::OffGranularity {
                target_id: target_id.clone(),
                amount: *amount,
                decimals: ledger.decimals(),
            });
        }
        sum = sum.saturating_add(minor);
    }
    if sum > ledger.total() {
        return Err(AllocationRejected::OverBudget {
            allocated: ledger.to_amount(sum),
            total: spec.total_budget,
        });
    }
    Ok(())
}

/// Submission-time validation of a budgeting answer.
///
/// `require_full_allocation` only applies in direct mode; pieces mode is never
/// checked for completeness.
pub fn validate_budget_allocation(
    spec: &BudgetingSpec,
    allocation: &Allocation,
) -> Result<(), BudgetViolation> {
    check_allocation(spec, allocation)?;
    if spec.require_full_allocation && !spec.is_pieces() {
        let ledger = Ledger::new(spec);
        let allocated = ledger.spent(allocation);
        if allocated < ledger.total() {
            return Err(BudgetViolation::NotFullyAllocated {
                allocated: ledger.to_amount(allocated),
                total: spec.total_budget,
            });
        }
    }
    Ok(())
}
