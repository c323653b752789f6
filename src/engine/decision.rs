//! Balance-threshold withdrawal decision.
//!
//! A pure function of the free balance B, the withdrawal fee F and the
//! exchange minimum M:
//!
//! - B < M: hold, nothing to do this tick.
//! - B − F < M: policy-abort, the post-fee amount would be refused.
//! - otherwise: withdraw B − F, truncated to eight decimal places.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::types::{format_amount, NetReporting, AMOUNT_DECIMALS};

/// A withdrawal that passed every threshold check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalPlan {
    /// B − F at eight decimal places.
    pub amount: Decimal,
    pub fee: Decimal,
    /// Figure reported to the operator as the net amount deposited.
    pub reported_net: Decimal,
}

impl WithdrawalPlan {
    /// The amount exactly as it is sent to the exchange.
    pub fn amount_str(&self) -> String {
        format_amount(self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Balance below the exchange minimum.
    Hold,
    /// Balance covers the minimum but the post-fee amount does not.
    InsufficientNet { amount: Decimal, minimum: Decimal },
    Withdraw(WithdrawalPlan),
}

/// Decide what to do with `balance` given the current `fee` and `minimum`.
pub fn decide(
    balance: Decimal,
    fee: Decimal,
    minimum: Decimal,
    reporting: NetReporting,
) -> Decision {
    if balance < minimum {
        return Decision::Hold;
    }

    let amount =
        (balance - fee).round_dp_with_strategy(AMOUNT_DECIMALS, RoundingStrategy::ToZero);

    if amount < minimum {
        return Decision::InsufficientNet { amount, minimum };
    }

    let reported_net = match reporting {
        NetReporting::Exact => amount,
        NetReporting::DoubleFee => amount - fee,
    };

    Decision::Withdraw(WithdrawalPlan {
        amount,
        fee,
        reported_net,
    })
}
