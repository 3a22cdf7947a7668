//! Marketplace commission.
//!
//! Deals up to 50,000.00 pay a flat 500.00; anything above pays 2%.
//! There are two call patterns and each has its own entry point:
//! [`split_gross`] takes a total and carves the commission out of it, while
//! [`derive_total_from_net`] takes a product price and adds the commission on top.

use serde::{Deserialize, Serialize};

use bazaar_core::{DomainError, DomainResult, Money};

/// Largest amount still charged the flat fee (inclusive).
pub const FLAT_FEE_CEILING: Money = Money::from_major(50_000);

/// Flat fee for deals at or below the ceiling.
pub const FLAT_FEE: Money = Money::from_major(500);

/// Percentage rate above the ceiling, in basis points (2%).
pub const PERCENT_RATE_BPS: u64 = 200;

/// Commission owed on `amount`.
pub fn commission_for(amount: Money) -> Money {
    if amount <= FLAT_FEE_CEILING {
        FLAT_FEE
    } else {
        amount.apply_basis_points(PERCENT_RATE_BPS)
    }
}

/// A gross total split into commission and the seller's net.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSplit {
    pub gross: Money,
    pub commission: Money,
    pub net: Money,
}

/// A product amount with the commission added on top.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrossedUp {
    pub product_amount: Money,
    pub commission: Money,
    pub total: Money,
}

/// Split a gross total: `net = total - commission`.
///
/// A total smaller than the flat fee cannot carry its own commission.
pub fn split_gross(total: Money) -> DomainResult<CommissionSplit> {
    let commission = commission_for(total);
    let net = total.checked_sub(commission).map_err(|_| {
        DomainError::invariant(format!(
            "total {total} is smaller than its commission {commission}"
        ))
    })?;
    Ok(CommissionSplit {
        gross: total,
        commission,
        net,
    })
}

/// Gross up a product amount: `total = product_amount + commission`.
pub fn derive_total_from_net(product_amount: Money) -> DomainResult<GrossedUp> {
    let commission = commission_for(product_amount);
    let total = product_amount.checked_add(commission)?;
    Ok(GrossedUp {
        product_amount,
        commission,
        total,
    })
}
