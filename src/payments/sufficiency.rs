//! Balance sufficiency checks, run before anything is signed.

use alloy::primitives::U256;

use crate::payments::error::{PaymentError, PaymentResult};

/// Why a native transfer cannot be paid. All values in wei.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortfall {
    pub balance: U256,
    pub amount: U256,
    pub fee: U256,
    /// `amount + fee - balance`.
    pub deficit: U256,
}

impl std::fmt::Display for Shortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "insufficient balance: have {} wei, need {} wei ({} + {} fee), short {} wei",
            self.balance,
            self.amount.saturating_add(self.fee),
            self.amount,
            self.fee,
            self.deficit
        )
    }
}

/// Native transfer: balance must cover amount plus the gas bound. Equality passes.
pub fn check_native(balance: U256, amount: U256, fee: U256) -> Result<(), Shortfall> {
    let required = amount.saturating_add(fee);
    if balance >= required {
        return Ok(());
    }
    Err(Shortfall {
        balance,
        amount,
        fee,
        deficit: required - balance,
    })
}

/// Token transfer: token balance covers the amount, native balance covers gas.
pub fn check_token(
    symbol: &str,
    token_balance: U256,
    amount: U256,
    native_balance: U256,
    fee: U256,
) -> PaymentResult<()> {
    if token_balance < amount {
        return Err(PaymentError::InsufficientTokenBalance {
            symbol: symbol.to_string(),
            have: token_balance,
            need: amount,
        });
    }
    if native_balance < fee {
        return Err(PaymentError::InsufficientGas {
            have: native_balance,
            need: fee,
        });
    }
    Ok(())
}
