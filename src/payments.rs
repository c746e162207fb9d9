use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::types::PaymentMethod;

/// a manually recorded payment, before it is applied to a bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInput {
    pub amount: Money,
    pub method: PaymentMethod,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl PaymentInput {
    pub fn new(amount: Money, method: PaymentMethod) -> Self {
        Self {
            amount,
            method,
            transaction_id: None,
            remarks: None,
        }
    }

    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn with_remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = Some(remarks.into());
        self
    }

    /// amounts must be positive; there is no upper bound against the bill
    pub fn validate(&self) -> Result<()> {
        if !self.amount.is_positive() {
            return Err(BillingError::invalid(
                "amount",
                format!("payment must be positive, got {}", self.amount),
            ));
        }
        self.amount.ensure_input("amount")?;
        if let Some(id) = &self.transaction_id {
            if id.trim().is_empty() {
                return Err(BillingError::invalid("transaction_id", "cannot be blank"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_validation() {
        assert!(PaymentInput::new(Money::ZERO, PaymentMethod::Cash).validate().is_err());
        assert!(PaymentInput::new(Money::from_major(-10), PaymentMethod::Upi).validate().is_err());
        assert!(PaymentInput::new(Money::from_major(10), PaymentMethod::Upi)
            .with_transaction_id("  ")
            .validate()
            .is_err());

        let payment = PaymentInput::new(Money::from_major(1_000), PaymentMethod::Upi)
            .with_transaction_id("UPI-8812")
            .with_remarks("june instalment");
        assert!(payment.validate().is_ok());
    }

    #[test]
    fn test_payment_from_json() {
        let payment: PaymentInput =
            serde_json::from_str(r#"{"amount": "1500.00", "method": "bank_transfer"}"#).unwrap();

        assert_eq!(payment.amount, Money::from_major(1_500));
        assert_eq!(payment.method, PaymentMethod::BankTransfer);
        assert!(payment.transaction_id.is_none());
    }

    #[test]
    fn test_sub_paisa_payment_rejected() {
        let payment: PaymentInput = serde_json::from_str(r#"{"amount": "0.004", "method": "cash"}"#).unwrap();
        assert!(payment.amount.is_zero());
        assert!(payment.validate().is_err());

        let payment: PaymentInput = serde_json::from_str(r#"{"amount": "100.125", "method": "cash"}"#).unwrap();
        assert_eq!(payment.amount, Money::from_str_exact("100.12").unwrap());
        assert!(payment.validate().is_ok());
    }

    #[test]
    fn test_oversized_payment_rejected() {
        let payment: PaymentInput =
            serde_json::from_str(r#"{"amount": "79228162514264337593543950335", "method": "upi"}"#).unwrap();
        assert!(matches!(payment.validate(), Err(BillingError::InvalidInput { .. })));
        assert!(PaymentInput::new(Money::MAX_INPUT, PaymentMethod::Upi).validate().is_ok());
    }
}
