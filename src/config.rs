use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{BillingError, Result};

/// billing engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    /// days between generation and the due date
    pub due_in_days: u32,
    /// flat fee charged once a bill is overdue
    pub late_fee_amount: Money,
    /// zero-padded width of the sequence part of a bill number
    pub bill_number_width: usize,
    /// allocation attempts before a bill-number collision is surfaced
    pub bill_number_attempts: u32,
    /// earliest billable year
    pub min_year: i32,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            due_in_days: 15,
            late_fee_amount: Money::from_major(50),
            bill_number_width: 4,
            bill_number_attempts: 3,
            min_year: 2020,
        }
    }
}

impl BillingConfig {
    /// parse from json, missing keys fall back to defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: BillingConfig = serde_json::from_str(json).map_err(|e| {
            BillingError::InvalidConfiguration {
                message: e.to_string(),
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_late_fee(mut self, amount: Money) -> Self {
        self.late_fee_amount = amount;
        self
    }

    pub fn with_due_in_days(mut self, days: u32) -> Self {
        self.due_in_days = days;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |message: &str| {
            Err(BillingError::InvalidConfiguration {
                message: message.to_string(),
            })
        };

        if self.due_in_days == 0 {
            return fail("due_in_days must be at least 1");
        }
        if self.late_fee_amount.is_negative() || !self.late_fee_amount.is_within_input_limit() {
            return fail("late_fee_amount must be between 0 and the input limit");
        }
        if self.bill_number_width == 0 {
            return fail("bill_number_width must be at least 1");
        }
        if self.bill_number_attempts == 0 {
            return fail("bill_number_attempts must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BillingConfig::default();
        assert_eq!(config.due_in_days, 15);
        assert_eq!(config.late_fee_amount, Money::from_major(50));
        assert_eq!(config.bill_number_width, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = BillingConfig::from_json(r#"{"late_fee_amount": "75.00", "due_in_days": 10}"#).unwrap();
        assert_eq!(config.late_fee_amount, Money::from_major(75));
        assert_eq!(config.due_in_days, 10);
        assert_eq!(config.min_year, 2020);
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(matches!(
            BillingConfig::from_json(r#"{"due_in_days": 0}"#),
            Err(BillingError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            BillingConfig::from_json(r#"{"late_fee_amount": "-1"}"#),
            Err(BillingError::InvalidConfiguration { .. })
        ));
        assert!(BillingConfig::from_json("not json").is_err());
    }
}
