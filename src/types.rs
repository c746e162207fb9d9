use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::{BillingError, Result};

/// unique identifier for a bill
pub type BillId = Uuid;

/// reference into the student directory
pub type StudentId = Uuid;

/// opaque reference to whoever performed an action
pub type ActorId = Uuid;

/// dining unit identifier
pub type MessId = String;

/// derived payment status of a bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    PartiallyPaid,
    Paid,
    /// no payment recorded and past the due date
    Overdue,
    /// nothing to pay
    Waived,
}

impl PaymentStatus {
    /// statuses that still expect money
    pub const OPEN: [PaymentStatus; 3] = [
        PaymentStatus::Unpaid,
        PaymentStatus::PartiallyPaid,
        PaymentStatus::Overdue,
    ];

    pub fn is_open(&self) -> bool {
        Self::OPEN.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::PartiallyPaid => "partially_paid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Overdue => "overdue",
            PaymentStatus::Waived => "waived",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// how a payment was received
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Online,
    Upi,
    Card,
    BankTransfer,
    Other,
}

/// outcome of an individual payment event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventStatus {
    #[default]
    Success,
    Pending,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    Breakfast,
    Lunch,
    EveningSnacks,
    Dinner,
}

/// calendar month covered by a bill, both ends inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl BillingPeriod {
    /// first to last day of the given month
    pub fn for_month(month: u32, year: i32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(BillingError::invalid("month", format!("{} is not between 1 and 12", month)));
        }

        let start_date = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| BillingError::invalid("year", format!("{} is out of range", year)))?;
        let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        let end_date = NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .and_then(|d| d.pred_opt())
            .ok_or_else(|| BillingError::invalid("year", format!("{} is out of range", year)))?;

        Ok(Self { start_date, end_date })
    }

    pub fn total_days(&self) -> u32 {
        self.end_date.day()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}
