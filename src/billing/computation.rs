use chrono::{DateTime, Utc};
use tracing::debug;

use crate::bill::Bill;
use crate::decimal::Money;
use crate::types::PaymentStatus;

/// independent charge inputs of a bill
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChargeBreakdown {
    pub base_amount: Money,
    pub fixed_charges: Money,
    pub late_fee: Money,
    pub adjustments: Money,
    pub discount: Money,
}

impl ChargeBreakdown {
    pub fn of(bill: &Bill) -> Self {
        Self {
            base_amount: bill.base_amount,
            fixed_charges: bill.fixed_charges,
            late_fee: bill.late_fee,
            adjustments: bill.adjustments,
            discount: bill.discount,
        }
    }

    /// total payable, never negative
    pub fn total(&self) -> Money {
        (self.base_amount + self.fixed_charges + self.late_fee + self.adjustments - self.discount)
            .clamp_non_negative()
    }
}

/// balance left to pay, never negative
pub fn amount_due(total_amount: Money, amount_paid: Money) -> Money {
    (total_amount - amount_paid).clamp_non_negative()
}

/// classify a bill; the first matching rule wins
pub fn derive_status(
    total_amount: Money,
    amount_paid: Money,
    amount_due: Money,
    due_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> PaymentStatus {
    if !amount_due.is_positive() && total_amount.is_positive() {
        PaymentStatus::Paid
    } else if amount_paid.is_positive() && amount_due.is_positive() {
        // any payment keeps a bill out of overdue
        PaymentStatus::PartiallyPaid
    } else if now > due_date && amount_due.is_positive() {
        PaymentStatus::Overdue
    } else if total_amount.is_zero() {
        PaymentStatus::Waived
    } else {
        PaymentStatus::Unpaid
    }
}

/// recompute every derived field of a bill from its inputs
pub fn recalculate(bill: &mut Bill, now: DateTime<Utc>) {
    if !bill.meal_wise_charges.is_empty() {
        bill.base_amount = bill.meal_wise_charges.iter().map(|c| c.total_amount).sum();
    }

    bill.total_amount = ChargeBreakdown::of(bill).total();
    bill.amount_due = amount_due(bill.total_amount, bill.amount_paid);
    bill.payment_status = derive_status(
        bill.total_amount,
        bill.amount_paid,
        bill.amount_due,
        bill.due_date,
        now,
    );

    if bill.payment_status == PaymentStatus::Paid
        && bill.paid_date.is_none()
        && bill.amount_paid.is_positive()
    {
        bill.paid_date = Some(now);
    }

    debug!(
        bill_number = %bill.bill_number,
        total = %bill.total_amount,
        due = %bill.amount_due,
        status = %bill.payment_status,
        "bill recalculated"
    );
}
