//! read-only views over live bills

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bill::Bill;
use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::store::{BillFilter, BillStore};
use crate::types::{MessId, PaymentStatus};

/// financial totals for one mess and month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingSummary {
    pub mess_id: MessId,
    pub month: u32,
    pub year: i32,
    pub total_bills: usize,
    pub total_amount: Money,
    pub total_collected: Money,
    pub total_due: Money,
    pub paid_bills: usize,
    pub unpaid_bills: usize,
    pub overdue_bills: usize,
    pub partially_paid_bills: usize,
    pub waived_bills: usize,
}

impl BillingSummary {
    pub fn from_bills(mess_id: &str, month: u32, year: i32, bills: &[Bill]) -> Self {
        let count = |status: PaymentStatus| bills.iter().filter(|b| b.payment_status == status).count();

        Self {
            mess_id: mess_id.to_string(),
            month,
            year,
            total_bills: bills.len(),
            total_amount: bills.iter().map(|b| b.total_amount).sum(),
            total_collected: bills.iter().map(|b| b.amount_paid).sum(),
            total_due: bills.iter().map(|b| b.amount_due).sum(),
            paid_bills: count(PaymentStatus::Paid),
            unpaid_bills: count(PaymentStatus::Unpaid),
            overdue_bills: count(PaymentStatus::Overdue),
            partially_paid_bills: count(PaymentStatus::PartiallyPaid),
            waived_bills: count(PaymentStatus::Waived),
        }
    }
}

/// re-derive totals and status as of `now`
///
/// Stored status only moves on writes, so a bill that passed its due date
/// untouched is still persisted as `unpaid`. Readers see it as `overdue`.
pub fn as_of(mut bills: Vec<Bill>, now: DateTime<Utc>) -> Vec<Bill> {
    for bill in bills.iter_mut().filter(|b| b.is_live()) {
        bill.recalculate(now);
    }
    bills
}

/// live bills still expecting money, earliest due first
pub fn unpaid_bills<S: BillStore + ?Sized>(store: &S, mess_id: &str, now: DateTime<Utc>) -> Result<Vec<Bill>> {
    let bills = store.query(&BillFilter::for_mess(mess_id).statuses(&PaymentStatus::OPEN))?;
    Ok(as_of(bills, now))
}

/// unpaid bills whose due date has passed
pub fn overdue_bills<S: BillStore + ?Sized>(store: &S, mess_id: &str, now: DateTime<Utc>) -> Result<Vec<Bill>> {
    let bills = store.query(
        &BillFilter::for_mess(mess_id)
            .statuses(&PaymentStatus::OPEN)
            .due_before(now),
    )?;
    Ok(as_of(bills, now))
}

/// totals over the live bills of a period
pub fn billing_summary<S: BillStore + ?Sized>(
    store: &S,
    mess_id: &str,
    month: u32,
    year: i32,
    now: DateTime<Utc>,
) -> Result<BillingSummary> {
    if !(1..=12).contains(&month) {
        return Err(BillingError::invalid("month", format!("{} is not between 1 and 12", month)));
    }
    let bills = as_of(store.query(&BillFilter::for_mess(mess_id).period(month, year))?, now);
    Ok(BillingSummary::from_bills(mess_id, month, year, &bills))
}
