use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bill::Bill;
use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::store::{BillFilter, BillStore};
use crate::types::{BillId, PaymentStatus};

/// flat one-time late fee
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LateFeePolicy {
    pub fee_amount: Money,
}

impl LateFeePolicy {
    pub fn new(fee_amount: Money) -> Result<Self> {
        if fee_amount.is_negative() {
            return Err(BillingError::invalid("late_fee", "cannot be negative"));
        }
        Ok(Self { fee_amount })
    }

    /// the fee owed by a bill right now, if it is a candidate at all
    pub fn assess(&self, bill: &Bill, now: DateTime<Utc>) -> Option<LateFeeAssessment> {
        if !bill.is_late_fee_candidate(now) {
            return None;
        }
        let days_overdue = bill.days_overdue(now);
        Some(LateFeeAssessment {
            bill_id: bill.id,
            fee_amount: self.fee_amount,
            days_overdue,
            reason: format!("{} days overdue", days_overdue),
        })
    }
}

/// a late fee decided for one bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LateFeeAssessment {
    pub bill_id: BillId,
    pub fee_amount: Money,
    pub days_overdue: u32,
    pub reason: String,
}

/// bill that could not be updated during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LateFeeFailure {
    pub bill_id: BillId,
    pub message: String,
}

/// result of one scheduler run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LateFeeReport {
    /// bills that received a fee
    pub updated: usize,
    /// candidates that no longer qualified by the time they were updated
    pub skipped: usize,
    pub applied: Vec<LateFeeAssessment>,
    pub failed: Vec<LateFeeFailure>,
}

/// applies the late fee to every overdue bill that has none yet
pub struct LateFeeScheduler {
    policy: LateFeePolicy,
}

impl LateFeeScheduler {
    pub fn new(policy: LateFeePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &LateFeePolicy {
        &self.policy
    }

    /// safe to run repeatedly and concurrently: eligibility is re-checked
    /// inside the store's conditional update, so a fee lands at most once
    pub fn run<S: BillStore + ?Sized>(&self, store: &S, now: DateTime<Utc>) -> Result<LateFeeReport> {
        let filter = BillFilter {
            statuses: PaymentStatus::OPEN.to_vec(),
            due_before: Some(now),
            late_fee_unset: true,
            ..BillFilter::default()
        };
        let candidates = store.query(&filter)?;
        let mut report = LateFeeReport::default();

        for candidate in candidates {
            let mut assessment = None;
            let result = store.modify(candidate.id, &mut |bill| {
                let Some(fee) = self.policy.assess(bill, now) else {
                    return Ok(false);
                };
                bill.apply_late_fee(fee.fee_amount, &fee.reason, now)?;
                assessment = Some(fee);
                Ok(true)
            });

            match result {
                Ok(Some(_)) => {
                    if let Some(fee) = assessment {
                        debug!(bill_number = %candidate.bill_number, reason = %fee.reason, "late fee applied");
                        report.applied.push(fee);
                    }
                    report.updated += 1;
                }
                Ok(None) => {
                    debug!(bill_number = %candidate.bill_number, "late fee no longer applicable");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(bill_number = %candidate.bill_number, error = %e, "late fee not applied");
                    report.failed.push(LateFeeFailure {
                        bill_id: candidate.id,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed.len(),
            "late fee run finished"
        );

        Ok(report)
    }
}
