use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::billing::computation;
use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::payments::PaymentInput;
use crate::sources::AttendanceSummary;
use crate::types::{
    ActorId, BillId, BillingPeriod, MealType, MessId, PaymentEventStatus, PaymentMethod,
    PaymentStatus, StudentId,
};

/// longest free-text remarks a bill can carry
pub const MAX_REMARKS_LEN: usize = 1000;

/// one student's charge for one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    // identification
    pub id: BillId,
    pub bill_number: String,
    pub student_id: StudentId,
    pub mess_id: MessId,

    // period
    pub month: u32,
    pub year: i32,
    pub billing_period: BillingPeriod,
    pub total_days_in_month: u32,
    pub due_date: DateTime<Utc>,

    // attendance
    pub days_present: u32,
    pub days_absent: u32,
    pub total_meals_consumed: u32,

    // charge inputs
    pub meal_wise_charges: Vec<MealCharge>,
    pub base_amount: Money,
    pub fixed_charges: Money,
    pub discount: Money,
    pub discount_reason: Option<String>,
    pub late_fee: Money,
    pub adjustments: Money,
    pub adjustment_reason: Option<String>,

    // derived, only written by the recompute
    pub total_amount: Money,
    pub amount_due: Money,
    pub payment_status: PaymentStatus,

    // ledger
    pub amount_paid: Money,
    pub payment_history: Vec<PaymentEvent>,
    pub paid_date: Option<DateTime<Utc>>,

    pub remarks: Option<String>,

    // lifecycle
    pub is_active: bool,
    pub is_cancelled: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<ActorId>,
    pub cancellation_reason: Option<String>,

    // provenance
    pub generated_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// a recorded payment, append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub amount: Money,
    pub payment_date: DateTime<Utc>,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub payment_status: PaymentEventStatus,
    pub remarks: Option<String>,
    pub received_by: ActorId,
}

/// per-meal charge line; when any are present they define the base amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealCharge {
    pub meal_type: MealType,
    pub rate: Money,
    pub days_consumed: u32,
    pub total_amount: Money,
}

impl MealCharge {
    pub fn new(meal_type: MealType, rate: Money, days_consumed: u32) -> Result<Self> {
        if rate.is_negative() {
            return Err(BillingError::invalid("rate", "meal rate cannot be negative"));
        }
        let total_amount = rate
            .ensure_input("rate")?
            .checked_mul(days_consumed)
            .ok_or_else(|| BillingError::invalid("days_consumed", "meal charge is too large"))?;
        Ok(Self {
            meal_type,
            rate,
            days_consumed,
            total_amount,
        })
    }
}

/// everything needed to issue a bill
#[derive(Debug, Clone)]
pub struct NewBill {
    pub bill_number: String,
    pub student_id: StudentId,
    pub mess_id: MessId,
    pub month: u32,
    pub year: i32,
    pub billing_period: BillingPeriod,
    pub attendance: AttendanceSummary,
    pub base_amount: Money,
    pub fixed_charges: Money,
    pub due_date: DateTime<Utc>,
    pub generated_by: ActorId,
}

impl Bill {
    /// issue a fresh bill with an empty ledger
    pub fn issue(new: NewBill, now: DateTime<Utc>) -> Self {
        let mut bill = Self {
            id: Uuid::new_v4(),
            bill_number: new.bill_number,
            student_id: new.student_id,
            mess_id: new.mess_id,
            month: new.month,
            year: new.year,
            billing_period: new.billing_period,
            total_days_in_month: new.attendance.total_days,
            due_date: new.due_date,
            days_present: new.attendance.days_present,
            days_absent: new.attendance.days_absent,
            total_meals_consumed: new.attendance.total_meals_consumed,
            meal_wise_charges: Vec::new(),
            base_amount: new.base_amount,
            fixed_charges: new.fixed_charges,
            discount: Money::ZERO,
            discount_reason: None,
            late_fee: Money::ZERO,
            adjustments: Money::ZERO,
            adjustment_reason: None,
            total_amount: Money::ZERO,
            amount_due: Money::ZERO,
            payment_status: PaymentStatus::Unpaid,
            amount_paid: Money::ZERO,
            payment_history: Vec::new(),
            paid_date: None,
            remarks: None,
            is_active: true,
            is_cancelled: false,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            generated_by: new.generated_by,
            created_at: now,
            updated_at: now,
        };
        bill.recalculate(now);
        bill
    }

    /// recompute derived totals and status
    pub fn recalculate(&mut self, now: DateTime<Utc>) {
        computation::recalculate(self, now);
    }

    /// counts towards uniqueness and aggregates
    pub fn is_live(&self) -> bool {
        self.is_active && !self.is_cancelled
    }

    pub fn ensure_mutable(&self) -> Result<()> {
        if self.is_cancelled {
            return Err(BillingError::BillCancelled {
                bill_number: self.bill_number.clone(),
            });
        }
        Ok(())
    }

    /// record a successful payment
    pub fn add_payment(
        &mut self,
        payment: &PaymentInput,
        received_by: ActorId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_mutable()?;
        payment.validate()?;
        let amount_paid = self
            .amount_paid
            .checked_add(payment.amount)
            .ok_or_else(|| BillingError::invalid("amount", "total paid is too large"))?;

        self.payment_history.push(PaymentEvent {
            amount: payment.amount,
            payment_date: now,
            payment_method: payment.method,
            transaction_id: payment.transaction_id.clone(),
            payment_status: PaymentEventStatus::Success,
            remarks: payment.remarks.clone(),
            received_by,
        });
        self.amount_paid = amount_paid;

        self.touch(now);
        Ok(())
    }

    /// set the discount, replacing any earlier one
    pub fn apply_discount(&mut self, amount: Money, reason: &str, now: DateTime<Utc>) -> Result<()> {
        self.ensure_mutable()?;
        if amount.is_negative() {
            return Err(BillingError::invalid("discount", "cannot be negative"));
        }
        amount.ensure_input("discount")?;

        self.discount = amount;
        self.discount_reason = Some(reason.to_string());

        self.touch(now);
        Ok(())
    }

    /// set the late fee, replacing any earlier one, and note it in the remarks
    pub fn apply_late_fee(&mut self, amount: Money, reason: &str, now: DateTime<Utc>) -> Result<()> {
        self.ensure_mutable()?;
        if amount.is_negative() {
            return Err(BillingError::invalid("late_fee", "cannot be negative"));
        }
        amount.ensure_input("late_fee")?;

        self.append_remark(&format!("Late Fee Applied: {}", reason))?;
        self.late_fee = amount;

        self.touch(now);
        Ok(())
    }

    /// set a signed manual correction, replacing any earlier one
    pub fn apply_adjustment(&mut self, amount: Money, reason: &str, now: DateTime<Utc>) -> Result<()> {
        self.ensure_mutable()?;
        amount.ensure_input("adjustments")?;

        self.adjustments = amount;
        self.adjustment_reason = Some(reason.to_string());

        self.touch(now);
        Ok(())
    }

    /// replace the meal-wise breakdown; a non-empty one overrides the base amount
    pub fn set_meal_charges(&mut self, charges: Vec<MealCharge>, now: DateTime<Utc>) -> Result<()> {
        self.ensure_mutable()?;

        self.meal_wise_charges = charges;

        self.touch(now);
        Ok(())
    }

    /// soft-delete; terminal
    pub fn cancel(&mut self, actor: ActorId, reason: &str, now: DateTime<Utc>) -> Result<()> {
        self.ensure_mutable()?;

        self.is_cancelled = true;
        self.is_active = false;
        self.cancelled_at = Some(now);
        self.cancelled_by = Some(actor);
        self.cancellation_reason = Some(reason.to_string());

        self.updated_at = now;
        Ok(())
    }

    /// whole days past the due date, zero before it
    pub fn days_overdue(&self, now: DateTime<Utc>) -> u32 {
        if now <= self.due_date {
            return 0;
        }
        (now - self.due_date).num_days() as u32
    }

    /// eligible for the one-time automatic late fee
    pub fn is_late_fee_candidate(&self, now: DateTime<Utc>) -> bool {
        self.is_live()
            && self.due_date < now
            && self.payment_status.is_open()
            && self.late_fee.is_zero()
    }

    fn append_remark(&mut self, line: &str) -> Result<()> {
        let remarks = match &self.remarks {
            Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, line),
            _ => line.to_string(),
        };
        if remarks.chars().count() > MAX_REMARKS_LEN {
            return Err(BillingError::invalid(
                "remarks",
                format!("cannot exceed {} characters", MAX_REMARKS_LEN),
            ));
        }
        self.remarks = Some(remarks);
        Ok(())
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.recalculate(now);
    }
}
