use hourglass_rs::SafeTimeProvider;
use tracing::info;

use crate::bill::{Bill, MealCharge};
use crate::billing::{
    BatchOutcome, BillGenerator, BillRequest, LateFeePolicy, LateFeeReport, LateFeeScheduler,
    MessBillRequest,
};
use crate::config::BillingConfig;
use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::events::{BillingEvent, EventStore};
use crate::payments::PaymentInput;
use crate::sources::{AttendanceSource, StudentDirectory};
use crate::store::{BillFilter, BillStore};
use crate::summary::{self, BillingSummary};
use crate::types::{ActorId, BillId, PaymentStatus, StudentId};

/// billing engine wired to its storage and collaborators
pub struct BillingService<S, A, D> {
    store: S,
    attendance: A,
    directory: D,
    generator: BillGenerator,
    late_fees: LateFeeScheduler,
    pub events: EventStore,
}

impl<S, A, D> BillingService<S, A, D>
where
    S: BillStore,
    A: AttendanceSource,
    D: StudentDirectory,
{
    pub fn new(store: S, attendance: A, directory: D, config: BillingConfig) -> Result<Self> {
        config.validate()?;
        let policy = LateFeePolicy::new(config.late_fee_amount)?;

        Ok(Self {
            store,
            attendance,
            directory,
            generator: BillGenerator::new(config),
            late_fees: LateFeeScheduler::new(policy),
            events: EventStore::new(),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &BillingConfig {
        self.generator.config()
    }

    /// generate one student's bill for a month
    pub fn generate_bill(
        &mut self,
        request: &BillRequest,
        generated_by: ActorId,
        time_provider: &SafeTimeProvider,
    ) -> Result<Bill> {
        let bill = self.generator.generate(
            &self.store,
            &self.attendance,
            &self.directory,
            request,
            generated_by,
            time_provider.now(),
        )?;
        self.emit_generated(&bill);
        Ok(bill)
    }

    /// generate bills for every student enrolled in a mess
    pub fn generate_for_mess(
        &mut self,
        request: &MessBillRequest,
        generated_by: ActorId,
        time_provider: &SafeTimeProvider,
    ) -> Result<BatchOutcome> {
        let now = time_provider.now();
        let (outcome, bills) = self.generator.generate_for_mess(
            &self.store,
            &self.attendance,
            &self.directory,
            request,
            generated_by,
            now,
        )?;

        for bill in &bills {
            self.emit_generated(bill);
        }
        self.events.emit(BillingEvent::BatchGenerationCompleted {
            mess_id: request.mess_id.clone(),
            month: request.month,
            year: request.year,
            generated: outcome.generated,
            errors: outcome.errors,
            timestamp: now,
        });

        Ok(outcome)
    }

    /// any bill by id, cancelled ones included
    pub fn get_bill(&self, id: BillId, time_provider: &SafeTimeProvider) -> Result<Bill> {
        let mut bill = self.store.get(id)?.ok_or_else(|| BillingError::bill_not_found(id))?;
        if bill.is_live() {
            bill.recalculate(time_provider.now());
        }
        Ok(bill)
    }

    /// a student's live bills, optionally narrowed to a month and/or year
    pub fn student_bills(
        &self,
        student_id: StudentId,
        month: Option<u32>,
        year: Option<i32>,
        time_provider: &SafeTimeProvider,
    ) -> Result<Vec<Bill>> {
        let bills = self.store.query(&BillFilter {
            student_id: Some(student_id),
            month,
            year,
            ..BillFilter::default()
        })?;
        let mut bills = summary::as_of(bills, time_provider.now());
        // newest period first
        bills.sort_by(|a, b| (b.year, b.month).cmp(&(a.year, a.month)));
        Ok(bills)
    }

    /// record a manual payment
    pub fn add_payment(
        &mut self,
        id: BillId,
        payment: &PaymentInput,
        received_by: ActorId,
        time_provider: &SafeTimeProvider,
    ) -> Result<Bill> {
        let now = time_provider.now();
        let (old_status, bill) = self.update_bill(id, |bill| bill.add_payment(payment, received_by, now))?;

        self.events.emit(BillingEvent::PaymentRecorded {
            bill_id: bill.id,
            amount: payment.amount,
            method: payment.method,
            amount_due: bill.amount_due,
            received_by,
            timestamp: now,
        });
        if bill.payment_status == PaymentStatus::Paid && old_status != PaymentStatus::Paid {
            self.events.emit(BillingEvent::BillSettled {
                bill_id: bill.id,
                amount_paid: bill.amount_paid,
                timestamp: now,
            });
        }
        self.events.emit_status_change(bill.id, old_status, bill.payment_status, now);

        info!(
            bill_number = %bill.bill_number,
            amount = %payment.amount,
            due = %bill.amount_due,
            status = %bill.payment_status,
            "payment recorded"
        );
        Ok(bill)
    }

    pub fn apply_discount(
        &mut self,
        id: BillId,
        amount: Money,
        reason: &str,
        time_provider: &SafeTimeProvider,
    ) -> Result<Bill> {
        let now = time_provider.now();
        let (old_status, bill) = self.update_bill(id, |bill| bill.apply_discount(amount, reason, now))?;

        self.events.emit(BillingEvent::DiscountApplied {
            bill_id: bill.id,
            amount,
            reason: reason.to_string(),
            timestamp: now,
        });
        self.events.emit_status_change(bill.id, old_status, bill.payment_status, now);

        info!(bill_number = %bill.bill_number, %amount, "discount applied");
        Ok(bill)
    }

    /// set a late fee by hand, outside the scheduled run
    pub fn apply_late_fee(
        &mut self,
        id: BillId,
        amount: Money,
        reason: &str,
        time_provider: &SafeTimeProvider,
    ) -> Result<Bill> {
        let now = time_provider.now();
        let (old_status, bill) = self.update_bill(id, |bill| bill.apply_late_fee(amount, reason, now))?;

        self.events.emit(BillingEvent::LateFeeApplied {
            bill_id: bill.id,
            fee_amount: amount,
            reason: reason.to_string(),
            timestamp: now,
        });
        self.events.emit_status_change(bill.id, old_status, bill.payment_status, now);

        info!(bill_number = %bill.bill_number, %amount, "late fee applied");
        Ok(bill)
    }

    pub fn apply_adjustment(
        &mut self,
        id: BillId,
        amount: Money,
        reason: &str,
        time_provider: &SafeTimeProvider,
    ) -> Result<Bill> {
        let now = time_provider.now();
        let (old_status, bill) = self.update_bill(id, |bill| bill.apply_adjustment(amount, reason, now))?;

        self.events.emit(BillingEvent::AdjustmentApplied {
            bill_id: bill.id,
            amount,
            reason: reason.to_string(),
            timestamp: now,
        });
        self.events.emit_status_change(bill.id, old_status, bill.payment_status, now);

        info!(bill_number = %bill.bill_number, %amount, "adjustment applied");
        Ok(bill)
    }

    /// replace the meal-wise breakdown of a bill
    pub fn set_meal_charges(
        &mut self,
        id: BillId,
        charges: Vec<MealCharge>,
        time_provider: &SafeTimeProvider,
    ) -> Result<Bill> {
        let now = time_provider.now();
        let (old_status, bill) = self.update_bill(id, |bill| bill.set_meal_charges(charges.clone(), now))?;

        self.events.emit_status_change(bill.id, old_status, bill.payment_status, now);
        Ok(bill)
    }

    /// soft-delete a bill; its period can then be billed again
    pub fn cancel_bill(
        &mut self,
        id: BillId,
        actor: ActorId,
        reason: &str,
        time_provider: &SafeTimeProvider,
    ) -> Result<Bill> {
        let now = time_provider.now();
        let (_, bill) = self.update_bill(id, |bill| bill.cancel(actor, reason, now))?;

        self.events.emit(BillingEvent::BillCancelled {
            bill_id: bill.id,
            cancelled_by: actor,
            reason: reason.to_string(),
            timestamp: now,
        });

        info!(bill_number = %bill.bill_number, %reason, "bill cancelled");
        Ok(bill)
    }

    /// apply the configured late fee to every overdue bill still without one
    pub fn run_late_fees(&mut self, time_provider: &SafeTimeProvider) -> Result<LateFeeReport> {
        let now = time_provider.now();
        let report = self.late_fees.run(&self.store, now)?;

        for fee in &report.applied {
            self.events.emit(BillingEvent::LateFeeApplied {
                bill_id: fee.bill_id,
                fee_amount: fee.fee_amount,
                reason: fee.reason.clone(),
                timestamp: now,
            });
        }
        Ok(report)
    }

    pub fn unpaid_bills(&self, mess_id: &str, time_provider: &SafeTimeProvider) -> Result<Vec<Bill>> {
        summary::unpaid_bills(&self.store, mess_id, time_provider.now())
    }

    pub fn overdue_bills(&self, mess_id: &str, time_provider: &SafeTimeProvider) -> Result<Vec<Bill>> {
        summary::overdue_bills(&self.store, mess_id, time_provider.now())
    }

    pub fn billing_summary(
        &self,
        mess_id: &str,
        month: u32,
        year: i32,
        time_provider: &SafeTimeProvider,
    ) -> Result<BillingSummary> {
        summary::billing_summary(&self.store, mess_id, month, year, time_provider.now())
    }

    /// get events
    pub fn take_events(&mut self) -> Vec<BillingEvent> {
        self.events.take_events()
    }

    fn emit_generated(&mut self, bill: &Bill) {
        self.events.emit(BillingEvent::BillGenerated {
            bill_id: bill.id,
            bill_number: bill.bill_number.clone(),
            student_id: bill.student_id,
            total_amount: bill.total_amount,
            due_date: bill.due_date,
            generated_by: bill.generated_by,
        });
    }

    /// apply one change atomically; returns the status before it and the written bill
    fn update_bill<F>(&self, id: BillId, mut change: F) -> Result<(PaymentStatus, Bill)>
    where
        F: FnMut(&mut Bill) -> Result<()>,
    {
        let mut old_status = None;
        let written = self.store.modify(id, &mut |bill| {
            old_status = Some(bill.payment_status);
            change(bill)?;
            Ok(true)
        })?;

        let bill = written.ok_or_else(|| BillingError::storage(format!("update of bill {} was not written", id)))?;
        Ok((old_status.unwrap_or(bill.payment_status), bill))
    }
}
