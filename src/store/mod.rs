pub mod memory;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::bill::Bill;
use crate::errors::Result;
use crate::types::{BillId, PaymentStatus, StudentId};

pub use memory::MemoryBillStore;

/// selection criteria for bill queries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BillFilter {
    pub mess_id: Option<String>,
    pub student_id: Option<StudentId>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    /// any of these statuses; empty matches all
    pub statuses: Vec<PaymentStatus>,
    /// due date strictly before this instant
    pub due_before: Option<DateTime<Utc>>,
    /// include cancelled and inactive bills
    pub include_cancelled: bool,
    /// only bills without a late fee
    pub late_fee_unset: bool,
}

impl BillFilter {
    /// live bills of a mess
    pub fn for_mess(mess_id: &str) -> Self {
        Self {
            mess_id: Some(mess_id.to_string()),
            ..Self::default()
        }
    }

    pub fn period(mut self, month: u32, year: i32) -> Self {
        self.month = Some(month);
        self.year = Some(year);
        self
    }

    pub fn statuses(mut self, statuses: &[PaymentStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    pub fn due_before(mut self, instant: DateTime<Utc>) -> Self {
        self.due_before = Some(instant);
        self
    }

    pub fn matches(&self, bill: &Bill) -> bool {
        if !self.include_cancelled && !bill.is_live() {
            return false;
        }
        if let Some(mess_id) = &self.mess_id {
            if &bill.mess_id != mess_id {
                return false;
            }
        }
        if self.student_id.is_some_and(|s| s != bill.student_id) {
            return false;
        }
        if self.month.is_some_and(|m| m != bill.month) {
            return false;
        }
        if self.year.is_some_and(|y| y != bill.year) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&bill.payment_status) {
            return false;
        }
        if self.due_before.is_some_and(|t| bill.due_date >= t) {
            return false;
        }
        if self.late_fee_unset && !bill.late_fee.is_zero() {
            return false;
        }
        true
    }
}

/// a single-bill change applied under the store's write guard; `Ok(false)`
/// declines the change and nothing is written
pub type Mutation<'a> = &'a mut dyn FnMut(&mut Bill) -> Result<bool>;

/// persistence for bills
///
/// Implementations own the uniqueness rules: one live bill per
/// (student, month, year) and globally unique bill numbers. A prior
/// existence check by the caller is not a substitute for either.
pub trait BillStore {
    /// persist a new bill, failing with a duplicate error on either unique key
    fn insert(&self, bill: Bill) -> Result<Bill>;

    fn get(&self, id: BillId) -> Result<Option<Bill>>;

    /// the live bill for a student and period, if any
    fn find_active_for_period(&self, student_id: StudentId, month: u32, year: i32) -> Result<Option<Bill>>;

    /// matching bills ordered by due date, then bill number
    fn query(&self, filter: &BillFilter) -> Result<Vec<Bill>>;

    /// next value of the per-(mess, year, month) bill counter, starting at 1
    fn next_bill_sequence(&self, mess_id: &str, year: i32, month: u32) -> Result<u32>;

    /// atomically read, mutate and write back one bill; returns the written
    /// bill, or `None` when the mutation declined
    fn modify(&self, id: BillId, mutation: Mutation<'_>) -> Result<Option<Bill>>;
}

impl<S: BillStore + ?Sized> BillStore for Arc<S> {
    fn insert(&self, bill: Bill) -> Result<Bill> {
        (**self).insert(bill)
    }

    fn get(&self, id: BillId) -> Result<Option<Bill>> {
        (**self).get(id)
    }

    fn find_active_for_period(&self, student_id: StudentId, month: u32, year: i32) -> Result<Option<Bill>> {
        (**self).find_active_for_period(student_id, month, year)
    }

    fn query(&self, filter: &BillFilter) -> Result<Vec<Bill>> {
        (**self).query(filter)
    }

    fn next_bill_sequence(&self, mess_id: &str, year: i32, month: u32) -> Result<u32> {
        (**self).next_bill_sequence(mess_id, year, month)
    }

    fn modify(&self, id: BillId, mutation: Mutation<'_>) -> Result<Option<Bill>> {
        (**self).modify(id, mutation)
    }
}
