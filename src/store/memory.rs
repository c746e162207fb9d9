use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::bill::Bill;
use crate::errors::{BillingError, Result};
use crate::store::{BillFilter, BillStore, Mutation};
use crate::types::{BillId, StudentId};

#[derive(Debug, Default)]
struct Inner {
    bills: HashMap<BillId, Bill>,
    /// bill number -> id
    numbers: HashMap<String, BillId>,
    /// (student, month, year) -> id of the live bill
    live_periods: HashMap<(StudentId, u32, i32), BillId>,
    /// "<mess>-<yyyymm>" -> last issued sequence
    sequences: HashMap<String, u32>,
}

impl Inner {
    fn check_unique(&self, bill: &Bill) -> Result<()> {
        if self.numbers.contains_key(&bill.bill_number) {
            return Err(BillingError::DuplicateBillNumber {
                bill_number: bill.bill_number.clone(),
            });
        }
        if bill.is_live() && self.live_periods.contains_key(&period_key(bill)) {
            return Err(BillingError::DuplicateBill {
                student_id: bill.student_id,
                month: bill.month,
                year: bill.year,
            });
        }
        Ok(())
    }
}

fn period_key(bill: &Bill) -> (StudentId, u32, i32) {
    (bill.student_id, bill.month, bill.year)
}

/// in-process bill store; every operation holds one lock, so checks and
/// writes are atomic with respect to each other
#[derive(Debug, Default)]
pub struct MemoryBillStore {
    inner: Mutex<Inner>,
}

impl MemoryBillStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.bills.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| BillingError::storage("bill store lock poisoned"))
    }
}

impl BillStore for MemoryBillStore {
    fn insert(&self, bill: Bill) -> Result<Bill> {
        let mut inner = self.lock()?;
        inner.check_unique(&bill)?;

        inner.numbers.insert(bill.bill_number.clone(), bill.id);
        if bill.is_live() {
            inner.live_periods.insert(period_key(&bill), bill.id);
        }
        inner.bills.insert(bill.id, bill.clone());
        Ok(bill)
    }

    fn get(&self, id: BillId) -> Result<Option<Bill>> {
        Ok(self.lock()?.bills.get(&id).cloned())
    }

    fn find_active_for_period(&self, student_id: StudentId, month: u32, year: i32) -> Result<Option<Bill>> {
        let inner = self.lock()?;
        Ok(inner
            .live_periods
            .get(&(student_id, month, year))
            .and_then(|id| inner.bills.get(id))
            .cloned())
    }

    fn query(&self, filter: &BillFilter) -> Result<Vec<Bill>> {
        let inner = self.lock()?;
        let mut bills: Vec<Bill> = inner
            .bills
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        bills.sort_by(|a, b| {
            a.due_date
                .cmp(&b.due_date)
                .then_with(|| a.bill_number.cmp(&b.bill_number))
        });
        Ok(bills)
    }

    fn next_bill_sequence(&self, mess_id: &str, year: i32, month: u32) -> Result<u32> {
        let mut inner = self.lock()?;
        let counter = inner
            .sequences
            .entry(format!("{}-{}{:02}", mess_id, year, month))
            .or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    fn modify(&self, id: BillId, mutation: Mutation<'_>) -> Result<Option<Bill>> {
        let mut inner = self.lock()?;
        let current = inner
            .bills
            .get(&id)
            .ok_or_else(|| BillingError::bill_not_found(id))?;

        let mut updated = current.clone();
        if !mutation(&mut updated)? {
            return Ok(None);
        }

        if updated.id != current.id {
            return Err(BillingError::ImmutableField {
                field: "id".to_string(),
            });
        }
        if updated.bill_number != current.bill_number {
            return Err(BillingError::ImmutableField {
                field: "bill_number".to_string(),
            });
        }
        if updated.student_id != current.student_id
            || updated.month != current.month
            || updated.year != current.year
        {
            return Err(BillingError::ImmutableField {
                field: "billing period".to_string(),
            });
        }

        let was_live = current.is_live();
        if was_live && !updated.is_live() {
            inner.live_periods.remove(&period_key(&updated));
        }
        inner.bills.insert(id, updated.clone());
        Ok(Some(updated))
    }
}
