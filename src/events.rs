use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{ActorId, BillId, MessId, PaymentMethod, PaymentStatus, StudentId};

/// all events that can be emitted by the billing engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BillingEvent {
    // generation events
    BillGenerated {
        bill_id: BillId,
        bill_number: String,
        student_id: StudentId,
        total_amount: Money,
        due_date: DateTime<Utc>,
        generated_by: ActorId,
    },
    BatchGenerationCompleted {
        mess_id: MessId,
        month: u32,
        year: i32,
        generated: usize,
        errors: usize,
        timestamp: DateTime<Utc>,
    },

    // payment events
    PaymentRecorded {
        bill_id: BillId,
        amount: Money,
        method: PaymentMethod,
        amount_due: Money,
        received_by: ActorId,
        timestamp: DateTime<Utc>,
    },
    BillSettled {
        bill_id: BillId,
        amount_paid: Money,
        timestamp: DateTime<Utc>,
    },

    // charge events
    DiscountApplied {
        bill_id: BillId,
        amount: Money,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    AdjustmentApplied {
        bill_id: BillId,
        amount: Money,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    LateFeeApplied {
        bill_id: BillId,
        fee_amount: Money,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    // lifecycle events
    StatusChanged {
        bill_id: BillId,
        old_status: PaymentStatus,
        new_status: PaymentStatus,
        timestamp: DateTime<Utc>,
    },
    BillCancelled {
        bill_id: BillId,
        cancelled_by: ActorId,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<BillingEvent>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: BillingEvent) {
        self.events.push(event);
    }

    /// emit a status change only when the status actually moved
    pub fn emit_status_change(
        &mut self,
        bill_id: BillId,
        old_status: PaymentStatus,
        new_status: PaymentStatus,
        timestamp: DateTime<Utc>,
    ) {
        if old_status != new_status {
            self.emit(BillingEvent::StatusChanged {
                bill_id,
                old_status,
                new_status,
                timestamp,
            });
        }
    }

    pub fn take_events(&mut self) -> Vec<BillingEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[BillingEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_change_only_when_moved() {
        let mut store = EventStore::new();
        let bill_id = Uuid::new_v4();
        let now = Utc::now();

        store.emit_status_change(bill_id, PaymentStatus::Unpaid, PaymentStatus::Unpaid, now);
        assert!(store.events().is_empty());

        store.emit_status_change(bill_id, PaymentStatus::Unpaid, PaymentStatus::Paid, now);
        assert_eq!(store.events().len(), 1);

        let taken = store.take_events();
        assert_eq!(taken.len(), 1);
        assert!(store.events().is_empty());
    }
}
