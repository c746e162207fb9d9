pub mod computation;
pub mod generation;
pub mod late_fee;

pub use computation::{amount_due, derive_status, recalculate, ChargeBreakdown};
pub use generation::{
    format_bill_number, BatchFailure, BatchOutcome, BillGenerator, BillRequest, MessBillRequest,
};
pub use late_fee::{LateFeeAssessment, LateFeeFailure, LateFeePolicy, LateFeeReport, LateFeeScheduler};
