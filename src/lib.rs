pub mod api;
pub mod bill;
pub mod billing;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod payments;
pub mod service;
pub mod sources;
pub mod store;
pub mod summary;
pub mod types;

// re-export key types
pub use api::{router, Actor, ApiError, ApiResponse, AppState};
pub use bill::{Bill, MealCharge, NewBill, PaymentEvent};
pub use billing::{
    BatchFailure, BatchOutcome, BillGenerator, BillRequest, ChargeBreakdown, LateFeePolicy,
    LateFeeReport, LateFeeScheduler, MessBillRequest,
};
pub use config::BillingConfig;
pub use decimal::Money;
pub use errors::{BillingError, ErrorKind, Result};
pub use events::{BillingEvent, EventStore};
pub use payments::PaymentInput;
pub use service::BillingService;
pub use sources::{
    AttendanceRecord, AttendanceSource, AttendanceSummary, MemoryAttendance, MemoryDirectory,
    StudentDirectory,
};
pub use store::{BillFilter, BillStore, MemoryBillStore};
pub use summary::BillingSummary;
pub use types::{
    ActorId, BillId, BillingPeriod, MealType, MessId, PaymentEventStatus, PaymentMethod,
    PaymentStatus, StudentId,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
