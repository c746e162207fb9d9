use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bill::{Bill, NewBill};
use crate::config::BillingConfig;
use crate::decimal::Money;
use crate::errors::{BillingError, ErrorKind, Result};
use crate::sources::{AttendanceSource, AttendanceSummary, StudentDirectory};
use crate::store::BillStore;
use crate::types::{ActorId, BillingPeriod, MessId, StudentId};

/// bill for one student and month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillRequest {
    pub student_id: StudentId,
    pub mess_id: MessId,
    pub month: u32,
    pub year: i32,
    pub food_cost_per_day: Money,
    #[serde(default)]
    pub fixed_charges: Money,
}

/// bills for every enrolled student of a mess
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessBillRequest {
    pub mess_id: MessId,
    pub month: u32,
    pub year: i32,
    pub food_cost_per_day: Money,
    #[serde(default)]
    pub fixed_charges: Money,
}

impl MessBillRequest {
    pub fn for_student(&self, student_id: StudentId) -> BillRequest {
        BillRequest {
            student_id,
            mess_id: self.mess_id.clone(),
            month: self.month,
            year: self.year,
            food_cost_per_day: self.food_cost_per_day,
            fixed_charges: self.fixed_charges,
        }
    }
}

/// why one student's bill was not generated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub student_id: StudentId,
    pub kind: ErrorKind,
    pub message: String,
}

/// result of a batch generation run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub generated: usize,
    pub errors: usize,
    pub bill_numbers: Vec<String>,
    pub failures: Vec<BatchFailure>,
}

/// `<mess>-<yyyy><mm>-<seq>` with the sequence zero-padded
pub fn format_bill_number(mess_id: &str, year: i32, month: u32, sequence: u32, width: usize) -> String {
    format!("{}-{}{:02}-{:0width$}", mess_id, year, month, sequence, width = width)
}

/// builds bills from attendance
pub struct BillGenerator {
    config: BillingConfig,
}

impl BillGenerator {
    pub fn new(config: BillingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    /// check the inputs shared by single and batch generation
    pub fn validate_terms(
        &self,
        mess_id: &str,
        month: u32,
        year: i32,
        food_cost_per_day: Money,
        fixed_charges: Money,
    ) -> Result<()> {
        if mess_id.trim().is_empty() {
            return Err(BillingError::invalid("mess_id", "is required"));
        }
        if !(1..=12).contains(&month) {
            return Err(BillingError::invalid("month", format!("{} is not between 1 and 12", month)));
        }
        if year < self.config.min_year {
            return Err(BillingError::invalid(
                "year",
                format!("{} is before {}", year, self.config.min_year),
            ));
        }
        if food_cost_per_day.is_negative() {
            return Err(BillingError::invalid("food_cost_per_day", "cannot be negative"));
        }
        if fixed_charges.is_negative() {
            return Err(BillingError::invalid("fixed_charges", "cannot be negative"));
        }
        food_cost_per_day.ensure_input("food_cost_per_day")?;
        fixed_charges.ensure_input("fixed_charges")?;
        Ok(())
    }

    /// generate and persist one bill
    pub fn generate<S, A, D>(
        &self,
        store: &S,
        attendance: &A,
        directory: &D,
        request: &BillRequest,
        generated_by: ActorId,
        now: DateTime<Utc>,
    ) -> Result<Bill>
    where
        S: BillStore + ?Sized,
        A: AttendanceSource + ?Sized,
        D: StudentDirectory + ?Sized,
    {
        self.validate_terms(
            &request.mess_id,
            request.month,
            request.year,
            request.food_cost_per_day,
            request.fixed_charges,
        )?;

        if !directory.exists(request.student_id)? {
            return Err(BillingError::StudentNotFound {
                student_id: request.student_id,
            });
        }

        // fast path only; the store's unique key is the real guard
        if store
            .find_active_for_period(request.student_id, request.month, request.year)?
            .is_some()
        {
            return Err(BillingError::DuplicateBill {
                student_id: request.student_id,
                month: request.month,
                year: request.year,
            });
        }

        let period = BillingPeriod::for_month(request.month, request.year)?;
        let records = attendance.query_range(request.student_id, period.start_date, period.end_date)?;
        let summary = AttendanceSummary::tally(&period, &records);
        let base_amount = request
            .food_cost_per_day
            .checked_mul(summary.days_present)
            .ok_or_else(|| BillingError::invalid("food_cost_per_day", "base amount is too large"))?;
        let due_date = now + Duration::days(i64::from(self.config.due_in_days));

        debug!(
            student_id = %request.student_id,
            days_present = summary.days_present,
            days_absent = summary.days_absent,
            base = %base_amount,
            "attendance tallied"
        );

        let mut attempt = 0;
        loop {
            attempt += 1;
            let sequence = store.next_bill_sequence(&request.mess_id, request.year, request.month)?;
            let bill_number = format_bill_number(
                &request.mess_id,
                request.year,
                request.month,
                sequence,
                self.config.bill_number_width,
            );

            let bill = Bill::issue(
                NewBill {
                    bill_number,
                    student_id: request.student_id,
                    mess_id: request.mess_id.clone(),
                    month: request.month,
                    year: request.year,
                    billing_period: period,
                    attendance: summary,
                    base_amount,
                    fixed_charges: request.fixed_charges,
                    due_date,
                    generated_by,
                },
                now,
            );

            match store.insert(bill) {
                Ok(bill) => {
                    info!(
                        bill_number = %bill.bill_number,
                        student_id = %bill.student_id,
                        total = %bill.total_amount,
                        "bill generated"
                    );
                    return Ok(bill);
                }
                Err(BillingError::DuplicateBillNumber { bill_number })
                    if attempt < self.config.bill_number_attempts =>
                {
                    warn!(%bill_number, attempt, "bill number taken, allocating another");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// generate bills for every student of a mess; one student's failure never
    /// stops the rest
    pub fn generate_for_mess<S, A, D>(
        &self,
        store: &S,
        attendance: &A,
        directory: &D,
        request: &MessBillRequest,
        generated_by: ActorId,
        now: DateTime<Utc>,
    ) -> Result<(BatchOutcome, Vec<Bill>)>
    where
        S: BillStore + ?Sized,
        A: AttendanceSource + ?Sized,
        D: StudentDirectory + ?Sized,
    {
        self.validate_terms(
            &request.mess_id,
            request.month,
            request.year,
            request.food_cost_per_day,
            request.fixed_charges,
        )?;

        let students = directory.list_students(&request.mess_id)?;
        let mut outcome = BatchOutcome::default();
        let mut bills = Vec::with_capacity(students.len());

        for student_id in students {
            match self.generate(store, attendance, directory, &request.for_student(student_id), generated_by, now) {
                Ok(bill) => {
                    outcome.generated += 1;
                    outcome.bill_numbers.push(bill.bill_number.clone());
                    bills.push(bill);
                }
                Err(e) => {
                    warn!(%student_id, error = %e, "bill generation failed");
                    outcome.errors += 1;
                    outcome.failures.push(BatchFailure {
                        student_id,
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            mess_id = %request.mess_id,
            month = request.month,
            year = request.year,
            generated = outcome.generated,
            errors = outcome.errors,
            "batch generation finished"
        );

        Ok((outcome, bills))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bill::tests::sample_bill;
    use crate::sources::{AttendanceRecord, MemoryAttendance, MemoryDirectory};
    use crate::store::MemoryBillStore;
    use crate::types::PaymentStatus;
    use chrono::{NaiveDate, TimeZone};
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap()
    }

    fn june(student_id: StudentId) -> BillRequest {
        BillRequest {
            student_id,
            mess_id: "M1".to_string(),
            month: 6,
            year: 2025,
            food_cost_per_day: Money::from_major(100),
            fixed_charges: Money::from_major(150),
        }
    }

    fn setup() -> (MemoryBillStore, MemoryAttendance, MemoryDirectory, StudentId) {
        let student = Uuid::new_v4();
        let mut directory = MemoryDirectory::new();
        directory.enroll("M1", student);
        (MemoryBillStore::new(), MemoryAttendance::new(), directory, student)
    }

    #[test]
    fn test_bill_number_format() {
        assert_eq!(format_bill_number("M1", 2025, 5, 7, 4), "M1-202505-0007");
        assert_eq!(format_bill_number("HOSTEL-A", 2025, 12, 12345, 4), "HOSTEL-A-202512-12345");
    }

    #[test]
    fn test_generate_from_attendance() {
        let (store, mut attendance, directory, student) = setup();
        for d in [3, 4, 5] {
            attendance.mark_leave(student, NaiveDate::from_ymd_opt(2025, 6, d).unwrap());
        }
        let generator = BillGenerator::new(BillingConfig::default());

        let bill = generator
            .generate(&store, &attendance, &directory, &june(student), Uuid::new_v4(), now())
            .unwrap();

        assert_eq!(bill.total_days_in_month, 30);
        assert_eq!(bill.days_present, 27);
        assert_eq!(bill.days_absent, 3);
        assert_eq!(bill.base_amount, Money::from_major(2_700));
        assert_eq!(bill.total_amount, Money::from_major(2_850));
        assert_eq!(bill.amount_due, Money::from_major(2_850));
        assert_eq!(bill.payment_status, PaymentStatus::Unpaid);
        assert_eq!(bill.bill_number, "M1-202506-0001");
        assert_eq!(bill.due_date, now() + Duration::days(15));
        assert!(bill.meal_wise_charges.is_empty());
    }

    #[test]
    fn test_zero_meal_day_counts_as_absent() {
        let (store, mut attendance, directory, student) = setup();
        attendance.record(
            student,
            AttendanceRecord {
                date: NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
                is_on_leave: false,
                total_meals_present: 0,
            },
        );
        let generator = BillGenerator::new(BillingConfig::default());

        let bill = generator
            .generate(&store, &attendance, &directory, &june(student), Uuid::new_v4(), now())
            .unwrap();

        assert_eq!(bill.days_absent, 1);
        assert_eq!(bill.base_amount, Money::from_major(2_900));
    }

    #[test]
    fn test_rejects_unknown_student_and_bad_terms() {
        let (store, attendance, directory, _) = setup();
        let generator = BillGenerator::new(BillingConfig::default());
        let actor = Uuid::new_v4();

        let unknown = generator.generate(&store, &attendance, &directory, &june(Uuid::new_v4()), actor, now());
        assert!(matches!(unknown, Err(BillingError::StudentNotFound { .. })));

        let mut bad_month = june(Uuid::new_v4());
        bad_month.month = 13;
        let result = generator.generate(&store, &attendance, &directory, &bad_month, actor, now());
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);

        let mut bad_cost = june(Uuid::new_v4());
        bad_cost.food_cost_per_day = Money::from_major(-1);
        assert!(generator.generate(&store, &attendance, &directory, &bad_cost, actor, now()).is_err());

        let mut too_early = june(Uuid::new_v4());
        too_early.year = 2019;
        assert!(generator.generate(&store, &attendance, &directory, &too_early, actor, now()).is_err());

        let mut huge_cost = june(Uuid::new_v4());
        huge_cost.food_cost_per_day = Money::from_decimal(rust_decimal::Decimal::MAX);
        let result = generator.generate(&store, &attendance, &directory, &huge_cost, actor, now());
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_second_bill_for_period_is_duplicate() {
        let (store, attendance, directory, student) = setup();
        let generator = BillGenerator::new(BillingConfig::default());

        generator
            .generate(&store, &attendance, &directory, &june(student), Uuid::new_v4(), now())
            .unwrap();
        let again = generator.generate(&store, &attendance, &directory, &june(student), Uuid::new_v4(), now());

        assert!(matches!(again, Err(BillingError::DuplicateBill { month: 6, year: 2025, .. })));
    }

    #[test]
    fn test_retries_on_bill_number_collision() {
        let (store, attendance, directory, student) = setup();
        let mut imported = sample_bill(now(), 1_000, 0, 15);
        imported.bill_number = "M1-202506-0001".to_string();
        store.insert(imported).unwrap();
        let generator = BillGenerator::new(BillingConfig::default());

        let bill = generator
            .generate(&store, &attendance, &directory, &june(student), Uuid::new_v4(), now())
            .unwrap();

        assert_eq!(bill.bill_number, "M1-202506-0002");
    }

    #[test]
    fn test_gives_up_after_configured_attempts() {
        let (store, attendance, directory, student) = setup();
        for seq in 1..=2 {
            let mut imported = sample_bill(now(), 1_000, 0, 15);
            imported.bill_number = format_bill_number("M1", 2025, 6, seq, 4);
            store.insert(imported).unwrap();
        }
        let config = BillingConfig {
            bill_number_attempts: 2,
            ..BillingConfig::default()
        };
        let generator = BillGenerator::new(config);

        let result = generator.generate(&store, &attendance, &directory, &june(student), Uuid::new_v4(), now());

        assert!(matches!(result, Err(BillingError::DuplicateBillNumber { .. })));
    }

    #[test]
    fn test_batch_isolates_failures() {
        let (store, attendance, mut directory, billed_already) = setup();
        let fresh = Uuid::new_v4();
        directory.enroll("M1", fresh);
        let generator = BillGenerator::new(BillingConfig::default());
        generator
            .generate(&store, &attendance, &directory, &june(billed_already), Uuid::new_v4(), now())
            .unwrap();

        let request = MessBillRequest {
            mess_id: "M1".to_string(),
            month: 6,
            year: 2025,
            food_cost_per_day: Money::from_major(100),
            fixed_charges: Money::ZERO,
        };
        let (outcome, bills) = generator
            .generate_for_mess(&store, &attendance, &directory, &request, Uuid::new_v4(), now())
            .unwrap();

        assert_eq!(outcome.generated, 1);
        assert_eq!(outcome.errors, 1);
        assert_eq!(outcome.failures[0].student_id, billed_already);
        assert_eq!(outcome.failures[0].kind, ErrorKind::Duplicate);
        assert_eq!(bills[0].student_id, fresh);
        assert_eq!(outcome.bill_numbers, vec!["M1-202506-0002".to_string()]);
    }

    #[test]
    fn test_batch_rejects_bad_terms_up_front() {
        let (store, attendance, directory, _) = setup();
        let generator = BillGenerator::new(BillingConfig::default());
        let request = MessBillRequest {
            mess_id: "M1".to_string(),
            month: 0,
            year: 2025,
            food_cost_per_day: Money::from_major(100),
            fixed_charges: Money::ZERO,
        };

        let result = generator.generate_for_mess(&store, &attendance, &directory, &request, Uuid::new_v4(), now());

        assert!(matches!(result, Err(BillingError::InvalidInput { .. })));
        assert!(store.is_empty().unwrap());
    }
}
