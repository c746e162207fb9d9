/// late fees - advance time past the due date and run the scheduler
use chrono::{Duration, TimeZone, Utc};
use mess_billing_rs::{
    BillingConfig, BillingService, MemoryAttendance, MemoryBillStore, MemoryDirectory, MessBillRequest, Money,
    PaymentInput, PaymentMethod, SafeTimeProvider, TimeSource, Uuid,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    println!("=== late fees ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2025, 7, 1, 8, 0, 0).unwrap()));
    let controller = time.test_control().unwrap();
    let manager = Uuid::new_v4();

    let mut directory = MemoryDirectory::new();
    for _ in 0..3 {
        directory.enroll("MESS-B", Uuid::new_v4());
    }

    let config = BillingConfig::default().with_late_fee(Money::from_major(75));
    let mut service = BillingService::new(MemoryBillStore::new(), MemoryAttendance::new(), directory, config)?;

    service.generate_for_mess(
        &MessBillRequest {
            mess_id: "MESS-B".to_string(),
            month: 6,
            year: 2025,
            food_cost_per_day: Money::from_major(90),
            fixed_charges: Money::from_major(100),
        },
        manager,
        &time,
    )?;

    // one student pays part before the due date
    let bills = service.unpaid_bills("MESS-B", &time)?;
    service.add_payment(bills[0].id, &PaymentInput::new(Money::from_major(500), PaymentMethod::Card), manager, &time)?;

    controller.advance(Duration::days(20));
    println!("now: {}", time.now().format("%Y-%m-%d"));

    let report = service.run_late_fees(&time)?;
    println!("first run: updated {}, skipped {}, failed {}", report.updated, report.skipped, report.failed.len());

    // a second run finds nothing left to charge
    let report = service.run_late_fees(&time)?;
    println!("second run: updated {}", report.updated);

    for bill in service.overdue_bills("MESS-B", &time)? {
        println!(
            "{} status {} late fee {} due {} remarks {:?}",
            bill.bill_number,
            bill.payment_status,
            bill.late_fee,
            bill.amount_due,
            bill.remarks
        );
    }

    Ok(())
}
