/// monthly run - bill a whole mess from attendance and summarise the month
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use mess_billing_rs::{
    BillingConfig, BillingService, MemoryAttendance, MemoryBillStore, MemoryDirectory, MessBillRequest, Money,
    PaymentInput, PaymentMethod, SafeTimeProvider, TimeSource, Uuid,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== monthly run ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2025, 7, 1, 8, 0, 0).unwrap()));
    let manager = Uuid::new_v4();

    // five students, each away for a different number of days
    let students: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
    let mut directory = MemoryDirectory::new();
    let mut attendance = MemoryAttendance::new();
    let june_first = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
    for (away, student) in students.iter().enumerate() {
        directory.enroll("MESS-A", *student);
        for day in 0..(away as i64 * 2) {
            attendance.mark_leave(*student, june_first + Duration::days(day));
        }
    }

    let mut service = BillingService::new(MemoryBillStore::new(), attendance, directory, BillingConfig::default())?;

    let request = MessBillRequest {
        mess_id: "MESS-A".to_string(),
        month: 6,
        year: 2025,
        food_cost_per_day: Money::from_major(100),
        fixed_charges: Money::from_major(150),
    };
    let outcome = service.generate_for_mess(&request, manager, &time)?;
    println!("generated {} bills ({} errors)", outcome.generated, outcome.errors);
    for number in &outcome.bill_numbers {
        println!("  {}", number);
    }

    // running it again only produces duplicates
    let rerun = service.generate_for_mess(&request, manager, &time)?;
    println!("\nrerun: generated {}, errors {}", rerun.generated, rerun.errors);
    for failure in &rerun.failures {
        println!("  {} -> {}", failure.student_id, failure.message);
    }

    // a few payments come in
    let unpaid = service.unpaid_bills("MESS-A", &time)?;
    service.add_payment(unpaid[0].id, &PaymentInput::new(unpaid[0].amount_due, PaymentMethod::Cash), manager, &time)?;
    service.add_payment(unpaid[1].id, &PaymentInput::new(Money::from_major(1_000), PaymentMethod::Upi), manager, &time)?;
    service.apply_discount(unpaid[2].id, Money::from_major(200), "hostel council rebate", &time)?;

    let summary = service.billing_summary("MESS-A", 6, 2025, &time)?;
    println!("\n{}", serde_json::to_string_pretty(&summary)?);

    println!("\nevents:");
    for event in service.take_events() {
        println!("  {:?}", event);
    }

    Ok(())
}
