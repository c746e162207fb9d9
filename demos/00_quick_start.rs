/// quick start - generate one bill and pay it
use mess_billing_rs::{
    BillRequest, BillingConfig, BillingService, MemoryAttendance, MemoryBillStore, MemoryDirectory, Money,
    PaymentInput, PaymentMethod, SafeTimeProvider, TimeSource, Uuid,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let student = Uuid::new_v4();
    let manager = Uuid::new_v4();

    let mut directory = MemoryDirectory::new();
    directory.enroll("MESS-A", student);

    let mut service = BillingService::new(
        MemoryBillStore::new(),
        MemoryAttendance::new(),
        directory,
        BillingConfig::default(),
    )?;
    let time = SafeTimeProvider::new(TimeSource::System);

    // june bill at 100/day plus 150 fixed
    let bill = service.generate_bill(
        &BillRequest {
            student_id: student,
            mess_id: "MESS-A".to_string(),
            month: 6,
            year: 2025,
            food_cost_per_day: Money::from_major(100),
            fixed_charges: Money::from_major(150),
        },
        manager,
        &time,
    )?;
    println!("{} total {} due {}", bill.bill_number, bill.total_amount, bill.due_date.format("%Y-%m-%d"));

    // pay in full
    let bill = service.add_payment(
        bill.id,
        &PaymentInput::new(bill.amount_due, PaymentMethod::Upi).with_transaction_id("UPI-0001"),
        manager,
        &time,
    )?;
    println!("{}", serde_json::to_string_pretty(&bill)?);

    Ok(())
}
