/// http surface - drive the bill routes through the axum router
use axum::body::{to_bytes, Body};
use axum::http::header::CONTENT_TYPE;
use axum::http::Request;
use chrono::{TimeZone, Utc};
use mess_billing_rs::{
    router, Actor, AppState, BillingConfig, BillingService, MemoryAttendance, MemoryBillStore, MemoryDirectory,
    SafeTimeProvider, TimeSource, Uuid,
};
use serde_json::{json, Value};
use tower::ServiceExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2025, 7, 1, 8, 0, 0).unwrap()));
    let manager = Uuid::new_v4();
    let student = Uuid::new_v4();

    let mut directory = MemoryDirectory::new();
    directory.enroll("MESS-C", student);
    let service =
        BillingService::new(MemoryBillStore::new(), MemoryAttendance::new(), directory, BillingConfig::default())?;
    let state = AppState::new(service, time);

    let calls = vec![
        (
            manager,
            "POST",
            "/bills/generate-all".to_string(),
            Some(json!({"mess_id": "MESS-C", "month": 6, "year": 2025, "food_cost_per_day": "100", "fixed_charges": "150"})),
        ),
        (manager, "POST", "/bills/generate-all".to_string(), Some(json!({"mess_id": "MESS-C"}))),
        (student, "GET", "/bills/unpaid/MESS-C".to_string(), None),
        (manager, "GET", "/bills/summary/MESS-C/6/2025".to_string(), None),
        (manager, "GET", "/bills/not-an-id".to_string(), None),
    ];

    for (actor, method, path, body) in calls {
        let response = send(&state, actor, method, &path, body).await?;
        println!("{} {}\n{}\n", method, path, serde_json::to_string_pretty(&response)?);
    }

    // the student looks up their bill, the manager records the payment
    let mine = send(&state, student, "GET", "/bills/my-bills?year=2025", None).await?;
    let bill = &mine["data"][0];
    let path = format!("/bills/{}/payment", bill["id"].as_str().unwrap_or_default());
    let payment = json!({"amount": bill["amount_due"], "method": "online", "transaction_id": "PG-42"});
    let response = send(&state, manager, "POST", &path, Some(payment)).await?;
    println!("payment\n{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}

async fn send(
    state: &std::sync::Arc<AppState<MemoryBillStore, MemoryAttendance, MemoryDirectory>>,
    actor: Uuid,
    method: &str,
    path: &str,
    body: Option<Value>,
) -> Result<Value, Box<dyn std::error::Error>> {
    let builder = Request::builder().method(method).uri(path).extension(Actor(actor));
    let request = match body {
        Some(body) => builder.header(CONTENT_TYPE, "application/json").body(Body::from(body.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let response = router(state.clone()).oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let mut value: Value = serde_json::from_slice(&bytes)?;
    value["status"] = json!(status.as_u16());
    Ok(value)
}
