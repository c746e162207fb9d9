//! axum routes for the bill endpoints
//!
//! Authentication happens in an outer layer, which must insert the caller's
//! [`Actor`] into the request extensions. Role checks stay with that layer.

use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::bill::Bill;
use crate::billing::{BatchFailure, MessBillRequest};
use crate::errors::{BillingError, ErrorKind};
use crate::payments::PaymentInput;
use crate::service::BillingService;
use crate::sources::{AttendanceSource, StudentDirectory};
use crate::store::BillStore;
use crate::summary::BillingSummary;
use crate::types::ActorId;

/// `{success, data?, message?, error?}` plus the status to send it with
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    #[serde(skip)]
    pub status: StatusCode,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            success: true,
            data: Some(data),
            message: None,
            error: None,
        }
    }

    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CREATED,
            success: true,
            data: Some(data),
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failure(error: &BillingError) -> Self {
        let kind = error.kind();
        if kind == ErrorKind::Persistence {
            warn!(error = %error, "request failed on storage");
        }
        Self {
            status: status_for(kind),
            success: false,
            data: None,
            message: Some(error.to_string()),
            error: Some(kind),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// http status for an error kind
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Duplicate | ErrorKind::State => StatusCode::CONFLICT,
        ErrorKind::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// failed request, rendered as an error envelope
#[derive(Debug)]
pub struct ApiError(pub BillingError);

impl From<BillingError> for ApiError {
    fn from(error: BillingError) -> Self {
        ApiError(error)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(BillingError::invalid("body", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError(BillingError::invalid("path", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError(BillingError::invalid("query", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        ApiResponse::<()>::failure(&self.0).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<ApiResponse<T>, ApiError>;

/// authenticated caller, inserted by the auth layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(pub ActorId);

/// shared router state
pub struct AppState<S, A, D> {
    service: Mutex<BillingService<S, A, D>>,
    time: SafeTimeProvider,
}

impl<S, A, D> AppState<S, A, D>
where
    S: BillStore,
    A: AttendanceSource,
    D: StudentDirectory,
{
    pub fn new(service: BillingService<S, A, D>, time: SafeTimeProvider) -> Arc<Self> {
        Arc::new(Self {
            service: Mutex::new(service),
            time,
        })
    }

    pub fn time(&self) -> &SafeTimeProvider {
        &self.time
    }

    pub fn service(&self) -> Result<MutexGuard<'_, BillingService<S, A, D>>, ApiError> {
        self.service
            .lock()
            .map_err(|_| ApiError(BillingError::storage("billing service lock poisoned")))
    }
}

/// `?month=&year=` filter of `my-bills`
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PeriodQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

/// `data` of a generate-all response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateAllData {
    pub generated: usize,
    pub errors: usize,
    pub failures: Vec<BatchFailure>,
}

type Shared<S, A, D> = State<Arc<AppState<S, A, D>>>;

/// the seven bill routes over one shared service
pub fn router<S, A, D>(state: Arc<AppState<S, A, D>>) -> Router
where
    S: BillStore + Send + 'static,
    A: AttendanceSource + Send + 'static,
    D: StudentDirectory + Send + 'static,
{
    Router::new()
        .route("/bills/generate-all", post(generate_all::<S, A, D>))
        .route("/bills/my-bills", get(my_bills::<S, A, D>))
        .route("/bills/unpaid/{mess_id}", get(unpaid::<S, A, D>))
        .route("/bills/overdue/{mess_id}", get(overdue::<S, A, D>))
        .route("/bills/summary/{mess_id}/{month}/{year}", get(summary::<S, A, D>))
        .route("/bills/{id}", get(get_bill::<S, A, D>))
        .route("/bills/{id}/payment", post(record_payment::<S, A, D>))
        .with_state(state)
}

/// log and drop the events of one request
fn flush_events<S, A, D>(service: &mut BillingService<S, A, D>)
where
    S: BillStore,
    A: AttendanceSource,
    D: StudentDirectory,
{
    for event in service.take_events() {
        debug!(?event, "billing event");
    }
}

async fn generate_all<S, A, D>(
    State(state): Shared<S, A, D>,
    Extension(actor): Extension<Actor>,
    body: Result<Json<MessBillRequest>, JsonRejection>,
) -> ApiResult<GenerateAllData>
where
    S: BillStore,
    A: AttendanceSource,
    D: StudentDirectory,
{
    let Json(request) = body?;
    let mut service = state.service()?;
    let outcome = service.generate_for_mess(&request, actor.0, state.time());
    flush_events(&mut service);
    let outcome = outcome?;

    let message = format!("generated {} bills, {} errors", outcome.generated, outcome.errors);
    Ok(ApiResponse::created(
        GenerateAllData {
            generated: outcome.generated,
            errors: outcome.errors,
            failures: outcome.failures,
        },
        message,
    ))
}

async fn my_bills<S, A, D>(
    State(state): Shared<S, A, D>,
    Extension(actor): Extension<Actor>,
    query: Result<Query<PeriodQuery>, QueryRejection>,
) -> ApiResult<Vec<Bill>>
where
    S: BillStore,
    A: AttendanceSource,
    D: StudentDirectory,
{
    let Query(period) = query?;
    let bills = state
        .service()?
        .student_bills(actor.0, period.month, period.year, state.time())?;
    Ok(ApiResponse::ok(bills))
}

async fn get_bill<S, A, D>(State(state): Shared<S, A, D>, id: Result<Path<Uuid>, PathRejection>) -> ApiResult<Bill>
where
    S: BillStore,
    A: AttendanceSource,
    D: StudentDirectory,
{
    let Path(id) = id?;
    let bill = state.service()?.get_bill(id, state.time())?;
    Ok(ApiResponse::ok(bill))
}

async fn record_payment<S, A, D>(
    State(state): Shared<S, A, D>,
    Extension(actor): Extension<Actor>,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<PaymentInput>, JsonRejection>,
) -> ApiResult<Bill>
where
    S: BillStore,
    A: AttendanceSource,
    D: StudentDirectory,
{
    let Path(id) = id?;
    let Json(payment) = body?;
    let mut service = state.service()?;
    let bill = service.add_payment(id, &payment, actor.0, state.time());
    flush_events(&mut service);
    Ok(ApiResponse::ok(bill?))
}

async fn unpaid<S, A, D>(State(state): Shared<S, A, D>, Path(mess_id): Path<String>) -> ApiResult<Vec<Bill>>
where
    S: BillStore,
    A: AttendanceSource,
    D: StudentDirectory,
{
    let bills = state.service()?.unpaid_bills(&mess_id, state.time())?;
    Ok(ApiResponse::ok(bills))
}

async fn overdue<S, A, D>(State(state): Shared<S, A, D>, Path(mess_id): Path<String>) -> ApiResult<Vec<Bill>>
where
    S: BillStore,
    A: AttendanceSource,
    D: StudentDirectory,
{
    let bills = state.service()?.overdue_bills(&mess_id, state.time())?;
    Ok(ApiResponse::ok(bills))
}

async fn summary<S, A, D>(
    State(state): Shared<S, A, D>,
    params: Result<Path<(String, u32, i32)>, PathRejection>,
) -> ApiResult<BillingSummary>
where
    S: BillStore,
    A: AttendanceSource,
    D: StudentDirectory,
{
    let Path((mess_id, month, year)) = params?;
    let summary = state
        .service()?
        .billing_summary(&mess_id, month, year, state.time())?;
    Ok(ApiResponse::ok(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BillingConfig;
    use crate::decimal::Money;
    use crate::sources::{MemoryAttendance, MemoryDirectory};
    use crate::store::MemoryBillStore;
    use crate::types::StudentId;
    use axum::body::{to_bytes, Body};
    use axum::http::header::CONTENT_TYPE;
    use axum::http::Request;
    use chrono::{TimeZone, Utc};
    use hourglass_rs::TimeSource;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    type TestState = Arc<AppState<MemoryBillStore, MemoryAttendance, MemoryDirectory>>;

    fn setup() -> (TestState, Vec<StudentId>) {
        let students = vec![Uuid::new_v4(), Uuid::new_v4()];
        let mut directory = MemoryDirectory::new();
        for student in &students {
            directory.enroll("M1", *student);
        }
        let service =
            BillingService::new(MemoryBillStore::new(), MemoryAttendance::new(), directory, BillingConfig::default())
                .unwrap();
        let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap()));
        (AppState::new(service, time), students)
    }

    async fn call(state: &TestState, method: &str, uri: &str, actor: Uuid, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri).extension(Actor(actor));
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn generate_june(state: &TestState) -> (StatusCode, Value) {
        let body = json!({
            "mess_id": "M1",
            "month": 6,
            "year": 2025,
            "food_cost_per_day": "100",
            "fixed_charges": "150"
        });
        call(state, "POST", "/bills/generate-all", Uuid::new_v4(), Some(body)).await
    }

    fn money(value: &Value) -> Money {
        serde_json::from_value(value.clone()).unwrap()
    }

    fn first_bill_id(state: &TestState, student: StudentId) -> Uuid {
        let service = state.service().unwrap();
        service.student_bills(student, Some(6), Some(2025), state.time()).unwrap()[0].id
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::Validation), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::Duplicate), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::State), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::Persistence), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_generate_all_envelope() {
        let (state, _) = setup();

        let (status, body) = generate_june(&state).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["generated"], 2);
        assert_eq!(body["data"]["errors"], 0);
        assert!(body.get("error").is_none());

        let (status, again) = generate_june(&state).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(again["data"]["errors"], 2);
    }

    #[tokio::test]
    async fn test_generate_all_missing_month() {
        let (state, _) = setup();
        let body = json!({"mess_id": "M1", "year": 2025, "food_cost_per_day": "100"});

        let (status, body) = call(&state, "POST", "/bills/generate-all", Uuid::new_v4(), Some(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "validation");
        assert!(body["message"].as_str().unwrap().contains("month"));
    }

    #[tokio::test]
    async fn test_payment_and_lookup() {
        let (state, students) = setup();
        generate_june(&state).await;
        let id = first_bill_id(&state, students[0]);

        let payment = json!({"amount": "3150", "method": "upi", "transaction_id": "T-1"});
        let (status, paid) = call(&state, "POST", &format!("/bills/{}/payment", id), Uuid::new_v4(), Some(payment)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(paid["data"]["payment_status"], "paid");
        assert_eq!(money(&paid["data"]["amount_due"]), Money::ZERO);

        let (status, fetched) = call(&state, "GET", &format!("/bills/{}", id), Uuid::new_v4(), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(money(&fetched["data"]["amount_paid"]), Money::from_major(3_150));
    }

    #[tokio::test]
    async fn test_oversized_payments_are_rejected_and_store_stays_usable() {
        let (state, students) = setup();
        generate_june(&state).await;
        let id = first_bill_id(&state, students[0]);
        let payment = json!({"amount": "79228162514264337593543950335", "method": "upi"});

        for _ in 0..2 {
            let (status, body) =
                call(&state, "POST", &format!("/bills/{}/payment", id), Uuid::new_v4(), Some(payment.clone())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "validation");
        }

        let (status, _) = call(&state, "GET", &format!("/bills/{}", id), Uuid::new_v4(), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, unpaid) = call(&state, "GET", "/bills/unpaid/M1", Uuid::new_v4(), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(unpaid["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_huge_food_cost_is_a_validation_failure() {
        let (state, _) = setup();
        let body = json!({
            "mess_id": "M1",
            "month": 6,
            "year": 2025,
            "food_cost_per_day": "79228162514264337593543950335"
        });

        let (status, body) = call(&state, "POST", "/bills/generate-all", Uuid::new_v4(), Some(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation");
    }

    #[tokio::test]
    async fn test_sub_paisa_payment_is_rejected() {
        let (state, students) = setup();
        generate_june(&state).await;
        let id = first_bill_id(&state, students[0]);
        let uri = format!("/bills/{}/payment", id);

        let (status, _) = call(&state, "POST", &uri, Uuid::new_v4(), Some(json!({"amount": "0.004", "method": "cash"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, paid) =
            call(&state, "POST", &uri, Uuid::new_v4(), Some(json!({"amount": "100.125", "method": "cash"}))).await;
        assert_eq!(status, StatusCode::OK);
        let history = paid["data"]["payment_history"].as_array().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(money(&history[0]["amount"]), money(&paid["data"]["amount_paid"]));
        assert_eq!(money(&paid["data"]["amount_paid"]), Money::from_minor(10_012));
    }

    #[tokio::test]
    async fn test_bad_inputs_are_client_errors() {
        let (state, _) = setup();
        let actor = Uuid::new_v4();

        let (status, body) = call(&state, "GET", "/bills/not-a-uuid", actor, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation");

        let (status, body) = call(&state, "GET", &format!("/bills/{}", Uuid::new_v4()), actor, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");

        let (status, _) = call(&state, "GET", "/bills/summary/M1/june/2025", actor, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&state, "GET", "/bills/summary/M1/13/2025", actor, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let request = Request::builder()
            .method("POST")
            .uri(format!("/bills/{}/payment", Uuid::new_v4()))
            .header(CONTENT_TYPE, "application/json")
            .extension(Actor(actor))
            .body(Body::from("{"))
            .unwrap();
        let response = router(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let (status, _) = call(&state, "GET", "/reports", actor, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_my_bills_uses_actor_and_query() {
        let (state, students) = setup();
        generate_june(&state).await;

        let (_, mine) = call(&state, "GET", "/bills/my-bills?month=6&year=2025", students[1], None).await;
        assert_eq!(mine["data"].as_array().unwrap().len(), 1);
        assert_eq!(mine["data"][0]["student_id"], students[1].to_string());

        let (_, none) = call(&state, "GET", "/bills/my-bills?month=5", students[1], None).await;
        assert!(none["data"].as_array().unwrap().is_empty());

        let (status, _) = call(&state, "GET", "/bills/my-bills?year=last", students[1], None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_summary_route() {
        let (state, _) = setup();
        generate_june(&state).await;

        let (status, body) = call(&state, "GET", "/bills/summary/M1/6/2025", Uuid::new_v4(), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total_bills"], 2);
        assert_eq!(money(&body["data"]["total_amount"]), Money::from_major(6_300));
    }

    #[tokio::test]
    async fn test_events_do_not_accumulate_across_requests() {
        let (state, students) = setup();
        generate_june(&state).await;
        let id = first_bill_id(&state, students[0]);

        for _ in 0..5 {
            let payment = json!({"amount": "10", "method": "cash"});
            call(&state, "POST", &format!("/bills/{}/payment", id), Uuid::new_v4(), Some(payment)).await;
        }

        assert!(state.service().unwrap().events.events().is_empty());
    }
}
