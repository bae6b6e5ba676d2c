//! REST surface over the domain services.
//!
//! Handlers stay thin: decode the request, call one service method, map the
//! result to a status code. Identity comes pre-authorized from the caller
//! (`acting_user` / `submitted_by` fields); there is no auth layer here.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use crate::domain::DomainError;
use crate::storage::repositories::excuse_repository::ExcuseFilter;
use crate::Backend;
use shared::{
    AddClosedDayRequest, BulkAttendanceRequest, CreateChildRequest, EditExcuseRequest,
    OverrideExcuseRequest, Presence, SetChildActiveRequest, SubmitExcuseRequest,
    UpdateChildRequest,
};

/// Build the API router over a wired backend.
pub fn router(backend: Backend) -> Router {
    Router::new()
        .route("/children", get(list_children).post(create_child))
        .route("/children/:id", get(get_child).put(update_child))
        .route("/children/:id/active", put(set_child_active))
        .route("/children/:id/attendance", get(child_attendance))
        .route("/children/:id/attendance/stats", get(child_stats))
        .route("/children/:id/today", get(today_status))
        .route("/children/:id/excuses", get(child_excuses))
        .route("/attendance", get(daily_attendance).post(record_attendance))
        .route("/attendance/bulk", post(record_bulk))
        .route("/attendance/recordable", get(can_record))
        .route("/dashboard", get(dashboard))
        .route("/excuses", get(list_excuses).post(submit_excuse))
        .route("/excuses/deadline", get(deadline_info))
        .route("/excuses/:id", put(edit_excuse).delete(delete_excuse))
        .route("/excuses/:id/approval", put(override_excuse))
        .route(
            "/calendar/closed-days",
            get(list_closed_days).post(add_closed_day),
        )
        .route("/calendar/closed-days/:id", delete(remove_closed_day))
        .route("/calendar/next-school-day", get(next_school_day))
        .route("/audit", get(recent_audit))
        .route("/audit/:entity_type/:entity_id", get(entity_audit))
        .with_state(backend)
}

fn error_response(err: DomainError) -> axum::response::Response {
    let status = match &err {
        DomainError::InvalidRange(_) => StatusCode::BAD_REQUEST,
        DomainError::DateNotRecordable(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Unauthorized(_) => StatusCode::FORBIDDEN,
        DomainError::Storage(_) | DomainError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("Internal error: {:?}", err);
        (status, "Internal error".to_string()).into_response()
    } else {
        (status, err.to_string()).into_response()
    }
}

#[derive(Deserialize, Debug)]
pub struct ListChildrenQuery {
    #[serde(default)]
    pub active_only: bool,
}

pub async fn list_children(
    State(backend): State<Backend>,
    Query(query): Query<ListChildrenQuery>,
) -> impl IntoResponse {
    match backend.child_service.list_children(query.active_only).await {
        Ok(children) => (StatusCode::OK, Json(children)).into_response(),
        Err(e) => error_response(DomainError::Other(e)),
    }
}

pub async fn create_child(
    State(backend): State<Backend>,
    Json(request): Json<CreateChildRequest>,
) -> impl IntoResponse {
    info!("POST /children - {} {}", request.first_name, request.last_name);
    match backend.child_service.create_child(request).await {
        Ok(child) => (StatusCode::CREATED, Json(child)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_child(
    State(backend): State<Backend>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match backend.child_service.get_child(&id).await {
        Ok(child) => (StatusCode::OK, Json(child)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn update_child(
    State(backend): State<Backend>,
    Path(id): Path<String>,
    Json(request): Json<UpdateChildRequest>,
) -> impl IntoResponse {
    info!("PUT /children/{}", id);
    match backend.child_service.update_child(&id, request).await {
        Ok(child) => (StatusCode::OK, Json(child)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn set_child_active(
    State(backend): State<Backend>,
    Path(id): Path<String>,
    Json(request): Json<SetChildActiveRequest>,
) -> impl IntoResponse {
    info!("PUT /children/{}/active - active={}", id, request.active);
    match backend.child_service.set_child_active(&id, request).await {
        Ok(child) => (StatusCode::OK, Json(child)).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize, Debug)]
pub struct DateRangeQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

pub async fn child_attendance(
    State(backend): State<Backend>,
    Path(id): Path<String>,
    Query(query): Query<DateRangeQuery>,
) -> impl IntoResponse {
    match backend
        .attendance_service
        .child_attendance(&id, query.start, query.end)
        .await
    {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn child_stats(
    State(backend): State<Backend>,
    Path(id): Path<String>,
    Query(query): Query<DateRangeQuery>,
) -> impl IntoResponse {
    match backend
        .attendance_service
        .stats_for_range(&id, query.start, query.end)
        .await
    {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn today_status(
    State(backend): State<Backend>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match backend.attendance_service.today_status(&id).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize, Debug)]
pub struct ChildExcusesQuery {
    pub limit: Option<u32>,
}

pub async fn child_excuses(
    State(backend): State<Backend>,
    Path(id): Path<String>,
    Query(query): Query<ChildExcusesQuery>,
) -> impl IntoResponse {
    match backend
        .excuse_service
        .child_excuses(&id, query.limit.unwrap_or(50))
        .await
    {
        Ok(excuses) => (StatusCode::OK, Json(excuses)).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize, Debug)]
pub struct DateQuery {
    pub date: NaiveDate,
}

pub async fn daily_attendance(
    State(backend): State<Backend>,
    Query(query): Query<DateQuery>,
) -> impl IntoResponse {
    match backend.attendance_service.daily_attendance(query.date).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Body for recording a single child's attendance.
#[derive(Deserialize, Debug)]
pub struct RecordAttendanceBody {
    pub child_id: String,
    pub date: NaiveDate,
    pub presence: Presence,
    pub recorded_by: String,
}

pub async fn record_attendance(
    State(backend): State<Backend>,
    Json(body): Json<RecordAttendanceBody>,
) -> impl IntoResponse {
    info!("POST /attendance - child {} on {}", body.child_id, body.date);
    match backend
        .attendance_service
        .record_attendance(&body.child_id, body.date, body.presence, &body.recorded_by)
        .await
    {
        Ok(row) => (StatusCode::CREATED, Json(row)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn record_bulk(
    State(backend): State<Backend>,
    Json(request): Json<BulkAttendanceRequest>,
) -> impl IntoResponse {
    info!(
        "POST /attendance/bulk - {} entries on {}",
        request.entries.len(),
        request.date
    );
    match backend.attendance_service.record_bulk(request).await {
        Ok(rows) => (StatusCode::CREATED, Json(rows)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn can_record(
    State(backend): State<Backend>,
    Query(query): Query<DateQuery>,
) -> impl IntoResponse {
    match backend.attendance_service.can_record_attendance(query.date).await {
        Ok(recordable) => (StatusCode::OK, Json(recordable)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn dashboard(State(backend): State<Backend>) -> impl IntoResponse {
    match backend.attendance_service.dashboard_stats().await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn submit_excuse(
    State(backend): State<Backend>,
    Json(request): Json<SubmitExcuseRequest>,
) -> impl IntoResponse {
    info!(
        "POST /excuses - child {} ({} - {})",
        request.child_id, request.from_date, request.to_date
    );
    match backend.excuse_service.submit(request).await {
        Ok(excuse) => (StatusCode::CREATED, Json(excuse)).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize, Debug)]
pub struct ExcuseListQuery {
    pub child_id: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub auto_approved: Option<bool>,
}

pub async fn list_excuses(
    State(backend): State<Backend>,
    Query(query): Query<ExcuseListQuery>,
) -> impl IntoResponse {
    let filter = ExcuseFilter {
        child_id: query.child_id,
        start_date: query.start_date,
        end_date: query.end_date,
        auto_approved: query.auto_approved,
    };
    match backend.excuse_service.list_excuses(filter).await {
        Ok(excuses) => (StatusCode::OK, Json(excuses)).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize, Debug)]
pub struct DeadlineQuery {
    pub from_date: NaiveDate,
}

pub async fn deadline_info(
    State(backend): State<Backend>,
    Query(query): Query<DeadlineQuery>,
) -> impl IntoResponse {
    let info = backend.excuse_service.deadline_info(query.from_date);
    (StatusCode::OK, Json(info)).into_response()
}

pub async fn edit_excuse(
    State(backend): State<Backend>,
    Path(id): Path<String>,
    Json(request): Json<EditExcuseRequest>,
) -> impl IntoResponse {
    info!("PUT /excuses/{}", id);
    match backend.excuse_service.edit_dates(&id, request).await {
        Ok(excuse) => (StatusCode::OK, Json(excuse)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn override_excuse(
    State(backend): State<Backend>,
    Path(id): Path<String>,
    Json(request): Json<OverrideExcuseRequest>,
) -> impl IntoResponse {
    info!("PUT /excuses/{}/approval", id);
    match backend.excuse_service.override_approval(&id, request).await {
        Ok(excuse) => (StatusCode::OK, Json(excuse)).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize, Debug)]
pub struct ActingUserQuery {
    pub acting_user: String,
}

pub async fn delete_excuse(
    State(backend): State<Backend>,
    Path(id): Path<String>,
    Query(query): Query<ActingUserQuery>,
) -> impl IntoResponse {
    info!("DELETE /excuses/{}", id);
    match backend.excuse_service.delete(&id, &query.acting_user).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize, Debug)]
pub struct ClosedDaysQuery {
    pub year: i32,
}

pub async fn list_closed_days(
    State(backend): State<Backend>,
    Query(query): Query<ClosedDaysQuery>,
) -> impl IntoResponse {
    match backend.calendar.closed_days_for_year(query.year).await {
        Ok(days) => (StatusCode::OK, Json(days)).into_response(),
        Err(e) => error_response(DomainError::Other(e)),
    }
}

pub async fn add_closed_day(
    State(backend): State<Backend>,
    Json(request): Json<AddClosedDayRequest>,
) -> impl IntoResponse {
    info!("POST /calendar/closed-days - {}", request.date);
    match backend.calendar.add_closed_day(request).await {
        Ok(day) => (StatusCode::CREATED, Json(day)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn remove_closed_day(
    State(backend): State<Backend>,
    Path(id): Path<String>,
    Query(query): Query<ActingUserQuery>,
) -> impl IntoResponse {
    info!("DELETE /calendar/closed-days/{}", id);
    match backend.calendar.remove_closed_day(&id, &query.acting_user).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize, Debug)]
pub struct FromDateQuery {
    pub from: NaiveDate,
}

pub async fn next_school_day(
    State(backend): State<Backend>,
    Query(query): Query<FromDateQuery>,
) -> impl IntoResponse {
    match backend.calendar.next_school_day(query.from).await {
        Ok(day) => (StatusCode::OK, Json(day)).into_response(),
        Err(e) => error_response(DomainError::Other(e)),
    }
}

#[derive(Deserialize, Debug)]
pub struct AuditQuery {
    pub limit: Option<u32>,
}

pub async fn recent_audit(
    State(backend): State<Backend>,
    Query(query): Query<AuditQuery>,
) -> impl IntoResponse {
    match backend
        .audit_service
        .recent_entries(query.limit.unwrap_or(50))
        .await
    {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(e) => error_response(DomainError::Other(e)),
    }
}

pub async fn entity_audit(
    State(backend): State<Backend>,
    Path((entity_type, entity_id)): Path<(String, String)>,
) -> impl IntoResponse {
    match backend
        .audit_service
        .entries_for_entity(&entity_type, &entity_id)
        .await
    {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(e) => error_response(DomainError::Other(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    async fn setup_test_router() -> Router {
        let backend = Backend::init_test()
            .await
            .expect("Failed to create test backend");
        router(backend)
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("valid request")
    }

    #[tokio::test]
    async fn test_create_and_get_child() {
        let app = setup_test_router().await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/children",
                serde_json::json!({
                    "first_name": "Anna",
                    "last_name": "Dvořáková",
                    "acting_user": "director-1",
                }),
            ))
            .await
            .expect("request failed");
        assert_eq!(response.status(), StatusCode::CREATED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let child: shared::Child = serde_json::from_slice(&bytes).expect("child json");

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/children/{}", child.id))
                    .body(Body::empty())
                    .expect("valid request"),
            )
            .await
            .expect("request failed");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_child_is_404() {
        let app = setup_test_router().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/children/missing")
                    .body(Body::empty())
                    .expect("valid request"),
            )
            .await
            .expect("request failed");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_inverted_excuse_range_is_400() {
        let app = setup_test_router().await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/children",
                serde_json::json!({
                    "first_name": "Jan",
                    "last_name": "Novák",
                    "acting_user": "director-1",
                }),
            ))
            .await
            .expect("request failed");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let child: shared::Child = serde_json::from_slice(&bytes).expect("child json");

        let response = app
            .oneshot(json_request(
                "POST",
                "/excuses",
                serde_json::json!({
                    "child_id": child.id,
                    "from_date": "2024-01-17",
                    "to_date": "2024-01-15",
                    "reason": "Illness",
                    "submitted_by": "parent-1",
                }),
            ))
            .await
            .expect("request failed");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_bulk_on_weekend_is_422() {
        let app = setup_test_router().await;

        // 2024-01-13 is a Saturday.
        let response = app
            .oneshot(json_request(
                "POST",
                "/attendance/bulk",
                serde_json::json!({
                    "date": "2024-01-13",
                    "recorded_by": "teacher-1",
                    "entries": [],
                }),
            ))
            .await
            .expect("request failed");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_deadline_endpoint() {
        let app = setup_test_router().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/excuses/deadline?from_date=2024-01-15")
                    .body(Body::empty())
                    .expect("valid request"),
            )
            .await
            .expect("request failed");
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let info: shared::DeadlineInfo = serde_json::from_slice(&bytes).expect("deadline json");
        assert_eq!(
            info.deadline,
            NaiveDate::from_ymd_opt(2024, 1, 14)
                .and_then(|d| d.and_hms_opt(9, 0, 0))
                .expect("valid timestamp")
        );
        assert!(!info.on_time);
    }
}
