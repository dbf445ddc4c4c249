//! Reservation HTTP handlers
//!
//! Customers see and cancel only their own reservations; admins see all.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use super::dto::*;
use crate::application::{AuthenticatedUser, ReservationService, ReservationView};
use crate::domain::DomainError;
use crate::interfaces::http::common::{
    domain_error, ApiError, ApiResponse, ApiResult, EmptyData, ValidatedJson,
};

#[derive(Clone)]
pub struct ReservationAppState {
    pub reservations: Arc<ReservationService>,
}

fn ensure_owner(user: &AuthenticatedUser, owner_id: &str) -> Result<(), DomainError> {
    if user.is_admin() || user.user_id == owner_id {
        Ok(())
    } else {
        Err(DomainError::Forbidden(
            "Reservation belongs to another user".into(),
        ))
    }
}

fn visible(user: &AuthenticatedUser, view: ReservationView) -> Result<ReservationView, DomainError> {
    ensure_owner(user, &view.reservation.user_id)?;
    Ok(view)
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations",
    tag = "Reservations",
    security(("bearer_auth" = [])),
    request_body = CreateReservationRequest,
    responses(
        (status = 201, description = "Locker reserved", body = ApiResponse<ReservationDto>),
        (status = 400, description = "Invalid duration"),
        (status = 404, description = "Locker not found"),
        (status = 409, description = "Locker is no longer available")
    )
)]
pub async fn create_reservation(
    State(state): State<ReservationAppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ValidatedJson(request): ValidatedJson<CreateReservationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ReservationDto>>), ApiError<ReservationDto>> {
    let reservation = state
        .reservations
        .reserve(&user.caller(), &request.locker_id, request.duration_hours)
        .await
        .map_err(domain_error)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(ReservationDto::from(reservation))),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/reservations",
    tag = "Reservations",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All reservations for admins, own reservations otherwise", body = ApiResponse<Vec<ReservationDto>>)
    )
)]
pub async fn list_reservations(
    State(state): State<ReservationAppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Vec<ReservationDto>> {
    let views = if user.is_admin() {
        state.reservations.list_all().await
    } else {
        state.reservations.list_by_user(&user.user_id).await
    }
    .map_err(domain_error)?;

    Ok(Json(ApiResponse::success(
        views.into_iter().map(ReservationDto::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/reservations/user/{user_id}",
    tag = "Reservations",
    security(("bearer_auth" = [])),
    params(("user_id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Reservations of the user", body = ApiResponse<Vec<ReservationDto>>),
        (status = 403, description = "Not the caller's reservations")
    )
)]
pub async fn list_user_reservations(
    State(state): State<ReservationAppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<ReservationDto>> {
    ensure_owner(&user, &user_id).map_err(domain_error)?;
    let views = state
        .reservations
        .list_by_user(&user_id)
        .await
        .map_err(domain_error)?;

    Ok(Json(ApiResponse::success(
        views.into_iter().map(ReservationDto::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/reservations/{id}",
    tag = "Reservations",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation", body = ApiResponse<ReservationDto>),
        (status = 403, description = "Reservation belongs to another user"),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn get_reservation(
    State(state): State<ReservationAppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> ApiResult<ReservationDto> {
    let view = state
        .reservations
        .get_by_id(&id)
        .await
        .and_then(|v| visible(&user, v))
        .map_err(domain_error)?;

    Ok(Json(ApiResponse::success(ReservationDto::from(view))))
}

#[utoipa::path(
    get,
    path = "/api/v1/reservations/locker/{locker_id}",
    tag = "Reservations",
    security(("bearer_auth" = [])),
    params(("locker_id" = String, Path, description = "Locker ID")),
    responses(
        (status = 200, description = "Active reservation of the locker, or its latest one", body = ApiResponse<ReservationDto>),
        (status = 403, description = "Reservation belongs to another user"),
        (status = 404, description = "Locker has no reservation")
    )
)]
pub async fn get_locker_reservation(
    State(state): State<ReservationAppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(locker_id): Path<String>,
) -> ApiResult<ReservationDto> {
    let view = state
        .reservations
        .get_by_locker(&locker_id)
        .await
        .and_then(|v| visible(&user, v))
        .map_err(domain_error)?;

    Ok(Json(ApiResponse::success(ReservationDto::from(view))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/reservations/{id}",
    tag = "Reservations",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation cancelled, locker released", body = ApiResponse<EmptyData>),
        (status = 403, description = "Reservation belongs to another user"),
        (status = 404, description = "Reservation not found or no longer active")
    )
)]
pub async fn cancel_reservation(
    State(state): State<ReservationAppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> ApiResult<EmptyData> {
    // Ownership is immutable; the close below is still conditional on Active.
    let view = state
        .reservations
        .get_by_id(&id)
        .await
        .map_err(domain_error)?;
    ensure_owner(&user, &view.reservation.user_id).map_err(domain_error)?;

    state.reservations.cancel(&id).await.map_err(domain_error)?;
    Ok(Json(ApiResponse::success(EmptyData {})))
}
