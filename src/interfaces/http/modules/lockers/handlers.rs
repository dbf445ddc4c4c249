//! Locker HTTP handlers

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use super::dto::*;
use crate::application::LockerService;
use crate::interfaces::http::common::{
    bad_request, domain_error, ApiError, ApiResponse, ApiResult, EmptyData, ValidatedJson,
};

#[derive(Clone)]
pub struct LockerAppState {
    pub lockers: Arc<LockerService>,
}

#[utoipa::path(
    get,
    path = "/api/v1/lockers",
    tag = "Lockers",
    params(LockerListQuery),
    responses(
        (status = 200, description = "Lockers ordered by number", body = ApiResponse<Vec<LockerDto>>),
        (status = 400, description = "Unknown status filter")
    )
)]
pub async fn list_lockers(
    State(state): State<LockerAppState>,
    Query(query): Query<LockerListQuery>,
) -> ApiResult<Vec<LockerDto>> {
    let status = query.status().map_err(bad_request)?;
    let lockers = state.lockers.list(status).await.map_err(domain_error)?;
    Ok(Json(ApiResponse::success(
        lockers.iter().map(LockerDto::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/lockers/{id}",
    tag = "Lockers",
    params(("id" = String, Path, description = "Locker ID")),
    responses(
        (status = 200, description = "Locker", body = ApiResponse<LockerDto>),
        (status = 404, description = "Locker not found")
    )
)]
pub async fn get_locker(
    State(state): State<LockerAppState>,
    Path(id): Path<String>,
) -> ApiResult<LockerDto> {
    let locker = state.lockers.get(&id).await.map_err(domain_error)?;
    Ok(Json(ApiResponse::success(LockerDto::from(&locker))))
}

#[utoipa::path(
    post,
    path = "/api/v1/lockers",
    tag = "Lockers",
    security(("bearer_auth" = [])),
    request_body = CreateLockerRequest,
    responses(
        (status = 201, description = "Locker created", body = ApiResponse<LockerDto>),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Administrator role required"),
        (status = 409, description = "Locker number already in use")
    )
)]
pub async fn create_locker(
    State(state): State<LockerAppState>,
    ValidatedJson(request): ValidatedJson<CreateLockerRequest>,
) -> Result<(StatusCode, Json<ApiResponse<LockerDto>>), ApiError<LockerDto>> {
    let size = parse_size(&request.size).map_err(bad_request)?;
    let locker = state
        .lockers
        .create(request.number, size, request.hourly_price)
        .await
        .map_err(domain_error)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(LockerDto::from(&locker))),
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/lockers/{id}",
    tag = "Lockers",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Locker ID")),
    request_body = UpdateLockerRequest,
    responses(
        (status = 200, description = "Locker updated", body = ApiResponse<LockerDto>),
        (status = 404, description = "Locker not found"),
        (status = 409, description = "Locker number already in use")
    )
)]
pub async fn update_locker(
    State(state): State<LockerAppState>,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<UpdateLockerRequest>,
) -> ApiResult<LockerDto> {
    let update = request.into_update().map_err(bad_request)?;
    let locker = state
        .lockers
        .update(&id, update)
        .await
        .map_err(domain_error)?;
    Ok(Json(ApiResponse::success(LockerDto::from(&locker))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/lockers/{id}",
    tag = "Lockers",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Locker ID")),
    responses(
        (status = 200, description = "Locker deleted", body = ApiResponse<EmptyData>),
        (status = 404, description = "Locker not found"),
        (status = 409, description = "Locker is reserved or has reservation history")
    )
)]
pub async fn delete_locker(
    State(state): State<LockerAppState>,
    Path(id): Path<String>,
) -> ApiResult<EmptyData> {
    state.lockers.delete(&id).await.map_err(domain_error)?;
    Ok(Json(ApiResponse::success(EmptyData {})))
}
