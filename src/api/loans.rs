//! Loan management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::loan::{CreateLoan, Loan, LoanDetails, LoanQuery, LoanStats, ReturnLoan},
    services::loans::StatsScope,
    AppState,
};

use super::{ApiJson, AuthenticatedUser};

/// Return response with the fee owed
#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    /// Always "returned"
    pub status: String,
    /// Late fee in whole currency units
    pub fine: i64,
    pub loan_id: i32,
    pub returned_on: Option<NaiveDate>,
}

/// List loans
///
/// Regular users only see their own loans. Administrators see every loan
/// unless they filter on `user_id`.
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanQuery),
    responses(
        (status = 200, description = "List of loans", body = Vec<LoanDetails>),
        (status = 403, description = "Filtering on another user", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state
        .services
        .loans
        .list_loans(claims.principal(), &query)
        .await?;
    Ok(Json(loans))
}

/// Get loan details by ID
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = LoanDetails),
        (status = 403, description = "Loan belongs to another user", body = crate::error::ErrorResponse),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.loans.get_loan(id, claims.principal()).await?;
    Ok(Json(loan))
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateLoan,
    responses(
        (status = 201, description = "Loan created", body = Loan),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 404, description = "User or book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book not available, loan limit reached or overdue loans", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiJson(request): ApiJson<CreateLoan>,
) -> AppResult<(StatusCode, Json<Loan>)> {
    let loan = state
        .services
        .loans
        .create_loan(claims.principal(), request)
        .await?;

    Ok((StatusCode::CREATED, Json(loan)))
}

/// Return a borrowed book
#[utoipa::path(
    patch,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    request_body = ReturnLoan,
    responses(
        (status = 200, description = "Book returned", body = ReturnResponse),
        (status = 400, description = "Return not confirmed", body = crate::error::ErrorResponse),
        (status = 403, description = "Loan belongs to another user", body = crate::error::ErrorResponse),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Loan already returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    ApiJson(request): ApiJson<ReturnLoan>,
) -> AppResult<Json<ReturnResponse>> {
    let outcome = state
        .services
        .loans
        .return_loan(id, claims.principal(), request.confirm)
        .await?;

    Ok(Json(ReturnResponse {
        status: "returned".to_string(),
        fine: outcome.fine,
        loan_id: outcome.loan.id,
        returned_on: outcome.loan.returned_on,
    }))
}

/// Loan statistics for the current user
#[utoipa::path(
    get,
    path = "/loans/stats/self",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Loan statistics", body = LoanStats)
    )
)]
pub async fn stats_self(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<LoanStats>> {
    let stats = state
        .services
        .loans
        .stats(StatsScope::User(claims.user_id))
        .await?;
    Ok(Json(stats))
}

/// Loan statistics for a given user
#[utoipa::path(
    get,
    path = "/loans/stats/admin/{user_id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("user_id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Loan statistics", body = LoanStats),
        (status = 403, description = "Administrator privileges required", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn stats_admin_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
) -> AppResult<Json<LoanStats>> {
    claims.require_admin()?;

    let stats = state.services.loans.stats(StatsScope::User(user_id)).await?;
    Ok(Json(stats))
}

/// Loan statistics for the whole library
#[utoipa::path(
    get,
    path = "/loans/stats/admin",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Loan statistics", body = LoanStats),
        (status = 403, description = "Administrator privileges required", body = crate::error::ErrorResponse)
    )
)]
pub async fn stats_admin(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<LoanStats>> {
    claims.require_admin()?;

    let stats = state.services.loans.stats(StatsScope::All).await?;
    Ok(Json(stats))
}
