use axum::{extract::State, http::StatusCode, Json};

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    pricing::{resolve_pricing, PricingError, Quote, QuoteRequest},
    state::AppState,
};

pub async fn quote(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(payload): Json<QuoteRequest>,
) -> AppResult<Json<Quote>> {
    let mut conn = state.db()?;
    let quote = resolve_pricing(&mut conn, &payload).map_err(pricing_error_to_app)?;
    Ok(Json(quote))
}

pub fn pricing_error_to_app(err: PricingError) -> AppError {
    match err {
        PricingError::ProductNotFound(key) => AppError::new(
            StatusCode::NOT_FOUND,
            format!("no active pricing found for product {key}"),
        ),
        PricingError::TierNotFound(name) => {
            AppError::bad_request(format!("unknown pricing tier {name}"))
        }
        PricingError::Database(err) => AppError::from(err),
    }
}
