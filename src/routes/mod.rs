use axum::http::HeaderValue;
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod assignments;
pub mod auth;
pub mod email_templates;
pub mod form_drafts;
pub mod health;
pub mod jobs;
pub mod package_orders;
pub mod payments;
pub mod pricing;
pub mod users;
pub mod vouchers;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        let allow_origin = AllowOrigin::list(headers);

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let jobs_routes = Router::new()
        .route("/", get(jobs::list_jobs).post(jobs::create_job))
        .route("/draft/update", put(jobs::update_draft))
        .route(
            "/:id",
            get(jobs::get_job)
                .patch(jobs::update_job)
                .delete(jobs::delete_job),
        );

    let users_routes = Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        .route(
            "/:id",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        );

    let assignments_routes = Router::new().route(
        "/",
        get(assignments::list_assignments)
            .post(assignments::replace_assignments)
            .delete(assignments::deactivate_assignment),
    );

    let vouchers_routes = Router::new()
        .route("/", get(vouchers::list_vouchers).post(vouchers::create_voucher))
        .route(
            "/:id",
            get(vouchers::get_voucher)
                .patch(vouchers::update_voucher)
                .delete(vouchers::delete_voucher),
        );

    let pricing_routes = Router::new().route("/quote", post(pricing::quote));

    let payments_routes = Router::new()
        .route("/create-intent", post(payments::create_intent))
        .route("/confirm", post(payments::confirm));

    let email_templates_routes = Router::new()
        .route(
            "/",
            get(email_templates::list_templates).post(email_templates::create_template),
        )
        .route(
            "/:id",
            get(email_templates::get_template)
                .put(email_templates::update_template)
                .delete(email_templates::delete_template),
        );

    let email_logs_routes = Router::new()
        .route("/", get(email_templates::list_logs))
        .route("/:id/resend", post(email_templates::resend_log));

    let form_drafts_routes = Router::new().route(
        "/:form_id",
        get(form_drafts::get_draft)
            .put(form_drafts::save_draft)
            .delete(form_drafts::delete_draft),
    );

    let package_orders_routes = Router::new()
        .route("/", get(package_orders::list_orders))
        .route(
            "/:id",
            get(package_orders::get_order).patch(package_orders::update_order),
        );

    let public_routes = Router::new()
        .route("/api/vouchers/validate", get(vouchers::validate_voucher))
        .route(
            "/api/design-package-orders/claim/:token",
            get(package_orders::claim_order),
        );

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/jobs", jobs_routes)
        .nest("/api/users", users_routes)
        .nest("/api/designer-assignments", assignments_routes)
        .nest("/api/vouchers", vouchers_routes)
        .nest("/api/pricing", pricing_routes)
        .nest("/api/payments", payments_routes)
        .nest("/api/email-templates", email_templates_routes)
        .nest("/api/email-logs", email_logs_routes)
        .nest("/api/form-drafts", form_drafts_routes)
        .nest("/api/design-package-orders", package_orders_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
}
