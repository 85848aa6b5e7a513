use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post},
    Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::state::AppState;

pub mod attachments;
pub mod claims;
pub mod court_cases;
pub mod defects;
pub mod health;
pub mod letters;
pub mod links;
pub mod statuses;
pub mod tickets;
pub mod units;

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

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
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

    let claims_routes = Router::new()
        .route("/", get(claims::list_claims).post(claims::create_claim))
        .route("/by-ids", post(claims::claims_by_ids))
        .route("/links", get(links::list_claim_links))
        .route("/links/:child_id", delete(links::unlink_claim))
        .route("/:id/links", post(links::link_claims))
        .route(
            "/:id",
            get(claims::get_claim)
                .patch(claims::update_claim)
                .delete(claims::delete_claim),
        )
        .route("/:id/defects", post(claims::set_claim_defects))
        .route("/:id/units", post(claims::set_claim_units))
        .route(
            "/:id/attachments",
            post(attachments::upload_claim_attachments)
                .delete(attachments::remove_claim_attachments),
        );

    let defects_routes = Router::new()
        .route("/", get(defects::list_defects).post(defects::create_defect))
        .route("/by-ids", post(defects::defects_by_ids))
        .route(
            "/:id",
            get(defects::get_defect)
                .patch(defects::update_defect)
                .delete(defects::delete_defect),
        )
        .route(
            "/:id/fix",
            post(defects::fix_defect).delete(defects::cancel_defect_fix),
        )
        .route(
            "/:id/attachments",
            post(attachments::upload_defect_attachments)
                .delete(attachments::remove_defect_attachments),
        );

    let tickets_routes = Router::new()
        .route("/", get(tickets::list_tickets).post(tickets::create_ticket))
        .route("/links", get(links::list_ticket_links))
        .route("/links/:child_id", delete(links::unlink_ticket))
        .route("/:id/links", post(links::link_tickets))
        .route(
            "/:id",
            get(tickets::get_ticket)
                .patch(tickets::update_ticket)
                .delete(tickets::delete_ticket),
        )
        .route(
            "/:id/attachments",
            post(attachments::upload_ticket_attachments)
                .delete(attachments::remove_ticket_attachments),
        );

    let letters_routes = Router::new()
        .route("/", get(letters::list_letters).post(letters::create_letter))
        .route("/links", get(links::list_letter_links))
        .route("/links/:child_id", delete(links::unlink_letter))
        .route("/:id/links", post(links::link_letters))
        .route(
            "/:id",
            get(letters::get_letter)
                .patch(letters::update_letter)
                .delete(letters::delete_letter),
        )
        .route(
            "/:id/attachments",
            post(attachments::upload_letter_attachments)
                .delete(attachments::remove_letter_attachments),
        );

    let court_cases_routes = Router::new()
        .route(
            "/",
            get(court_cases::list_court_cases).post(court_cases::create_court_case),
        )
        .route(
            "/:id",
            get(court_cases::get_court_case)
                .patch(court_cases::update_court_case)
                .delete(court_cases::delete_court_case),
        )
        .route(
            "/:id/attachments",
            post(attachments::upload_court_case_attachments)
                .delete(attachments::remove_court_case_attachments),
        );

    let attachments_routes = Router::new()
        .route("/:id/url", get(attachments::attachment_url))
        .route("/:id/preview", get(attachments::attachment_preview_url))
        .route(
            "/:id/description",
            patch(attachments::update_attachment_description),
        );

    let statuses_routes = Router::new().route(
        "/",
        get(statuses::list_statuses).post(statuses::create_status),
    );

    let units_routes = Router::new().route("/", get(units::list_units).post(units::create_unit));

    Router::new()
        .nest("/api/claims", claims_routes)
        .nest("/api/defects", defects_routes)
        .nest("/api/tickets", tickets_routes)
        .nest("/api/letters", letters_routes)
        .nest("/api/court-cases", court_cases_routes)
        .nest("/api/attachments", attachments_routes)
        .nest("/api/statuses", statuses_routes)
        .nest("/api/units", units_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(1024 * 1024 * 512))
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}
