use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/booking",
            post(handlers::booking::create_booking)
                .put(handlers::booking::confirm_payment)
                .get(handlers::booking::get_all_bookings),
        )
        .route("/booking/users", get(handlers::booking::get_user_bookings))
        .route(
            "/booking/transactions",
            get(handlers::booking::get_transactions),
        )
        .route(
            "/booking/reschedule",
            put(handlers::booking::reschedule_booking),
        )
        .route("/booking/cancel", put(handlers::booking::cancel_booking))
        .route("/booking/apply", post(handlers::booking::apply_coupon))
        .route("/booking/remove", post(handlers::booking::remove_coupon))
        .route("/booking/:id", get(handlers::booking::get_booking))
        .route(
            "/slot",
            post(handlers::slot::create_slots)
                .get(handlers::slot::get_slots)
                .delete(handlers::slot::delete_slot),
        )
        .route("/slot/add", post(handlers::slot::add_slot))
        .route("/slot/:ground_id", get(handlers::slot::get_upcoming_slots))
        .route(
            "/coupon",
            post(handlers::coupon::create_coupon).get(handlers::coupon::list_coupons),
        )
        .route("/coupon/public", get(handlers::coupon::list_public_coupons))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
