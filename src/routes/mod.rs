use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::{handlers, types::AppState};

pub fn create_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/status", get(handlers::health::status))
        .route(
            "/nnrf-nfm/v1/nf-instances",
            get(handlers::nf_instances::list_nf_instances),
        )
        .route(
            "/nnrf-nfm/v1/nf-instances/:nf_instance_id",
            put(handlers::nf_instances::put_nf_instance)
                .get(handlers::nf_instances::get_nf_instance)
                .patch(handlers::nf_instances::patch_nf_instance)
                .delete(handlers::nf_instances::delete_nf_instance),
        )
        .route(
            "/nnrf-nfm/v1/subscriptions",
            post(handlers::subscriptions::create_subscription),
        )
        .route(
            "/nnrf-nfm/v1/subscriptions/:subscription_id",
            delete(handlers::subscriptions::delete_subscription),
        )
        .route(
            "/nnrf-disc/v1/nf-instances",
            get(handlers::discovery::discover_nf_instances),
        )
        .route(
            "/nnrf-disc/v1/nf-instances/:nf_instance_id",
            get(handlers::discovery::discover_nf_instance),
        )
        .with_state(app_state)
}
