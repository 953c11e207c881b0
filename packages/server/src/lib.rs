pub mod assets;
pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod ordering;
pub mod routes;
pub mod seed;
pub mod state;

#[cfg(test)]
mod test_support;

use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_scalar::{Scalar, Servable as ScalarServable};
use utoipa_swagger_ui::SwaggerUi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "CMS API",
        version = "1.0.0",
        description = "Content management API for a service business website"
    ),
    tags(
        (name = "Assets", description = "Image uploads and discarding unattached objects"),
        (name = "Sliders", description = "Home page slider, ordered and capped"),
        (name = "Categories", description = "Service categories, ordered"),
        (name = "Category Add-ons", description = "Ordered add-ons within a category"),
        (name = "Services", description = "Services offered within a category"),
        (name = "Service Add-ons", description = "Ordered add-ons within a service"),
        (name = "Testimonials", description = "Customer testimonials"),
        (name = "Gallery", description = "Image gallery"),
        (name = "About", description = "About page header, story and blocks"),
        (name = "Settings", description = "Site-wide settings"),
        (name = "Health", description = "Liveness and database reachability"),
    ),
)]
struct ApiDoc;

/// Build the application router.
pub fn build_router(state: AppState) -> axum::Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest("/api", routes::api_routes(&state.config))
        .split_for_parts();

    router
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api.clone()))
        .merge(Scalar::with_url("/scalar", api))
}
