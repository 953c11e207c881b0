use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/assets", asset_routes(config))
        .nest("/sliders", slider_routes())
        .nest("/categories", category_routes())
        .nest("/services", service_routes())
        .nest("/testimonials", testimonial_routes())
        .nest("/gallery", gallery_routes())
        .nest("/about", about_routes())
        .nest("/settings", settings_routes())
        .nest("/health", health_routes())
}

fn asset_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    use handlers::assets::*;

    OpenApiRouter::new()
        .routes(routes!(upload_asset))
        .routes(routes!(discard_asset))
        .layer(upload_body_limit(config.storage.max_upload_size))
}

fn slider_routes() -> OpenApiRouter<AppState> {
    use handlers::slider::*;

    OpenApiRouter::new()
        .routes(routes!(list_sliders, create_slider))
        .routes(routes!(get_slider, update_slider, delete_slider))
        .routes(routes!(move_slider))
        .routes(routes!(swap_sliders))
        .routes(routes!(reorder_sliders))
        .routes(routes!(bulk_delete_sliders))
}

fn category_routes() -> OpenApiRouter<AppState> {
    use handlers::category::*;

    OpenApiRouter::new()
        .routes(routes!(list_categories, create_category))
        .routes(routes!(get_category, update_category, delete_category))
        .routes(routes!(move_category))
        .routes(routes!(swap_categories))
        .routes(routes!(reorder_categories))
        .routes(routes!(
            list_category_addons,
            create_category_addon,
            replace_category_addons
        ))
        .routes(routes!(delete_category_addon))
        .routes(routes!(move_category_addon))
        .routes(routes!(swap_category_addons))
}

fn service_routes() -> OpenApiRouter<AppState> {
    use handlers::service::*;

    OpenApiRouter::new()
        .routes(routes!(list_services, create_service))
        .routes(routes!(get_service, update_service, delete_service))
        .routes(routes!(
            list_service_addons,
            create_service_addon,
            replace_service_addons
        ))
        .routes(routes!(delete_service_addon))
        .routes(routes!(move_service_addon))
        .routes(routes!(swap_service_addons))
}

fn testimonial_routes() -> OpenApiRouter<AppState> {
    use handlers::testimonial::*;

    OpenApiRouter::new()
        .routes(routes!(list_testimonials, create_testimonial))
        .routes(routes!(
            get_testimonial,
            update_testimonial,
            delete_testimonial
        ))
}

fn gallery_routes() -> OpenApiRouter<AppState> {
    use handlers::gallery::*;

    OpenApiRouter::new()
        .routes(routes!(list_gallery_items, create_gallery_item))
        .routes(routes!(
            get_gallery_item,
            update_gallery_item,
            delete_gallery_item
        ))
        .routes(routes!(bulk_delete_gallery_items))
}

fn about_routes() -> OpenApiRouter<AppState> {
    use handlers::about::*;

    OpenApiRouter::new()
        .routes(routes!(list_blocks, create_block))
        .routes(routes!(get_block, update_block, delete_block))
        .routes(routes!(get_page, update_page))
        .routes(routes!(get_story, update_story))
}

fn settings_routes() -> OpenApiRouter<AppState> {
    use handlers::settings::*;

    OpenApiRouter::new().routes(routes!(get_settings, update_settings))
}

fn health_routes() -> OpenApiRouter<AppState> {
    use handlers::health::*;

    OpenApiRouter::new().routes(routes!(health))
}
