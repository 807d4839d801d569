use actix_web::web;

use super::handlers;

/// Configures the API routes
///
/// # Arguments
///
/// * `cfg` - The service configuration
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/chain", web::get().to(handlers::get_chain))
            .route("/chain", web::delete().to(handlers::clear_chain))
            .route("/chain/latest", web::get().to(handlers::get_latest_block))
            .route("/blocks", web::post().to(handlers::add_block))
            .route("/blocks/{hash}", web::get().to(handlers::get_block_by_hash))
            .route("/validate", web::get().to(handlers::validate_chain))
            .route("/verify", web::post().to(handlers::verify_data))
            .route("/sectors", web::get().to(handlers::get_sectors))
    );
}
