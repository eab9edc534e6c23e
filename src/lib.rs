pub mod auth;
pub mod config;
pub mod controllers;
pub mod db;
pub mod errors;
pub mod models;
pub mod services;
pub mod utils;

use actix_web::web;

/// Semua route API; dipakai `main` dan integration test.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(controllers::auth_controller::routes)
        .configure(controllers::driver_controller::routes)
        .configure(controllers::armada_controller::routes)
        .configure(controllers::order_controller::routes)
        .configure(controllers::dispatch_controller::routes)
        .configure(controllers::training_controller::routes)
        .configure(controllers::rating_controller::routes)
        .configure(controllers::admin_controller::routes);
}
