// main.rs
use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::{Logger, NormalizePath, TrailingSlash};
use actix_web::web::{self, JsonConfig};
use actix_web::{App, HttpServer};

use driver_management_backend::config::AppConfig;
use driver_management_backend::services::driver_service::DriverServiceClient;
use driver_management_backend::{configure, db, errors};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("starting up...");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Konfigurasi tidak valid: {}", e);
            std::process::exit(1);
        }
    };

    let pool = match db::establish_connection(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("Gagal inisialisasi pool database: {:?}", e);
            std::process::exit(1);
        }
    };

    let driver_service = match DriverServiceClient::new(&config.driver_service_url) {
        Ok(client) => client,
        Err(e) => {
            log::error!("Gagal membuat klien driver-service: {:?}", e);
            std::process::exit(1);
        }
    };
    log::info!("driver-service: {}", driver_service.base_url());

    let bind_addr = (config.host.clone(), config.port);
    let payload_limit = config.payload_limit_bytes();
    let config_data = web::Data::new(config);
    let pool_data = web::Data::new(pool);
    let service_data = web::Data::new(driver_service);

    log::info!("listening on {}:{}", bind_addr.0, bind_addr.1);

    HttpServer::new(move || {
        let cors = match config_data.cors_origin.as_deref() {
            Some(origin) => Cors::default()
                .allowed_origin(origin)
                .supports_credentials(),
            None => Cors::default().allow_any_origin(),
        }
        .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(3600);

        let json_config = JsonConfig::default()
            .limit(payload_limit) // foto dokumen dikirim sebagai base64
            .content_type_required(false)
            .error_handler(|err, _req| errors::json_payload_error(err));

        App::new()
            .app_data(pool_data.clone())
            .app_data(config_data.clone())
            .app_data(service_data.clone())
            .app_data(json_config)
            .app_data(web::PayloadConfig::new(payload_limit))
            .wrap(cors)
            .wrap(NormalizePath::new(TrailingSlash::Trim))
            .wrap(Logger::default())
            .configure(configure)
    })
    .bind(bind_addr)?
    .run()
    .await
}
