use std::fs;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware::Logger, web};
use shelf_backend::{FilesService, config::AppConfig, routes};
use tracing::info;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env().expect("failed to load config");

    fs::create_dir_all(&config.log_dir).expect("failed to create log directory");
    fs::create_dir_all(&config.base_dir).expect("failed to create base directory");
    let file_appender = rolling::never(&config.log_dir, "backend.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let _guard = guard;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .expect("failed to init logging filter");

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    info!(
        host = %config.host,
        port = config.port,
        base_dir = %config.base_dir.display(),
        prefix = %config.api_prefix,
        "starting Shelf backend"
    );

    let bind_addr = format!("{}:{}", config.host, config.port);
    let service = web::Data::new(FilesService::new(
        &config.base_dir,
        config.base_url.clone(),
        config.api_prefix.clone(),
    ));

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .configure(|cfg| routes::register(cfg, service.clone()))
    })
    .bind(bind_addr)?
    .run()
    .await
}
