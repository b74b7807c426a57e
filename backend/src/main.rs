use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use std::env;

use backend::auth::jwt::JwtService;
use backend::auth::middleware::AuthMiddleware;
use backend::db::repository::Repository;
use backend::inference::detector::Detector;
use backend::inference::model::Model;
use backend::routes::configure_routes;
use backend::storage::media_store::MediaStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenv::dotenv().ok();

    let model_path = env::var("MODEL_PATH").unwrap();
    let model = match Model::load(&model_path) {
        Ok(model) => model,
        Err(e) => {
            log::error!("Failed to preload model at startup: {:?}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Model loading failed: {:?}", e),
            ));
        }
    };
    let detector = Detector::new(model);

    let database_path =
        env::var("DATABASE_PATH").unwrap_or_else(|_| "deepfake_detection.db".to_string());
    let db_repo = Repository::open(&database_path).await.map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Database init failed: {:?}", e),
        )
    })?;

    let media_dir = env::var("MEDIA_DIR").unwrap_or_else(|_| "media".to_string());
    let media_store = MediaStore::new(&media_dir).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Media dir init failed: {:?}", e),
        )
    })?;

    let jwt_secret = env::var("JWT_SECRET").unwrap().to_string();
    let jwt_service = JwtService::new(&jwt_secret);
    let auth_middleware = AuthMiddleware::new(jwt_service.clone());

    let port = env::var("PORT").unwrap_or_else(|_| "8081".to_string());
    let bind_address = format!("0.0.0.0:{}", port);

    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::AUTHORIZATION,
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(web::Data::new(detector.clone()))
            .app_data(web::Data::new(db_repo.clone()))
            .app_data(web::Data::new(media_store.clone()))
            .app_data(web::Data::new(jwt_service.clone()))
            .configure(|cfg| configure_routes(cfg, auth_middleware.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
