use actix_web::{web, App, HttpServer};
use marketplace_chat_service::{
    config, db, error, logging, presence::PresenceTable, routes, state::AppState,
    websocket::RoomRegistry,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let db = db::init_pool(&cfg.database_url).await?;
    db::run_migrations(&db)
        .await
        .map_err(|e| error::AppError::StartServer(format!("migrations: {e}")))?;

    let state = AppState {
        db,
        presence: PresenceTable::new(),
        rooms: RoomRegistry::new(),
        config: cfg.clone(),
    };

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting marketplace-chat-service");

    let client_url = cfg.client_url.clone();
    HttpServer::new(move || {
        let cors = match &client_url {
            Some(origin) => actix_cors::Cors::default()
                .allowed_origin(origin)
                .allow_any_method()
                .allow_any_header()
                .supports_credentials()
                .max_age(3600),
            None => actix_cors::Cors::permissive(),
        };

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .service(routes::conversations::get_conversations)
            .service(routes::conversations::create_conversation)
            .service(routes::conversations::get_conversation)
            .service(routes::conversations::mark_conversation_read)
            .service(routes::messages::get_messages)
            .service(routes::messages::send_message)
            .service(routes::wsroute::ws_handler)
            .route("/health", web::get().to(|| async { "OK" }))
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind: {e}")))?
    .run()
    .await
    .map_err(|e| error::AppError::StartServer(format!("run: {e}")))
}
