use std::{future::ready, time::Duration};

use actix_web::{
    dev::{Server, Service},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use farm_payment_engine::{events::EventProducers, ReconciliationApi, SqliteDatabase};
use futures::future::Either;
use log::*;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    helpers::is_peer_allowed,
    integrations::relay::{create_relay_event_handlers, NotificationRelay},
    routes::{health, PaymentWebhookRoute},
    sweep_worker::start_sweep_worker,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Database migration failed. {e}")))?;
    let relay = NotificationRelay::new(config.relay.url.clone(), config.relay.timeout)
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = create_relay_event_handlers(relay);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    match config.sweep_interval {
        Some(interval) => {
            let _ = start_sweep_worker(db.clone(), producers.clone(), config.reconciliation.clone(), interval);
        },
        None => info!("🧹️ The unmatched payment sweeper will not run."),
    }
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let api = ReconciliationApi::new(db.clone(), producers.clone(), config.reconciliation.clone());
        let verifier = config.webhook.verifier();
        let use_x_forwarded_for = config.use_x_forwarded_for;
        let use_forwarded = config.use_forwarded;
        let whitelist = config.processor_whitelist.clone();
        let webhook_scope = web::scope("/webhook")
            .wrap_fn(move |req, srv| {
                if is_peer_allowed(req.request(), whitelist.as_deref(), use_x_forwarded_for, use_forwarded) {
                    Either::Left(srv.call(req))
                } else {
                    Either::Right(ready(Ok(req.error_response(ServerError::ForbiddenPeer))))
                }
            })
            .service(PaymentWebhookRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("fpg::access_log"))
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(verifier))
            .service(health)
            .service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
