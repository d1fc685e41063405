use std::net::SocketAddr;

use actix_cors::Cors;
use actix_web::{web::Data, App, HttpServer};
use actix_web_opentelemetry::{RequestMetrics, RequestTracing};
use anyhow::Result;
use harrow_auth::token::JwksVerifier;
use harrow_core::env::infer_or;
use harrow_provider::{ActionRegistry, BatchClient};

pub async fn try_loop_forever(
    client: BatchClient,
    registry: ActionRegistry,
    verifier: JwksVerifier,
) -> Result<()> {
    let addr = infer_or("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8000)));

    let client = Data::new(client);
    let registry = Data::new(registry);
    let verifier = Data::new(verifier);

    // Start web server
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_header()
            .allow_any_method()
            .allow_any_origin();

        let app = App::new()
            .app_data(Data::clone(&client))
            .app_data(Data::clone(&registry))
            .app_data(Data::clone(&verifier));
        let app = app
            .service(crate::routes::batch::dispatch)
            .service(crate::routes::batch::status)
            .service(crate::routes::batch::list)
            .service(crate::routes::batch::output)
            .service(crate::routes::system::status)
            .service(crate::routes::system::version);
        app.wrap(cors)
            .wrap(RequestTracing::default())
            .wrap(RequestMetrics::default())
    })
    .bind(addr)
    .unwrap_or_else(|e| panic!("failed to bind to {addr}: {e}"))
    .run()
    .await
    .map_err(Into::into)
}
