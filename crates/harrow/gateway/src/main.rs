mod actix;
mod routes;

use anyhow::Result;
use harrow_api::config::BatchConfig;
use harrow_auth::token::JwksVerifier;
use harrow_core::{
    env::{infer_or, infer_string},
    signal::FunctionSignal,
    tracer,
};
use harrow_provider::{ActionRegistry, BatchClient};
use opentelemetry::global;
use tokio::spawn;

#[tokio::main]
async fn main() {
    async fn try_main(signal: &FunctionSignal) -> Result<()> {
        // Initialize clients
        let namespace = infer_string("POD_NAMESPACE")?;
        let config_path = infer_or("ACTION_CONFIG_PATH", "/harrow/actions.json".to_string());
        let jwks_endpoint = infer_string("JWKS_ENDPOINT")?;

        let registry = ActionRegistry::load(&config_path)?;
        let verifier = JwksVerifier::new(jwks_endpoint);
        let client = BatchClient::connect(BatchConfig::new(namespace)).await?;

        // Start the reaper
        let reaper = spawn(::harrow_reaper::loop_forever(client.clone(), signal.clone()));

        // Start the web server
        crate::actix::try_loop_forever(client, registry, verifier).await?;

        signal.terminate();
        reaper.await.map_err(Into::into)
    }

    tracer::init_once();

    let signal = FunctionSignal::default();
    signal
        .trap_on_sigint()
        .expect("trapping the shutdown signal");

    try_main(&signal).await.expect("running the gateway");
    global::shutdown_tracer_provider()
}
