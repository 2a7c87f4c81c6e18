//! Fetch the latest evaluations, attach customer names and print them as a JSON array.
use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use envconfig::Envconfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use evaluation_enricher::config::Config;
use evaluation_enricher::database::PgStorage;
use evaluation_enricher::pipeline::Pipeline;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::init_from_env().expect("Invalid configuration:");

    // Logs go to stderr, stdout is reserved for the enriched output
    let log_layer = if config.log_json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(EnvFilter::from_default_env())
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(EnvFilter::from_default_env())
            .boxed()
    };
    tracing_subscriber::registry().with(log_layer).init();

    let storage = PgStorage::from_config(&config).await?;

    let pipeline = Pipeline::new(
        Arc::new(storage),
        config.customer_role.as_str(),
        config.order_by.clone(),
    )
    .descending(config.descending)
    .message_order(config.message_order)
    .lookup_failure_policy(config.lookup_failure_policy);

    tracing::info!(
        "enriching up to {} evaluations ({:?} lookup failure policy)",
        config.fetch_limit.get(),
        pipeline.policy()
    );

    let enriched = pipeline.enrich(config.fetch_limit).await?;

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &enriched)?;
    writeln!(stdout)?;

    Ok(())
}
