//! Publish the listings of a merchant CSV file to the validator queue, then exit.
use envconfig::Envconfig;
use eyre::Result;
use tracing::info;

use books_common::sqs::{build_client, SqsQueue};
use merchant_importer::config::Config;
use merchant_importer::importer::import_file;

async fn run(config: Config) -> Result<()> {
    let client = build_client(&config.aws).await;
    let queue = SqsQueue::new(client, config.validator_queue_url.as_str());

    let summary = import_file(&config.import_file, &queue).await?;
    info!(
        read = summary.read,
        sent = summary.sent,
        failed = summary.failed,
        "import finished"
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env().expect("Invalid configuration:");

    if let Err(e) = run(config).await {
        tracing::error!("import failed: {}", e);
        std::process::exit(1);
    }
}
