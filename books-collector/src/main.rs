//! Append eligible listings from the collector queue to a CSV file.
use envconfig::Envconfig;
use health::HealthRegistry;

use books_collector::config::Config;
use books_collector::stage::CollectorStage;
use books_collector::store::CsvStore;
use books_common::metrics::{serve, setup_metrics_recorder, setup_probe_router};
use books_common::sqs::{build_client, SqsQueue};
use books_common::stage::StageRunner;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env().expect("Invalid configuration:");

    let store = CsvStore::open(&config.output_path).expect("failed to open output file");
    let client = build_client(&config.aws).await;
    let inbound = SqsQueue::new(client, config.collector_queue_url.as_str());

    let liveness = HealthRegistry::new("liveness");
    let deadline = time::Duration::try_from(config.liveness_deadline.0)
        .expect("liveness deadline out of range");
    let stage_liveness = liveness.register("collector", deadline);

    let router = setup_probe_router(liveness, Some(setup_metrics_recorder()));
    let bind = config.bind();
    tokio::task::spawn(async move {
        serve(router, &bind)
            .await
            .expect("failed to start serving probes");
    });

    let stage = CollectorStage::new(inbound, store, config.poll.clone());
    StageRunner::new(stage, stage_liveness, config.retry_policy.policy())
        .run()
        .await;
}
