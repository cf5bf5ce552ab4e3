//! Reduce batches of validated listings to the cheapest listing per seller and send them to the collector.
use envconfig::Envconfig;
use health::HealthRegistry;

use books_common::metrics::{serve, setup_metrics_recorder, setup_probe_router};
use books_common::sqs::{build_client, SqsQueue};
use books_common::stage::StageRunner;
use books_processor::config::Config;
use books_processor::stage::ProcessorStage;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env().expect("Invalid configuration:");

    let client = build_client(&config.aws).await;
    let inbound = SqsQueue::new(client.clone(), config.processor_queue_url.as_str());
    let outbound = SqsQueue::new(client, config.collector_queue_url.as_str());

    let liveness = HealthRegistry::new("liveness");
    let deadline = time::Duration::try_from(config.liveness_deadline.0)
        .expect("liveness deadline out of range");
    let stage_liveness = liveness.register("processor", deadline);

    let router = setup_probe_router(liveness, Some(setup_metrics_recorder()));
    let bind = config.bind();
    tokio::task::spawn(async move {
        serve(router, &bind)
            .await
            .expect("failed to start serving probes");
    });

    let stage = ProcessorStage::new(
        inbound,
        outbound,
        config.poll.clone(),
        config.min_seller_rating,
    );
    StageRunner::new(stage, stage_liveness, config.retry_policy.policy())
        .run()
        .await;
}
