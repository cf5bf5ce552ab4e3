//! Validate raw book listings and forward the well-formed ones to the processor queue.
use envconfig::Envconfig;
use health::HealthRegistry;

use books_common::metrics::{serve, setup_metrics_recorder, setup_probe_router};
use books_common::sqs::{build_client, SqsQueue};
use books_common::stage::StageRunner;
use books_validator::config::Config;
use books_validator::stage::ValidatorStage;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env().expect("Invalid configuration:");

    let client = build_client(&config.aws).await;
    let inbound = SqsQueue::new(client.clone(), config.validator_queue_url.as_str());
    let outbound = SqsQueue::new(client, config.processor_queue_url.as_str());

    let liveness = HealthRegistry::new("liveness");
    let deadline = time::Duration::try_from(config.liveness_deadline.0)
        .expect("liveness deadline out of range");
    let stage_liveness = liveness.register("validator", deadline);

    let router = setup_probe_router(liveness, Some(setup_metrics_recorder()));
    let bind = config.bind();
    tokio::task::spawn(async move {
        serve(router, &bind)
            .await
            .expect("failed to start serving probes");
    });

    let stage = ValidatorStage::new(inbound, outbound, config.poll.clone());
    StageRunner::new(stage, stage_liveness, config.retry_policy.policy())
        .run()
        .await;
}
