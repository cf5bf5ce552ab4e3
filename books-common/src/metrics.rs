use axum::{routing::get, Router};
use health::HealthRegistry;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Bind a `TcpListener` on the provided bind address to serve a `Router` on it.
/// This function is intended to take a Router as returned by `setup_probe_router`.
pub async fn serve(router: Router, bind: &str) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(bind).await?;

    axum::serve(listener, router).await?;

    Ok(())
}

/// Router exposing `/_liveness` from the registry and, when a recorder is given, `/metrics`.
pub fn setup_probe_router(liveness: HealthRegistry, metrics: Option<PrometheusHandle>) -> Router {
    Router::new()
        .route("/", get(index))
        .route(
            "/_liveness",
            get(move || std::future::ready(liveness.get_status())),
        )
        .route(
            "/metrics",
            get(move || match metrics {
                Some(ref recorder_handle) => std::future::ready(recorder_handle.render()),
                None => std::future::ready("no metrics recorder installed".to_owned()),
            }),
        )
}

/// Prometheus exporter rendering histograms with buckets sized for poll cycles,
/// which long-poll for up to 20 seconds.
pub fn prometheus_builder() -> PrometheusBuilder {
    const EXPONENTIAL_SECONDS: &[f64] = &[
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0,
    ];

    PrometheusBuilder::new()
        .set_buckets(EXPONENTIAL_SECONDS)
        .expect("bucket list is not empty")
}

/// Install the global Prometheus recorder. Must be called once per process.
pub fn setup_metrics_recorder() -> PrometheusHandle {
    prometheus_builder()
        .install_recorder()
        .expect("failed to install metrics recorder")
}

async fn index() -> &'static str {
    "books pipeline stage"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use health::ComponentStatus;
    use http_body_util::BodyExt; // for `collect`
    use tower::ServiceExt; // for `oneshot`

    async fn get(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();

        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_liveness_follows_the_registry() {
        let registry = HealthRegistry::new("liveness");
        let handle = registry.register("validator", time::Duration::seconds(30));
        let router = setup_probe_router(registry, None);

        let (status, body) = get(router.clone(), "/_liveness").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("Starting"));

        handle.report_healthy();
        let (status, _) = get(router.clone(), "/_liveness").await;
        assert_eq!(status, StatusCode::OK);

        handle.report_status(ComponentStatus::HealthyUntil(
            time::OffsetDateTime::now_utc() - time::Duration::seconds(1),
        ));
        let (status, body) = get(router, "/_liveness").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("Stalled"));
    }

    #[tokio::test]
    async fn test_metrics_route() {
        let without = setup_probe_router(HealthRegistry::new("liveness"), None);
        let (status, body) = get(without, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "no metrics recorder installed");

        let recorder = prometheus_builder().build_recorder();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!("books_stage_cycles_total", "stage" => "collector").increment(3);
        });
        let with = setup_probe_router(HealthRegistry::new("liveness"), Some(recorder.handle()));
        let (_, body) = get(with, "/metrics").await;
        assert!(body.contains("books_stage_cycles_total{stage=\"collector\"} 3"));
    }

    #[tokio::test]
    async fn test_index() {
        let (status, body) = get(setup_probe_router(HealthRegistry::new("liveness"), None), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "books pipeline stage");
    }
}
