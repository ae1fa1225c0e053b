//! End-to-end registry flows as seen by a monitoring collaborator.

use std::sync::Arc;
use std::time::Duration;

use breakwater_core::{
    create_breaker, global, BreakerError, BreakerRegistry, CircuitBreaker, CircuitState,
    RegistryManifest,
};

#[derive(Debug, thiserror::Error)]
#[error("upstream returned 503")]
struct Unavailable;

async fn call_failing(breaker: &CircuitBreaker) -> Result<(), BreakerError<Unavailable>> {
    breaker.call(|| async { Err(Unavailable) }).await
}

#[tokio::test]
async fn manifest_breakers_report_dashboard_shape() {
    let path = std::env::temp_dir().join(format!(
        "breakwater-manifest-{}.json",
        std::process::id()
    ));
    std::fs::write(
        &path,
        r#"{"breakers": [
            {"name": "external_api", "failure_threshold": 3, "timeout": 60, "success_threshold": 2},
            {"name": "cache", "failure_threshold": 1, "timeout": "500ms"}
        ]}"#,
    )
    .unwrap();

    let manifest = RegistryManifest::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let registry = BreakerRegistry::new();
    manifest.register_all(&registry).unwrap();

    let api = registry.get("external_api").unwrap();
    for _ in 0..3 {
        call_failing(&api).await.unwrap_err();
    }
    let rejected = call_failing(&api).await.unwrap_err();
    assert!(rejected.is_open());

    let json = serde_json::to_value(registry.all_stats()).unwrap();
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 2);

    let cache = &entries[0];
    assert_eq!(cache["name"], "cache");
    assert_eq!(cache["state"], "closed");
    assert_eq!(cache["timeout_seconds"], 0.5);

    let api = &entries[1];
    assert_eq!(api["name"], "external_api");
    assert_eq!(api["state"], "open");
    assert_eq!(api["is_open"], true);
    assert_eq!(api["total_calls"], 4);
    assert_eq!(api["total_failures"], 3);
    assert_eq!(api["failure_threshold"], 3);
    assert_eq!(api["success_threshold"], 2);
    assert!(api["time_until_retry"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn global_factory_and_reset() {
    let a = create_breaker("scenario_global_a", 1, 60.0, 1, None).unwrap();
    let b = CircuitBreaker::builder("scenario_global_b")
        .failure_threshold(1)
        .timeout(Duration::from_secs(60))
        .fallback(|| Ok::<(), Unavailable>(()))
        .register(global())
        .unwrap();

    call_failing(&a).await.unwrap_err();
    call_failing(&b).await.unwrap_err();
    assert!(a.is_open() && b.is_open());

    // Fallback hides the open circuit from callers of `b`.
    assert!(call_failing(&b).await.is_ok());

    assert_eq!(global().reset(Some("scenario_global_a")), 1);
    assert_eq!(a.state(), CircuitState::Closed);
    assert_eq!(b.state(), CircuitState::Open);

    let looked_up = global().get("scenario_global_b").unwrap();
    assert!(Arc::ptr_eq(&looked_up, &b));

    global().unregister("scenario_global_a");
    global().unregister("scenario_global_b");
}
