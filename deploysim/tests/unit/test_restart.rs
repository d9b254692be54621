//! Persistence across process restarts

use std::sync::Arc;
use std::time::Duration;

use deploysim::filesys::file::File;
use deploysim::models::catalog::ProviderCatalog;
use deploysim::models::deployment::{DeployStatus, ProviderStatus};
use deploysim::registry::{CatalogPolicy, Registry};
use deploysim::simulator::{Simulator, SimulatorOptions};
use deploysim::store::{JsonFileBackend, PersistentStore, StoreOptions};

async fn open(file: &File) -> Arc<Registry> {
    let store = Arc::new(PersistentStore::new(
        Arc::new(JsonFileBackend::new(file.clone())),
        StoreOptions::default(),
    ));
    Arc::new(Registry::open(store, ProviderCatalog::default(), CatalogPolicy::RejectUnknown).await)
}

#[tokio::test(start_paused = true)]
async fn test_reload_reconstructs_persisted_state() {
    let dir = tempfile::tempdir().unwrap();
    let file = File::new(dir.path().join("deployments.json"));

    let registry = open(&file).await;
    let slugs = vec!["aws".to_string(), "oracle".to_string()];
    let deploy = registry
        .create("https://github.com/acme/app", &slugs)
        .await
        .unwrap();
    let simulator = Simulator::new(registry.clone(), SimulatorOptions::default());
    simulator.start(deploy.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(7500)).await;
    simulator.shutdown().await;
    registry.flush().await;

    let before = registry.get(deploy.id).await.unwrap();
    assert_eq!(before.progress, 35);

    let reopened = open(&file).await;
    assert_eq!(reopened.get(deploy.id).await.unwrap(), before);
}

#[tokio::test(start_paused = true)]
async fn test_resumed_run_finishes_without_repeating_milestones() {
    let dir = tempfile::tempdir().unwrap();
    let file = File::new(dir.path().join("deployments.json"));

    let registry = open(&file).await;
    let slugs = vec!["aws".to_string()];
    let deploy = registry
        .create("https://github.com/acme/app", &slugs)
        .await
        .unwrap();
    let simulator = Simulator::new(registry.clone(), SimulatorOptions::default());
    simulator.start(deploy.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(4500)).await;
    simulator.shutdown().await;

    // Second process picks the deployment up where the first left it
    let reopened = open(&file).await;
    let simulator = Simulator::new(reopened.clone(), SimulatorOptions::default());
    assert_eq!(simulator.resume_active().await, 1);
    tokio::time::sleep(Duration::from_secs(20)).await;

    let finished = reopened.get(deploy.id).await.unwrap();
    assert_eq!(finished.status(), DeployStatus::Completed);
    let provider = &finished.providers[0];
    assert_eq!(provider.status, ProviderStatus::Up);

    let mut messages: Vec<&str> = provider.logs.iter().map(|l| l.message.as_str()).collect();
    let total = messages.len();
    messages.sort_unstable();
    messages.dedup();
    assert_eq!(messages.len(), total);
    assert_eq!(total, 11);
    assert!(!simulator.is_running(deploy.id));
}
