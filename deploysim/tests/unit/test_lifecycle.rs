//! Deployment lifecycle through registry and simulator

use std::sync::Arc;

use deploysim::errors::SimError;
use deploysim::models::catalog::ProviderCatalog;
use deploysim::models::deployment::{Deploy, DeployLogLevel, DeployStatus, LogFilter};
use deploysim::registry::{CatalogPolicy, Registry};
use deploysim::simulator::{Simulator, SimulatorOptions};
use deploysim::store::{MemoryBackend, PersistentStore, StoreOptions};

async fn setup(policy: CatalogPolicy) -> (Arc<MemoryBackend>, Arc<Registry>) {
    let backend = Arc::new(MemoryBackend::new());
    let store = Arc::new(PersistentStore::new(backend.clone(), StoreOptions::default()));
    let registry = Arc::new(Registry::open(store, ProviderCatalog::default(), policy).await);
    (backend, registry)
}

fn slugs(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_full_run_completes_once() {
    let (backend, registry) = setup(CatalogPolicy::RejectUnknown).await;
    let deploy = registry
        .create("https://github.com/acme/app", &slugs(&["aws", "oracle"]))
        .await
        .unwrap();

    let simulator = Simulator::new(registry.clone(), SimulatorOptions::default());
    let mut events = simulator.subscribe();
    simulator.start(deploy.id).await.unwrap();

    let mut snapshots: Vec<Deploy> = Vec::new();
    loop {
        let snapshot = events.recv().await.unwrap();
        let done = snapshot.is_terminal();
        snapshots.push(snapshot);
        if done {
            break;
        }
    }

    assert_eq!(snapshots.len(), 20);
    let completed: Vec<_> = snapshots.iter().filter_map(|d| d.completed_at).collect();
    assert_eq!(completed.len(), 1);
    assert!(snapshots.iter().all(|d| d.progress <= 100));

    let last = snapshots.last().unwrap();
    assert_eq!(last.status(), DeployStatus::Completed);
    for provider in &last.providers {
        let tail: Vec<DeployLogLevel> = provider.logs.iter().rev().take(2).map(|l| l.level).collect();
        assert_eq!(tail, vec![DeployLogLevel::Info, DeployLogLevel::Success]);
        assert_eq!(
            provider
                .logs
                .iter()
                .filter(|l| l.level == DeployLogLevel::Success)
                .count(),
            1
        );
    }

    // Every tick persisted, the store holds the final state
    assert_eq!(backend.contents().unwrap(), vec![last.clone()]);
}

#[tokio::test]
async fn test_logs_are_ordered_and_filterable() {
    let (_, registry) = setup(CatalogPolicy::RejectUnknown).await;
    let deploy = registry
        .create("https://github.com/acme/app", &slugs(&["aws", "oracle"]))
        .await
        .unwrap();
    registry
        .update(deploy.id, |d| {
            let ids = deploysim::registry::IdSequence::starting_after(d.max_child_id());
            let mut run = deploysim::simulator::RunState::resume(tokio::time::Instant::now(), d);
            let settings = deploysim::simulator::TickSettings {
                progress_step: 100,
                ..Default::default()
            };
            deploysim::simulator::apply_tick(
                d,
                &mut run,
                &ids,
                &settings,
                tokio::time::Instant::now(),
                chrono::Utc::now(),
            );
        })
        .await
        .unwrap();

    let all = registry.logs(deploy.id, &LogFilter::default()).await.unwrap();
    assert_eq!(all.len(), 4);
    assert!(all
        .windows(2)
        .all(|w| (w[0].entry.timestamp, w[0].entry.id) <= (w[1].entry.timestamp, w[1].entry.id)));

    let oracle_success = registry
        .logs(
            deploy.id,
            &LogFilter {
                provider: Some("oracle".to_string()),
                level: Some(DeployLogLevel::Success),
            },
        )
        .await
        .unwrap();
    assert_eq!(oracle_success.len(), 1);
    assert_eq!(oracle_success[0].provider_slug, "oracle");
}

#[tokio::test]
async fn test_catalog_policy() {
    let (_, strict) = setup(CatalogPolicy::RejectUnknown).await;
    let rejected = strict
        .create("https://github.com/acme/app", &slugs(&["gcp"]))
        .await;
    assert!(matches!(rejected, Err(SimError::ValidationError(_))));

    let (_, lenient) = setup(CatalogPolicy::AcceptUnknown).await;
    let accepted = lenient
        .create("https://github.com/acme/app", &slugs(&["gcp"]))
        .await
        .unwrap();
    assert_eq!(accepted.providers[0].slug, "gcp");
}

#[tokio::test]
async fn test_failed_saves_keep_memory_authoritative() {
    let (backend, registry) = setup(CatalogPolicy::RejectUnknown).await;
    backend.set_fail_writes(true);

    let deploy = registry
        .create("https://github.com/acme/app", &slugs(&["aws"]))
        .await
        .unwrap();
    assert_eq!(registry.get(deploy.id).await, Some(deploy.clone()));
    assert!(backend.contents().is_none());

    backend.set_fail_writes(false);
    registry.flush().await;
    assert_eq!(backend.contents().unwrap(), vec![deploy]);
}
