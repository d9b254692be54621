//! Polling contract against live deployments

use std::time::Duration;

use chrono::Utc;
use deploysim::models::deployment::{Deploy, DeployStatus, LogFilter, ProviderState, ProviderStatus};
use deploysim::polling::{PollingPolicy, QueryKey, ReadCache};

fn deploy(id: u64, progress: u8) -> Deploy {
    let now = Utc::now();
    let mut provider = ProviderState::new(id * 10, "aws", now);
    if progress == 100 {
        provider.status = ProviderStatus::Up;
    }
    Deploy {
        id,
        repo_url: "https://github.com/acme/app".to_string(),
        progress,
        created_at: now,
        updated_at: now,
        completed_at: (progress == 100).then_some(now),
        providers: vec![provider],
    }
}

#[test]
fn test_intervals_slow_down_after_completion() {
    let policy = PollingPolicy::default();
    let running = deploy(1, 50);
    let done = deploy(2, 100);

    assert_eq!(policy.deploy_refetch_interval(&running), Duration::from_secs(3));
    assert_eq!(policy.deploy_refetch_interval(&done), Duration::from_secs(10));
    assert_eq!(policy.log_refetch_interval(running.status()), Duration::from_secs(1));
    assert_eq!(policy.log_refetch_interval(DeployStatus::Completed), Duration::from_secs(30));
    assert_eq!(
        policy.list_refetch_interval(&[running, done.clone()]),
        Some(Duration::from_secs(3))
    );
    assert_eq!(policy.list_refetch_interval(&[done]), None);
}

#[test]
fn test_cache_partitioning_by_deployment_and_filter() {
    let policy = PollingPolicy::default();
    let cache: ReadCache<Deploy> = ReadCache::new(16);
    let first = deploy(1, 20);
    let second = deploy(2, 20);
    let aws = LogFilter {
        provider: Some("aws".to_string()),
        level: None,
    };

    for d in [&first, &second] {
        cache.insert(QueryKey::DeployDetail(d.id), d.clone(), policy.deploy_refetch_interval(d));
        cache.insert(QueryKey::logs(d.id, LogFilter::default()), d.clone(), Duration::from_secs(1));
        cache.insert(QueryKey::logs(d.id, aws.clone()), d.clone(), Duration::from_secs(1));
    }
    assert_eq!(cache.len(), 6);

    // Invalidating one filtered view leaves the unfiltered one alone
    assert_eq!(cache.invalidate(&QueryKey::logs(1, aws.clone())), 1);
    assert!(cache.get(&QueryKey::Logs(1)).is_some());

    // An explicit refresh drops every log view of that deployment only
    cache.insert(QueryKey::logs(1, aws.clone()), first.clone(), Duration::from_secs(1));
    assert_eq!(cache.refresh_all_logs(1), 2);
    assert!(cache.get(&QueryKey::DeployDetail(1)).is_some());
    assert!(cache.get(&QueryKey::logs(2, aws)).is_some());
}
