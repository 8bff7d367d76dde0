// src/pipeline/revise.rs

//! Liveness pass: listings whose page has disappeared are flagged adopted.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};

use crate::error::Result;
use crate::models::{CrawlerConfig, Listing, Source};
use crate::services::{LivenessProbe, ProbeOutcome};
use crate::storage::{ExportLog, ListingStore};
use crate::utils::http::Throttle;

/// Summary of a liveness pass.
#[derive(Debug, Clone)]
pub struct RevisionReport {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Listings probed
    pub checked: usize,
    /// Listings already adopted, not probed
    pub already_adopted: usize,
    /// URLs flipped to adopted during this pass, in log order
    pub flipped: Vec<String>,
}

impl RevisionReport {
    pub fn still_live(&self) -> usize {
        self.checked - self.flipped.len()
    }
}

/// Probes unadopted listings and flips the ones that are gone.
pub struct LivenessReviser<P> {
    probe: P,
    throttle: Throttle,
    max_concurrent: usize,
}

impl<P: LivenessProbe> LivenessReviser<P> {
    pub fn new(probe: P, config: &CrawlerConfig) -> Self {
        Self {
            probe,
            throttle: Throttle::from_millis(config.request_delay_ms),
            max_concurrent: config.max_concurrent.max(1),
        }
    }

    /// Probe every listing with `adopted == false` and flip the gone ones.
    ///
    /// Adopted listings are never probed, and a flip is never undone.
    pub async fn revise(&self, listings: &mut [Listing]) -> RevisionReport {
        let start_time = Utc::now();

        let targets: Vec<(usize, String)> = listings
            .iter()
            .enumerate()
            .filter(|(_, listing)| !listing.adopted)
            .map(|(index, listing)| (index, listing.url.clone()))
            .collect();
        let checked = targets.len();
        let already_adopted = listings.len() - checked;

        let mut results: Vec<(usize, ProbeOutcome)> = stream::iter(targets)
            .map(|(index, url)| async move {
                self.throttle.wait().await;
                let outcome = self.probe.probe(&url).await;
                (index, outcome)
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;
        results.sort_by_key(|(index, _)| *index);

        let mut flipped = Vec::new();
        for (index, outcome) in results {
            let listing = &mut listings[index];
            match outcome {
                ProbeOutcome::Live => log::debug!("{} is still listed", listing.url),
                ProbeOutcome::Gone(reason) => {
                    log::info!("{} is gone ({reason}), marking adopted", listing.url);
                    listing.adopted = true;
                    flipped.push(listing.url.clone());
                }
            }
        }

        RevisionReport {
            start_time,
            end_time: Utc::now(),
            checked,
            already_adopted,
            flipped,
        }
    }
}

/// Run a liveness pass over the export log of `source`.
///
/// The log is rewritten atomically when anything flipped. Every listing the
/// log holds as adopted is then mirrored into the store, so a store update
/// that failed in an earlier pass is repaired by the next one.
pub async fn run_revise<P: LivenessProbe>(
    reviser: &LivenessReviser<P>,
    export: &ExportLog,
    store: &ListingStore,
    source: Source,
) -> Result<RevisionReport> {
    let mut listings = export.load()?;
    log::info!(
        "Revising {} {} listings from {}",
        listings.len(),
        source,
        export.path().display()
    );

    let report = reviser.revise(&mut listings).await;

    if !report.flipped.is_empty() {
        export.rewrite(&listings)?;
    }

    let mut repaired = 0;
    for listing in listings.iter().filter(|l| l.adopted) {
        if store.mark_adopted(&listing.url)? && !report.flipped.contains(&listing.url) {
            repaired += 1;
        }
    }
    if repaired > 0 {
        log::warn!("{source}: {repaired} adopted listings were behind in the store");
    }

    log::info!(
        "{}: {} checked, {} adopted, {} still live, {} previously adopted",
        source,
        report.checked,
        report.flipped.len(),
        report.still_live(),
        report.already_adopted
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;
    use tokio::time::Instant;

    /// Answers from a fixed set of live URLs and records every probe.
    struct FakeProbe {
        live: HashSet<String>,
        probed: Mutex<Vec<String>>,
        started: Mutex<Vec<Instant>>,
    }

    impl FakeProbe {
        fn new(live: &[&str]) -> Self {
            Self {
                live: live.iter().map(|s| s.to_string()).collect(),
                probed: Mutex::new(Vec::new()),
                started: Mutex::new(Vec::new()),
            }
        }

        fn probed(&self) -> Vec<String> {
            let mut probed = self.probed.lock().unwrap().clone();
            probed.sort();
            probed
        }
    }

    #[async_trait]
    impl LivenessProbe for FakeProbe {
        async fn probe(&self, url: &str) -> ProbeOutcome {
            self.started.lock().unwrap().push(Instant::now());
            self.probed.lock().unwrap().push(url.to_string());
            if self.live.contains(url) {
                ProbeOutcome::Live
            } else {
                ProbeOutcome::Gone("status 404 Not Found".to_string())
            }
        }
    }

    fn crawler_config() -> CrawlerConfig {
        CrawlerConfig {
            request_delay_ms: 0,
            max_concurrent: 4,
            ..CrawlerConfig::default()
        }
    }

    fn listing(url: &str, adopted: bool) -> Listing {
        let mut listing = Listing::new(Source::SecondeChance, url);
        listing.adopted = adopted;
        listing
    }

    const LIVE: &str = "https://www.secondechance.org/animal/live";
    const GONE: &str = "https://www.secondechance.org/animal/gone";
    const ADOPTED: &str = "https://www.secondechance.org/animal/adopted";

    #[tokio::test]
    async fn test_gone_listing_flips_once() {
        let reviser = LivenessReviser::new(FakeProbe::new(&[LIVE]), &crawler_config());
        let mut listings = vec![listing(LIVE, false), listing(GONE, false), listing(ADOPTED, true)];

        let report = reviser.revise(&mut listings).await;
        assert_eq!(report.checked, 2);
        assert_eq!(report.already_adopted, 1);
        assert_eq!(report.flipped, vec![GONE.to_string()]);
        assert_eq!(report.still_live(), 1);
        assert!(!listings[0].adopted);
        assert!(listings[1].adopted);
        assert!(listings[2].adopted);
        assert_eq!(reviser.probe.probed(), vec![GONE.to_string(), LIVE.to_string()]);

        let report = reviser.revise(&mut listings).await;
        assert_eq!(report.checked, 1);
        assert!(report.flipped.is_empty());
        assert_eq!(
            reviser.probe.probed(),
            vec![GONE.to_string(), LIVE.to_string(), LIVE.to_string()]
        );
    }

    #[tokio::test]
    async fn test_run_revise_rewrites_log_and_store() {
        let dir = TempDir::new().unwrap();
        let export = ExportLog::new(dir.path().join("seconde_chance.jsonl"));
        let mut store = ListingStore::open_memory().unwrap();
        for item in [listing(LIVE, false), listing(GONE, false)] {
            store.upsert(&item).unwrap();
            export.append(&item).unwrap();
        }

        let reviser = LivenessReviser::new(FakeProbe::new(&[LIVE]), &crawler_config());
        let report = run_revise(&reviser, &export, &store, Source::SecondeChance)
            .await
            .unwrap();

        assert_eq!(report.flipped, vec![GONE.to_string()]);
        let reloaded = export.load().unwrap();
        assert!(!reloaded[0].adopted);
        assert!(reloaded[1].adopted);
        assert!(store.find_by_url(GONE).unwrap().unwrap().adopted);
        assert!(!store.find_by_url(LIVE).unwrap().unwrap().adopted);
        assert_eq!(store.count_adopted(None).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_store_behind_log_is_caught_up() {
        let dir = TempDir::new().unwrap();
        let export = ExportLog::new(dir.path().join("seconde_chance.jsonl"));
        let mut store = ListingStore::open_memory().unwrap();
        store.upsert(&listing(GONE, false)).unwrap();
        store.upsert(&listing(LIVE, false)).unwrap();
        // An earlier pass flipped GONE in the log but failed to update the store.
        export.rewrite(&[listing(GONE, true), listing(LIVE, false)]).unwrap();

        let reviser = LivenessReviser::new(FakeProbe::new(&[LIVE]), &crawler_config());
        let report = run_revise(&reviser, &export, &store, Source::SecondeChance)
            .await
            .unwrap();

        assert!(report.flipped.is_empty());
        assert_eq!(report.already_adopted, 1);
        assert!(store.find_by_url(GONE).unwrap().unwrap().adopted);
        assert!(!store.find_by_url(LIVE).unwrap().unwrap().adopted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_holds_across_concurrent_requests() {
        let config = CrawlerConfig {
            request_delay_ms: 100,
            max_concurrent: 4,
            ..CrawlerConfig::default()
        };
        let reviser = LivenessReviser::new(FakeProbe::new(&[]), &config);
        let mut listings: Vec<Listing> = (0..6)
            .map(|i| listing(&format!("https://www.secondechance.org/animal/{i}"), false))
            .collect();

        let start = Instant::now();
        let report = reviser.revise(&mut listings).await;
        assert_eq!(report.flipped.len(), 6);
        assert!(start.elapsed() >= Duration::from_millis(500));

        let mut started = reviser.probe.started.lock().unwrap().clone();
        started.sort();
        for pair in started.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(100));
        }
    }

    #[tokio::test]
    async fn test_empty_log_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let export = ExportLog::new(dir.path().join("spa.jsonl"));
        let store = ListingStore::open_memory().unwrap();
        let reviser = LivenessReviser::new(FakeProbe::new(&[]), &crawler_config());

        let report = run_revise(&reviser, &export, &store, Source::Spa).await.unwrap();
        assert_eq!(report.checked, 0);
        assert!(!export.path().exists());
    }
}
