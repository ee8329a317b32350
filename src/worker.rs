use std::time::Duration;

use log::{debug, info, warn};
use rand::Rng;
use tokio::{select, time::sleep};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, MonitorOptions, Target};
use crate::fetch::PageFetcher;
use crate::notify::{self, Notify};
use crate::state::StateStore;
use crate::status;

/// Continuously monitors the configured targets and notifies on transitions.
///
/// This function runs until `token` is cancelled, classifying every target's
/// status page once per cycle and dispatching a notification to all channels
/// whenever a target's status differs from the last one recorded for it.
///
/// # Behavior
///
/// - Initializes the state store with every target unobserved, so the first
///   classification of a target only establishes its baseline
/// - Fetches, classifies and compares each target in order, pausing between
///   targets (with bounded random jitter, if configured) and between cycles
/// - Logs and skips a target on fetch, challenge-page or classification
///   failures without touching its recorded status
/// - Checks `token` between targets and at every pause, so shutdown latency
///   is bounded by the configured delays and an in-flight target check is
///   never aborted midway
/// - Owns `fetcher` exclusively and drops it on every exit path
pub async fn run<F, C>(config: &Config, mut fetcher: F, channels: &[C], token: CancellationToken)
where
    F: PageFetcher,
    C: Notify,
{
    info!("Starting status monitoring...");
    info!(
        "Check delay: {} seconds (jitter up to {} seconds)",
        config.monitor.check_delay_secs, config.monitor.check_jitter_secs
    );
    info!("Cycle delay: {} seconds", config.monitor.loop_delay_secs);
    if channels.is_empty() {
        warn!("No notification channels configured, transitions will only be logged");
    } else {
        let names: Vec<&str> = channels.iter().map(Notify::name).collect();
        info!("Notification channels: {}", names.join(", "));
    }
    info!("Monitoring {} targets", config.targets.len());

    let mut store = StateStore::new(&config.targets);

    // Main monitoring loop
    'monitor: loop {
        // Check if we should shutdown before starting a new cycle
        if token.is_cancelled() {
            info!("Shutdown requested, stopping monitor");
            break;
        }

        info!("Starting check cycle");

        for target in &config.targets {
            check_target(&mut fetcher, target, &mut store, channels).await;

            if pause(check_delay(&config.monitor), &token).await {
                break 'monitor;
            }
        }

        info!(
            "Cycle complete, next one in {} seconds",
            config.monitor.loop_delay_secs
        );
        if pause(Duration::from_secs(config.monitor.loop_delay_secs), &token).await {
            break;
        }
    }

    // Cleanup and shutdown
    drop(fetcher);
    info!("Fetch client released");
    info!("Status monitoring stopped gracefully");
}

/// Checks a single target. Every failure is local: it is logged, the
/// target's recorded status is left as it was, and the caller moves on.
async fn check_target<F, C>(fetcher: &mut F, target: &Target, store: &mut StateStore, channels: &[C])
where
    F: PageFetcher,
    C: Notify,
{
    let page = match fetcher.fetch(&target.url).await {
        Ok(page) => page,
        Err(e) => {
            warn!("{}: skipped, {e}", target.name);
            return;
        }
    };
    debug!("{}: fetched page titled {:?}", target.name, page.title_hint);

    let content = page.content.to_lowercase();
    let new_status = match status::classify(&target.mode, &content) {
        Ok(new_status) => new_status,
        Err(e) => {
            warn!("{}: skipped, classification failed: {e}", target.name);
            return;
        }
    };
    info!("{}: {new_status}", target.name);

    if let Some(mut change) = store.observe(target, new_status) {
        warn!(
            "{}: status changed: {} -> {}",
            change.target, change.previous, change.current
        );
        if !page.title_hint.is_empty() {
            change.context = Some(format!("Page title: {}", page.title_hint));
        }
        let delivered = notify::dispatch(&change, channels).await;
        if !channels.is_empty() {
            info!(
                "{}: notified {delivered}/{} channels",
                change.target,
                channels.len()
            );
        }
    }
}

fn check_delay(options: &MonitorOptions) -> Duration {
    let base = options.check_delay_secs;
    let secs = if options.check_jitter_secs == 0 {
        base
    } else {
        rand::rng().random_range(base..=base + options.check_jitter_secs)
    };
    Duration::from_secs(secs)
}

/// Sleeps for `delay` unless cancellation arrives first. Returns `true` when
/// the monitor should stop.
async fn pause(delay: Duration, token: &CancellationToken) -> bool {
    if token.is_cancelled() {
        info!("Shutdown requested, stopping monitor");
        return true;
    }

    select! {
        () = sleep(delay) => false,
        () = token.cancelled() => {
            info!("Shutdown requested during pause");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckMode;
    use crate::fetch::{FetchError, Page};
    use crate::notify::{Channel, SendError};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_config(targets: Vec<Target>) -> Config {
        let toml_targets: String = targets
            .iter()
            .map(|t| {
                format!(
                    "[[targets]]\nname = \"{}\"\nurl = \"{}\"\nmode = \"aggregated\"\n",
                    t.name, t.url
                )
            })
            .collect();
        let content = format!(
            "[monitor]\ncheck_delay_secs = 0\nloop_delay_secs = 0\n\n{toml_targets}"
        );
        toml::from_str(&content).expect("test config must parse")
    }

    fn target(name: &str, url: &str) -> Target {
        Target {
            name: name.to_string(),
            url: url.to_string(),
            mode: CheckMode::Aggregated,
        }
    }

    /// Fetcher that counts calls, cancels the token during its first fetch
    /// and counts how many times it is dropped.
    struct CancellingFetcher {
        calls: Arc<AtomicUsize>,
        drops: Arc<AtomicUsize>,
        token: CancellationToken,
    }

    impl PageFetcher for CancellingFetcher {
        async fn fetch(&mut self, _url: &str) -> Result<Page, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.token.cancel();
            Ok(Page {
                content: "reports indicate no current problems".to_string(),
                title_hint: String::new(),
            })
        }
    }

    impl Drop for CancellingFetcher {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn cancellation_finishes_the_inflight_target_and_releases_the_fetcher() {
        let config = test_config(vec![
            target("First", "https://example.com/first"),
            target("Second", "https://example.com/second"),
        ]);
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let drops = Arc::new(AtomicUsize::new(0));
        let fetcher = CancellingFetcher {
            calls: Arc::clone(&calls),
            drops: Arc::clone(&drops),
            token: token.clone(),
        };

        run(&config, fetcher, &Vec::<Channel>::new(), token).await;

        // The first target's check completed, the second was never started,
        // and the fetch client was dropped exactly once.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    /// Fetcher whose responses are scripted per call.
    struct ScriptedFetcher {
        responses: Vec<Result<Page, FetchError>>,
        token: CancellationToken,
    }

    impl PageFetcher for ScriptedFetcher {
        async fn fetch(&mut self, _url: &str) -> Result<Page, FetchError> {
            if self.responses.is_empty() {
                self.token.cancel();
                return Err(FetchError::Challenge("just a moment...".to_string()));
            }
            let response = self.responses.remove(0);
            if self.responses.is_empty() {
                self.token.cancel();
            }
            response
        }
    }

    struct CountingChannel {
        calls: AtomicUsize,
    }

    impl Notify for CountingChannel {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn send(&self, _change: &crate::state::StatusChange) -> Result<(), SendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn per_target_failures_do_not_stop_the_cycle() {
        // One target, three cycles: baseline, challenge-page skip, then a
        // genuine transition. Exactly one notification goes out.
        let config = test_config(vec![target("Only", "https://example.com/only")]);
        let token = CancellationToken::new();
        let fetcher = ScriptedFetcher {
            responses: vec![
                Ok(Page {
                    content: "reports indicate no current problems".to_string(),
                    title_hint: String::new(),
                }),
                Err(FetchError::Challenge("Just a moment...".to_string())),
                Ok(Page {
                    content: "reports indicate problems".to_string(),
                    title_hint: String::new(),
                }),
            ],
            token: token.clone(),
        };
        let channels = vec![CountingChannel {
            calls: AtomicUsize::new(0),
        }];

        run(&config, fetcher, &channels, token).await;

        assert_eq!(channels[0].calls.load(Ordering::SeqCst), 1);
    }
}
