// src/scanner/engine.rs
// =============================================================================
// The scan orchestrator and its worker pool.
//
// How a scan phase runs:
// 1. Reset stats/results, size both channels to the word count
// 2. Spawn `threads` workers and one collector
// 3. Push every word into the job queue, then close it
// 4. Workers pull words until the queue is empty:
//      rate token -> probe (with retries) -> classify -> report
// 5. Once every worker has exited, the last result sender is gone, so the
//    collector drains what is left and stops
// 6. Stamp the end time and hand back the results
//
// Recursive mode runs whole phases one after another, descending into
// every 301/302 hit. The base URL of a branch travels as an argument, the
// shared config is never rewritten.
//
// Rust concepts:
// - mpsc channels: message passing between tasks
// - JoinSet: wait for a dynamic set of spawned tasks
// - BoxFuture: an async fn that calls itself needs a boxed future
// =============================================================================

use std::sync::Arc;
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::{mpsc, Mutex, OnceCell};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::client::{probe_with_retry, ProbeClient, Prober};
use super::config::ScanConfig;
use super::error::ScanError;
use super::filter::{random_path, Calibration, Classifier, CALIBRATION_PATH_LEN};
use super::rate::RateLimiter;
use super::result::ProbeResult;
use super::stats::ScanStats;
use crate::output;

/// Results and counters of the current phase, guarded by one lock.
#[derive(Debug, Default)]
struct ScanState {
    results: Vec<ProbeResult>,
    stats: ScanStats,
}

pub struct Scanner {
    config: Arc<ScanConfig>,
    prober: Arc<dyn Prober>,
    limiter: Arc<RateLimiter>,
    classifier: Arc<Classifier>,
    state: Arc<Mutex<ScanState>>,
    calibrated: OnceCell<()>,
}

/// What each worker task carries. Cheap to clone: everything is an Arc.
#[derive(Clone)]
struct Worker {
    base_url: Arc<str>,
    max_retries: u32,
    prober: Arc<dyn Prober>,
    limiter: Arc<RateLimiter>,
    classifier: Arc<Classifier>,
    state: Arc<Mutex<ScanState>>,
}

impl Scanner {
    /// Builds a scanner that probes over HTTP.
    ///
    /// Must run inside a tokio runtime (the rate limiter spawns a task).
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        config.validate()?;
        let client = ProbeClient::new(&config)?;
        Ok(Self::with_prober(config, Arc::new(client)))
    }

    /// Builds a scanner around any prober.
    pub fn with_prober(config: ScanConfig, prober: Arc<dyn Prober>) -> Self {
        let limiter = RateLimiter::new(config.rate);
        let classifier = Classifier::new(config.match_codes.clone(), config.smart_filter);

        Self {
            config: Arc::new(config),
            prober,
            limiter: Arc::new(limiter),
            classifier: Arc::new(classifier),
            state: Arc::new(Mutex::new(ScanState::default())),
            calibrated: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Snapshot of the most recent phase's counters.
    pub async fn stats(&self) -> ScanStats {
        self.state.lock().await.stats.clone()
    }

    /// Scans `words` against the configured base URL.
    pub async fn scan(&self, words: &[String]) -> Vec<ProbeResult> {
        let base_url = self.config.base_url.clone();
        self.scan_at(&base_url, words.to_vec()).await
    }

    /// Scans every word bare and once per extension (`word.ext`).
    pub async fn scan_with_extensions(
        &self,
        words: &[String],
        extensions: &[String],
    ) -> Vec<ProbeResult> {
        let expanded = expand_words(words, extensions);
        let base_url = self.config.base_url.clone();
        self.scan_at(&base_url, expanded).await
    }

    /// Depth-first rescan of every 301/302 hit, down to `max_depth`.
    ///
    /// Branches run strictly one after another. A frame with
    /// `depth > max_depth` sends no request and returns nothing.
    ///
    /// With `--smart-filter`, every branch is judged against the soft-404
    /// fingerprint taken at the configured base URL. Subdirectories are not
    /// calibrated on their own.
    pub fn scan_recursive<'a>(
        &'a self,
        base_url: &'a str,
        words: &'a [String],
        depth: usize,
        max_depth: usize,
    ) -> BoxFuture<'a, Vec<ProbeResult>> {
        async move {
            if depth > max_depth {
                return Vec::new();
            }

            info!(depth, base_url, "recursive scan");
            let hits = self.scan_at(base_url, words.to_vec()).await;

            let mut all = hits.clone();
            for hit in hits.iter().filter(|r| r.is_redirect()) {
                let sub = self.scan_recursive(&hit.url, words, depth + 1, max_depth).await;
                all.extend(sub);
            }
            all
        }
        .boxed()
    }

    /// Captures the soft-404 fingerprint, if smart filtering is enabled.
    ///
    /// Sends at most one request per Scanner, however often it is called.
    pub async fn calibrate(&self) -> Option<Calibration> {
        self.calibrated
            .get_or_init(|| async {
                if !self.classifier.wants_calibration() {
                    return;
                }

                let path = random_path(CALIBRATION_PATH_LEN);
                let url = format!("{}/{}", self.config.base_url, path);
                match self.prober.probe(&url).await {
                    Ok(response) => {
                        info!(
                            status = response.status,
                            size = response.size(),
                            "captured soft-404 fingerprint"
                        );
                        self.classifier.calibrate(Calibration::capture(response, &path));
                    }
                    Err(err) => {
                        warn!(url, error = %err, "calibration probe failed, soft-404 filter disabled");
                    }
                }
            })
            .await;

        self.classifier.calibration().cloned()
    }

    // One full phase: fill the queue, run the pool, wait for the barrier.
    async fn scan_at(&self, base_url: &str, words: Vec<String>) -> Vec<ProbeResult> {
        self.calibrate().await;

        let total = words.len();
        {
            let mut state = self.state.lock().await;
            state.results = Vec::with_capacity(total);
            state.stats = ScanStats {
                total,
                ..ScanStats::started_now()
            };
        }
        info!(base_url, words = total, threads = self.config.threads, "scan started");

        // Pre-sized so neither side ever waits on the other
        let capacity = total.max(1);
        let (job_tx, job_rx) = mpsc::channel::<String>(capacity);
        let (result_tx, result_rx) = mpsc::channel::<ProbeResult>(capacity);
        let jobs = Arc::new(Mutex::new(job_rx));

        let collector = tokio::spawn(collect(result_rx, Arc::clone(&self.state)));

        let worker = Worker {
            base_url: Arc::from(base_url),
            max_retries: self.config.max_retries,
            prober: Arc::clone(&self.prober),
            limiter: Arc::clone(&self.limiter),
            classifier: Arc::clone(&self.classifier),
            state: Arc::clone(&self.state),
        };

        let mut workers = JoinSet::new();
        for _ in 0..self.config.threads {
            workers.spawn(worker.clone().run(Arc::clone(&jobs), result_tx.clone()));
        }
        drop(result_tx);

        for word in words {
            if job_tx.send(word).await.is_err() {
                warn!("job queue closed before all words were queued");
                break;
            }
        }
        // Closing the queue lets idle workers exit
        drop(job_tx);

        while let Some(joined) = workers.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "worker task ended abnormally");
            }
        }

        if let Err(err) = collector.await {
            warn!(error = %err, "result collector ended abnormally");
        }

        let mut state = self.state.lock().await;
        state.stats.finished_at = Some(Instant::now());
        info!(
            base_url,
            hits = state.stats.success,
            failed = state.stats.failed,
            "scan finished"
        );
        state.results.clone()
    }
}

impl Worker {
    async fn run(self, jobs: Arc<Mutex<mpsc::Receiver<String>>>, results: mpsc::Sender<ProbeResult>) {
        loop {
            // The guard is released at the end of this statement
            let next = jobs.lock().await.recv().await;
            let Some(word) = next else {
                break;
            };

            match self.process(&word).await {
                Some(result) => {
                    if results.send(result).await.is_ok() {
                        self.record(true).await;
                    } else {
                        self.record(false).await;
                    }
                }
                None => self.record(false).await,
            }
        }
    }

    // Probe one word; Some only for a genuine hit.
    async fn process(&self, word: &str) -> Option<ProbeResult> {
        self.limiter.acquire().await;

        let url = format!("{}/{}", self.base_url, word);
        let start = Instant::now();
        let outcome = if self.max_retries > 0 {
            probe_with_retry(self.prober.as_ref(), &url, self.max_retries).await
        } else {
            self.prober.probe(&url).await
        };
        let elapsed = start.elapsed();

        let response = match outcome {
            Ok(response) => response,
            Err(err) => {
                debug!(url, error = %err, "probe failed");
                return None;
            }
        };

        if !self.classifier.is_genuine(&response, word) {
            debug!(url, status = response.status, "matches soft-404 fingerprint");
            return None;
        }
        if !self.classifier.is_hit(response.status) {
            return None;
        }

        Some(ProbeResult {
            size: response.size(),
            url,
            status_code: response.status,
            elapsed,
            location: response.location,
        })
    }

    async fn record(&self, success: bool) {
        let mut state = self.state.lock().await;
        if success {
            state.stats.success += 1;
        } else {
            state.stats.failed += 1;
        }
    }
}

// Single consumer of the result stream; appends in completion order.
async fn collect(mut results: mpsc::Receiver<ProbeResult>, state: Arc<Mutex<ScanState>>) {
    while let Some(result) = results.recv().await {
        output::print_hit(&result);
        state.lock().await.results.push(result);
    }
}

/// Every word bare, followed by one `word.ext` per extension.
pub fn expand_words(words: &[String], extensions: &[String]) -> Vec<String> {
    let mut expanded = Vec::with_capacity(words.len() * (extensions.len() + 1));
    for word in words {
        expanded.push(word.clone());
        for ext in extensions {
            expanded.push(format!("{}.{}", word, ext));
        }
    }
    expanded
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why wrap the job receiver in a Mutex?
//    - tokio's mpsc has exactly one receiver
//    - Many workers need to pull from it, so they take turns through a lock
//    - Whoever holds the lock gets the next word; no word is handed out twice
//
// 2. How does the collector know the scan is over?
//    - recv() returns None once every Sender has been dropped
//    - Each worker owns a Sender clone and drops it when it exits
//    - The first Sender is dropped right after spawning, so the last worker
//      leaving is what ends the collector
//
// 3. Why does scan_recursive return BoxFuture instead of being `async fn`?
//    - An async fn that awaits itself would have an infinitely sized future
//    - Boxing puts each level on the heap, giving it a fixed size
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::client::ProbeResponse;
    use crate::scanner::error::ProbeError;
    use async_trait::async_trait;
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    /// Canned responses per URL; anything unknown is a 404.
    #[derive(Default)]
    struct StubProber {
        statuses: HashMap<String, u16>,
        bodies: HashMap<String, String>,
        errors: BTreeSet<String>,
        fallback_status: Option<u16>,
        fallback_body: String,
        calls: StdMutex<Vec<String>>,
    }

    impl StubProber {
        fn with(statuses: &[(&str, u16)]) -> Self {
            Self {
                statuses: statuses.iter().map(|(u, s)| (u.to_string(), *s)).collect(),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Prober for StubProber {
        async fn probe(&self, url: &str) -> Result<ProbeResponse, ProbeError> {
            self.calls.lock().unwrap().push(url.to_string());

            if self.errors.contains(url) {
                return Err(ProbeError::Request {
                    url: url.to_string(),
                    reason: "connection refused".to_string(),
                });
            }

            let status = self
                .statuses
                .get(url)
                .copied()
                .or(self.fallback_status)
                .unwrap_or(404);
            let body = self.bodies.get(url).unwrap_or(&self.fallback_body);

            Ok(ProbeResponse {
                status,
                content_length: Some(body.len() as u64),
                location: None,
                body: body.as_bytes().to_vec(),
            })
        }
    }

    fn config(match_codes: &[u16]) -> ScanConfig {
        let mut config = ScanConfig::new("http://t/");
        config.threads = 4;
        config.match_codes = match_codes.iter().copied().collect();
        config
    }

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    #[tokio::test]
    async fn test_single_hit_scenario() {
        let stub = Arc::new(StubProber::with(&[("http://t/a", 200), ("http://t/b", 404)]));
        let scanner = Scanner::with_prober(config(&[200]), stub.clone());

        let results = scanner.scan(&words(&["a", "b"])).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "http://t/a");
        assert_eq!(results[0].status_code, 200);

        let stats = scanner.stats().await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.success, 1);
        assert_eq!(stats.failed, 1);
        assert!(stats.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_results_plus_failures_equals_words() {
        let mut stub = StubProber::with(&[
            ("http://t/w0", 200),
            ("http://t/w1", 403),
            ("http://t/w2", 500),
            ("http://t/w3", 301),
        ]);
        stub.errors.insert("http://t/w4".to_string());
        let stub = Arc::new(stub);

        let list: Vec<String> = (0..40).map(|i| format!("w{i}")).collect();
        let scanner = Scanner::with_prober(config(&[200, 301, 403]), stub.clone());

        let results = scanner.scan(&list).await;
        let stats = scanner.stats().await;

        assert_eq!(results.len() + stats.failed, list.len());
        assert_eq!(stats.total, list.len());
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| [200, 301, 403].contains(&r.status_code)));
    }

    #[tokio::test]
    async fn test_every_word_probed_exactly_once() {
        let stub = Arc::new(StubProber::default());
        let mut cfg = config(&[200]);
        cfg.threads = 16;
        let scanner = Scanner::with_prober(cfg, stub.clone());

        let list: Vec<String> = (0..500).map(|i| format!("p{i}")).collect();
        scanner.scan(&list).await;

        let mut calls = stub.calls();
        calls.sort();
        let mut expected: Vec<String> = list.iter().map(|w| format!("http://t/{w}")).collect();
        expected.sort();
        assert_eq!(calls, expected);
    }

    #[tokio::test]
    async fn test_more_threads_than_words() {
        let stub = Arc::new(StubProber::with(&[("http://t/only", 200)]));
        let mut cfg = config(&[200]);
        cfg.threads = 64;
        let scanner = Scanner::with_prober(cfg, stub.clone());

        let results = scanner.scan(&words(&["only"])).await;

        assert_eq!(results.len(), 1);
        assert_eq!(stub.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_word_list() {
        let stub = Arc::new(StubProber::default());
        let scanner = Scanner::with_prober(config(&[200]), stub.clone());

        assert!(scanner.scan(&[]).await.is_empty());
        assert_eq!(scanner.stats().await.total, 0);
        assert!(stub.calls().is_empty());
    }

    #[test]
    fn test_expand_words() {
        let expanded = expand_words(&words(&["admin", "login"]), &words(&["php", "bak"]));
        assert_eq!(
            expanded,
            words(&["admin", "admin.php", "admin.bak", "login", "login.php", "login.bak"])
        );
        assert_eq!(expand_words(&words(&["a"]), &[]), words(&["a"]));
    }

    #[tokio::test]
    async fn test_scan_with_extensions_probes_each_variant_once() {
        let stub = Arc::new(StubProber::with(&[("http://t/admin.php", 200)]));
        let scanner = Scanner::with_prober(config(&[200]), stub.clone());

        let results = scanner
            .scan_with_extensions(&words(&["admin"]), &words(&["php", "bak"]))
            .await;

        let mut calls = stub.calls();
        calls.sort();
        assert_eq!(
            calls,
            words(&["http://t/admin", "http://t/admin.bak", "http://t/admin.php"])
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "http://t/admin.php");
        assert_eq!(scanner.stats().await.total, 3);
    }

    #[tokio::test]
    async fn test_recursion_past_max_depth_sends_nothing() {
        let stub = Arc::new(StubProber::with(&[("http://t/a", 200)]));
        let scanner = Scanner::with_prober(config(&[200]), stub.clone());
        let list = words(&["a"]);

        let results = scanner.scan_recursive("http://t", &list, 4, 3).await;

        assert!(results.is_empty());
        assert!(stub.calls().is_empty());
    }

    #[tokio::test]
    async fn test_recursion_descends_into_redirect() {
        let stub = Arc::new(StubProber::with(&[("http://t/a", 301), ("http://t/a/b", 200)]));
        let scanner = Scanner::with_prober(config(&[200, 301]), stub.clone());
        let list = words(&["a", "b"]);

        let results = scanner.scan_recursive("http://t", &list, 0, 3).await;

        let mut calls = stub.calls();
        calls.sort();
        assert_eq!(
            calls,
            words(&["http://t/a", "http://t/a/a", "http://t/a/b", "http://t/b"])
        );

        let urls: Vec<&str> = results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["http://t/a", "http://t/a/b"]);
        // Config is untouched by the descent
        assert_eq!(scanner.config().base_url, "http://t");
    }

    #[tokio::test]
    async fn test_recursion_stops_at_max_depth() {
        let stub = Arc::new(StubProber {
            fallback_status: Some(302),
            ..Default::default()
        });
        let scanner = Scanner::with_prober(config(&[302]), stub.clone());
        let list = words(&["x"]);

        let results = scanner.scan_recursive("http://t", &list, 0, 1).await;

        assert_eq!(stub.calls(), words(&["http://t/x", "http://t/x/x"]));
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_smart_filter_drops_soft_404() {
        let mut stub = StubProber {
            fallback_status: Some(200),
            fallback_body: "Oops, nothing here".to_string(),
            ..Default::default()
        };
        stub.bodies.insert("http://t/real".to_string(), "secret panel".to_string());
        let stub = Arc::new(stub);

        let mut cfg = config(&[200]);
        cfg.smart_filter = true;
        let scanner = Scanner::with_prober(cfg, stub.clone());

        let results = scanner.scan(&words(&["real", "fake1", "fake2"])).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "http://t/real");
        assert_eq!(scanner.stats().await.failed, 2);
        // Three words plus one calibration probe
        assert_eq!(stub.calls().len(), 4);

        // A second phase does not calibrate again
        scanner.scan(&words(&["real"])).await;
        assert_eq!(stub.calls().len(), 5);
    }

    #[tokio::test]
    async fn test_no_calibration_request_without_smart_filter() {
        let stub = Arc::new(StubProber::default());
        let scanner = Scanner::with_prober(config(&[200]), stub.clone());

        assert!(scanner.calibrate().await.is_none());
        assert!(stub.calls().is_empty());
    }

    #[tokio::test]
    async fn test_soft_404_echoing_the_word_dropped() {
        let stub = Arc::new(EchoProber);
        let mut cfg = config(&[200]);
        cfg.smart_filter = true;
        let scanner = Scanner::with_prober(cfg, stub);

        let results = scanner.scan(&words(&["admin", "backup", "real"])).await;

        let urls: Vec<&str> = results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["http://t/real"]);
    }

    /// Answers 200 everywhere, naming the missing path, except for /real.
    struct EchoProber;

    #[async_trait]
    impl Prober for EchoProber {
        async fn probe(&self, url: &str) -> Result<ProbeResponse, ProbeError> {
            let path = url.trim_start_matches("http://t");
            let body = if path == "/real" {
                "real content".to_string()
            } else {
                format!("<h1>{path} not found</h1>")
            };
            Ok(ProbeResponse {
                status: 200,
                content_length: Some(body.len() as u64),
                location: None,
                body: body.into_bytes(),
            })
        }
    }

    #[tokio::test]
    async fn test_large_slow_download_is_reported() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 2048];
                    let _ = stream.read(&mut buf).await;
                    let head = b"HTTP/1.1 200 OK\r\nContent-Length: 100000000\r\n\r\nPK";
                    let _ = stream.write_all(head).await;
                    tokio::time::sleep(Duration::from_secs(30)).await;
                });
            }
        });

        let mut cfg = ScanConfig::new(&format!("http://{addr}"));
        cfg.timeout = Duration::from_secs(1);
        cfg.match_codes = BTreeSet::from([200]);
        let scanner = Scanner::new(cfg).unwrap();

        let results = scanner.scan(&words(&["backup.zip"])).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].size, 100_000_000);
        let stats = scanner.stats().await;
        assert_eq!(stats.success, 1);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_throttles_scan() {
        let stub = Arc::new(StubProber::default());
        let mut cfg = config(&[200]);
        cfg.rate = 5;
        cfg.threads = 8;
        let scanner = Scanner::with_prober(cfg, stub.clone());

        let list: Vec<String> = (0..15).map(|i| format!("r{i}")).collect();
        let start = tokio::time::Instant::now();
        scanner.scan(&list).await;

        // 5 from the full bucket, then 10 more at 5/s
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(stub.calls().len(), 15);
    }
}
