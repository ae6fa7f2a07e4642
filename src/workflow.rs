//! Search and download workflow
//!
//! [`SearchWorkflow`] is what an embedding UI or script drives: it prepares
//! queries (tokenize, dedup, drop already-searched terms, chunk to the
//! portal's query-length budget), runs the chunked search and the per-product
//! download as registered jobs (`"search"` and `"download"`), reports
//! [`Progress`] through a caller-supplied callback, and keeps session-scoped
//! memory of what has already been searched and downloaded.
//!
//! Cancellation flows through the job registry: `cancel_search()` /
//! `cancel_download()` can be called from any thread while the corresponding
//! operation runs, and the reports carry whatever partial results landed.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::chunking::{chunk_by_char_budget, make_term_list};
use crate::client::StorefrontApi;
use crate::config::SearchConfig;
use crate::error::Result;
use crate::jobs::{ExecutionMode, Job, JobRegistry, lock, worker_fn};
use crate::models::{ProductHit, ProductRecord, SearchPage};
use crate::types::{JobId, JobStatus, Progress};

/// Job id under which searches register
pub const SEARCH_JOB_ID: &str = "search";
/// Job id under which downloads register
pub const DOWNLOAD_JOB_ID: &str = "download";

/// Progress callback supplied by the embedding UI
///
/// Invoked from worker tasks; implementations must marshal onto their UI
/// thread themselves.
pub type ProgressFn = Arc<dyn Fn(Progress) + Send + Sync>;

/// Result of one [`SearchWorkflow::search`] run
#[derive(Clone, Debug)]
pub struct SearchReport {
    /// Final status of the search job
    pub status: JobStatus,

    /// The merged page each chunk produced, in completion order
    pub pages: Vec<SearchPage>,

    /// All hits across pages, deduplicated by product number
    pub hits: Vec<ProductHit>,

    /// How many terms were actually submitted (after dedup/already-searched
    /// filtering)
    pub terms_submitted: usize,

    /// Sum of the portal's advertised hit totals across chunks
    pub total_hits: u64,
}

/// Result of one [`SearchWorkflow::download`] run
#[derive(Clone, Debug)]
pub struct DownloadReport {
    /// Final status of the download job
    pub status: JobStatus,

    /// Successfully downloaded records, in completion order
    pub records: Vec<ProductRecord>,

    /// Number of per-product failures captured on the job
    pub failures: usize,
}

/// Orchestrates chunked searches and parallel record downloads
pub struct SearchWorkflow {
    client: Arc<dyn StorefrontApi>,
    registry: Arc<JobRegistry>,
    config: SearchConfig,
    searched_terms: Mutex<HashSet<String>>,
    downloaded: Mutex<HashSet<String>>,
}

impl SearchWorkflow {
    /// Build a workflow with its own registry
    pub fn new(client: Arc<dyn StorefrontApi>, config: SearchConfig) -> Self {
        Self::with_registry(client, config, Arc::new(JobRegistry::new()))
    }

    /// Build a workflow sharing an existing registry
    pub fn with_registry(
        client: Arc<dyn StorefrontApi>,
        config: SearchConfig,
        registry: Arc<JobRegistry>,
    ) -> Self {
        Self {
            client,
            registry,
            config,
            searched_terms: Mutex::new(HashSet::new()),
            downloaded: Mutex::new(HashSet::new()),
        }
    }

    /// The registry the workflow's jobs register in
    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Tokenize, dedup, drop already-searched terms, and chunk a raw query
    pub fn prepare_query(&self, raw: &str) -> Vec<Vec<String>> {
        let terms = make_term_list(raw);
        let total = terms.len();
        let fresh: Vec<String> = {
            let searched = lock(&self.searched_terms);
            terms
                .into_iter()
                .filter(|term| !searched.contains(term))
                .collect()
        };
        if fresh.len() < total {
            tracing::info!(
                skipped = total - fresh.len(),
                remaining = fresh.len(),
                "dropped terms already searched this session"
            );
        }
        chunk_by_char_budget(&fresh, self.config.query_char_budget)
    }

    /// Run a chunked search for a raw query string
    ///
    /// Registers (replacing any previous) the `"search"` job and drives it to
    /// a terminal state. All prepared terms are remembered as searched
    /// afterwards, even when the run was cancelled part-way.
    pub async fn search(
        &self,
        raw_query: &str,
        progress: Option<ProgressFn>,
    ) -> Result<SearchReport> {
        let chunks = self.prepare_query(raw_query);
        if chunks.is_empty() {
            if let Some(progress) = &progress {
                progress(Progress {
                    processed: 0,
                    total: 0,
                    found: 0,
                    message: "no new search terms".to_string(),
                });
            }
            return Ok(SearchReport {
                status: JobStatus::Finished,
                pages: Vec::new(),
                hits: Vec::new(),
                terms_submitted: 0,
                total_hits: 0,
            });
        }

        let total_terms: usize = chunks.iter().map(Vec::len).sum();
        let processed = Arc::new(AtomicUsize::new(0));
        let found = Arc::new(AtomicUsize::new(0));

        let worker = {
            let client = self.client.clone();
            let processed = processed.clone();
            let found = found.clone();
            let progress = progress.clone();
            worker_fn(move |chunk: Vec<String>| {
                let client = client.clone();
                let processed = processed.clone();
                let found = found.clone();
                let progress = progress.clone();
                async move {
                    let query = chunk.join(" ");
                    let page = client.search(&query).await?;
                    let done = processed.fetch_add(chunk.len(), Ordering::SeqCst) + chunk.len();
                    let found_so_far =
                        found.fetch_add(page.hits.len(), Ordering::SeqCst) + page.hits.len();
                    if let Some(progress) = &progress {
                        progress(Progress {
                            processed: done,
                            total: total_terms,
                            found: found_so_far,
                            message: format!("searched {done}/{total_terms} terms"),
                        });
                    }
                    Ok(page)
                }
            })
        };

        let job = self.registry.register(
            Job::new(SEARCH_JOB_ID, worker, chunks.clone())
                .with_mode(ExecutionMode::Spawned)
                .with_max_concurrency(self.config.search_concurrency)
                .with_callback(|page: &SearchPage| {
                    tracing::debug!(query = %page.query, hits = page.hits.len(), "chunk searched");
                }),
        );

        let outcome = job.start().await?;

        // Terms count as searched once submitted, cancelled run or not, so a
        // re-run of the same query only touches what was never attempted.
        {
            let mut searched = lock(&self.searched_terms);
            for chunk in &chunks {
                for term in chunk {
                    searched.insert(term.clone());
                }
            }
        }

        let status = job.status();
        let pages = outcome.into_results();
        let mut seen = HashSet::new();
        let mut hits = Vec::new();
        let mut total_hits = 0u64;
        for page in &pages {
            total_hits += page.total_hits;
            for hit in &page.hits {
                if seen.insert(hit.product_number.clone()) {
                    hits.push(hit.clone());
                }
            }
        }

        tracing::info!(
            terms = total_terms,
            hits = hits.len(),
            %status,
            "search run ended"
        );
        Ok(SearchReport {
            status,
            pages,
            hits,
            terms_submitted: total_terms,
            total_hits,
        })
    }

    /// Download the full record for each hit
    ///
    /// Registers (replacing any previous) the `"download"` job. Hits whose
    /// product was already downloaded this session are skipped. Successful
    /// records are remembered so a cancelled run resumes where it left off.
    pub async fn download(
        &self,
        hits: Vec<ProductHit>,
        progress: Option<ProgressFn>,
    ) -> Result<DownloadReport> {
        let fresh: Vec<ProductHit> = {
            let downloaded = lock(&self.downloaded);
            hits.into_iter()
                .filter(|hit| !downloaded.contains(&hit.product_number))
                .collect()
        };
        if fresh.is_empty() {
            return Ok(DownloadReport {
                status: JobStatus::Finished,
                records: Vec::new(),
                failures: 0,
            });
        }

        let total = fresh.len();
        let processed = Arc::new(AtomicUsize::new(0));

        let worker = {
            let client = self.client.clone();
            let processed = processed.clone();
            let progress = progress.clone();
            worker_fn(move |hit: ProductHit| {
                let client = client.clone();
                let processed = processed.clone();
                let progress = progress.clone();
                async move {
                    let record = client.product(&hit.product_number).await?;
                    let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(progress) = &progress {
                        progress(Progress {
                            processed: done,
                            total,
                            found: done,
                            message: format!("downloaded {done}/{total} products"),
                        });
                    }
                    Ok(record)
                }
            })
        };

        let job = self.registry.register(
            Job::new(DOWNLOAD_JOB_ID, worker, fresh)
                .with_mode(ExecutionMode::Spawned)
                .with_max_concurrency(self.config.download_concurrency),
        );

        let outcome = job.start().await?;
        let status = job.status();
        let records = outcome.into_results();

        {
            let mut downloaded = lock(&self.downloaded);
            for record in &records {
                downloaded.insert(record.product_number.clone());
            }
        }

        tracing::info!(
            downloaded = records.len(),
            failures = job.failure_count(),
            %status,
            "download run ended"
        );
        Ok(DownloadReport {
            status,
            records,
            failures: job.failure_count(),
        })
    }

    /// Cancel a running or pending search; false if there is none to cancel
    pub fn cancel_search(&self) -> bool {
        self.registry
            .cancel_job(&JobId::from(SEARCH_JOB_ID))
            .unwrap_or(false)
    }

    /// Cancel a running or pending download; false if there is none to cancel
    pub fn cancel_download(&self) -> bool {
        self.registry
            .cancel_job(&JobId::from(DOWNLOAD_JOB_ID))
            .unwrap_or(false)
    }

    /// Cancel every job in the workflow's registry
    pub fn cancel_all(&self) -> usize {
        self.registry.cancel_all()
    }

    /// Forget which terms were already searched this session
    pub fn reset_searched_terms(&self) {
        lock(&self.searched_terms).clear();
    }

    /// Forget which products were already downloaded this session
    pub fn reset_downloaded(&self) {
        lock(&self.downloaded).clear();
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::{Invoice, InvoiceList, OpenOrders};
    use async_trait::async_trait;
    use std::time::Duration;

    /// In-memory portal stub: one hit per search term, optional per-product
    /// failures, optional per-call delay
    struct StubStorefront {
        queries: Mutex<Vec<String>>,
        fetched: Mutex<Vec<String>>,
        fail_products: HashSet<String>,
        delay: Option<Duration>,
    }

    impl StubStorefront {
        fn new() -> Self {
            Self {
                queries: Mutex::new(Vec::new()),
                fetched: Mutex::new(Vec::new()),
                fail_products: HashSet::new(),
                delay: None,
            }
        }

        fn failing_on(products: &[&str]) -> Self {
            Self {
                fail_products: products.iter().map(|p| p.to_string()).collect(),
                ..Self::new()
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::new()
            }
        }

        fn queries(&self) -> Vec<String> {
            lock(&self.queries).clone()
        }

        fn fetched(&self) -> Vec<String> {
            lock(&self.fetched).clone()
        }

        fn hit(term: &str) -> ProductHit {
            ProductHit {
                product_number: term.to_string(),
                upc: None,
                brand: "Stub".into(),
                description: format!("product for {term}"),
                pack_size: None,
                image_available: false,
            }
        }
    }

    #[async_trait]
    impl StorefrontApi for StubStorefront {
        async fn search(&self, query: &str) -> crate::error::Result<SearchPage> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            lock(&self.queries).push(query.to_string());
            let hits: Vec<ProductHit> = query.split_whitespace().map(Self::hit).collect();
            Ok(SearchPage {
                query: query.to_string(),
                total_hits: hits.len() as u64,
                page_number: 0,
                page_size: 100,
                hits,
            })
        }

        async fn product(&self, product_number: &str) -> crate::error::Result<ProductRecord> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_products.contains(product_number) {
                return Err(Error::Other(format!("portal refused {product_number}")));
            }
            lock(&self.fetched).push(product_number.to_string());
            Ok(ProductRecord {
                product_number: product_number.to_string(),
                upc: None,
                brand: "Stub".into(),
                description: format!("record for {product_number}"),
                pack: None,
                size: None,
                department: None,
                category: None,
                organic: false,
                image_available: false,
                pricing: None,
                promotions: Vec::new(),
            })
        }

        async fn invoices(&self) -> crate::error::Result<InvoiceList> {
            Err(Error::Other("not used by these tests".into()))
        }

        async fn invoice(&self, _invoice_number: &str) -> crate::error::Result<Invoice> {
            Err(Error::Other("not used by these tests".into()))
        }

        async fn open_orders(&self) -> crate::error::Result<OpenOrders> {
            Err(Error::Other("not used by these tests".into()))
        }
    }

    fn small_chunk_config() -> SearchConfig {
        SearchConfig {
            query_char_budget: 10,
            search_concurrency: 2,
            download_concurrency: 4,
        }
    }

    #[tokio::test]
    async fn search_submits_every_term_across_chunks() {
        let stub = Arc::new(StubStorefront::new());
        let workflow = SearchWorkflow::new(stub.clone(), small_chunk_config());

        let report = workflow
            .search("alpha beta gamma delta", None)
            .await
            .expect("search");

        assert_eq!(report.status, JobStatus::Finished);
        assert_eq!(report.terms_submitted, 4);
        assert_eq!(report.hits.len(), 4, "one stub hit per term");

        let mut submitted: Vec<String> = stub
            .queries()
            .iter()
            .flat_map(|q| q.split_whitespace().map(str::to_string))
            .collect();
        submitted.sort();
        assert_eq!(submitted, vec!["alpha", "beta", "delta", "gamma"]);
        for query in stub.queries() {
            assert!(
                query.len() <= 10,
                "every submitted query must respect the character budget, got {query:?}"
            );
        }
    }

    #[tokio::test]
    async fn repeat_searches_skip_already_searched_terms() {
        let stub = Arc::new(StubStorefront::new());
        let workflow = SearchWorkflow::new(stub.clone(), small_chunk_config());

        workflow.search("alpha beta", None).await.expect("first");
        let first_calls = stub.queries().len();

        let report = workflow
            .search("alpha beta", None)
            .await
            .expect("second search");

        assert_eq!(report.terms_submitted, 0);
        assert_eq!(report.status, JobStatus::Finished);
        assert_eq!(
            stub.queries().len(),
            first_calls,
            "no portal traffic for a fully-repeated query"
        );

        // New terms mixed with old ones only submit the new ones.
        let report = workflow
            .search("alpha gamma", None)
            .await
            .expect("third search");
        assert_eq!(report.terms_submitted, 1);
    }

    #[tokio::test]
    async fn reset_searched_terms_allows_resubmission() {
        let stub = Arc::new(StubStorefront::new());
        let workflow = SearchWorkflow::new(stub.clone(), small_chunk_config());

        workflow.search("alpha", None).await.expect("first");
        workflow.reset_searched_terms();
        let report = workflow.search("alpha", None).await.expect("second");

        assert_eq!(report.terms_submitted, 1);
    }

    #[tokio::test]
    async fn progress_reaches_the_full_totals() {
        let stub = Arc::new(StubStorefront::new());
        let workflow = SearchWorkflow::new(stub, small_chunk_config());

        let last: Arc<Mutex<Option<Progress>>> = Arc::new(Mutex::new(None));
        let last_clone = last.clone();
        let progress: ProgressFn = Arc::new(move |p: Progress| {
            *lock(&last_clone) = Some(p);
        });

        workflow
            .search("alpha beta gamma", Some(progress))
            .await
            .expect("search");

        let final_progress = lock(&last).clone().expect("progress must be reported");
        assert_eq!(final_progress.processed, 3);
        assert_eq!(final_progress.total, 3);
        assert_eq!(final_progress.found, 3);
        assert!(final_progress.message.contains("3/3"));
    }

    #[tokio::test]
    async fn empty_query_reports_finished_without_a_job_run() {
        let stub = Arc::new(StubStorefront::new());
        let workflow = SearchWorkflow::new(stub.clone(), small_chunk_config());

        let messages: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let messages_clone = messages.clone();
        let progress: ProgressFn = Arc::new(move |p: Progress| {
            lock(&messages_clone).push(p.message);
        });

        let report = workflow.search("   ", Some(progress)).await.expect("search");

        assert_eq!(report.status, JobStatus::Finished);
        assert!(report.hits.is_empty());
        assert!(stub.queries().is_empty());
        assert_eq!(*lock(&messages), vec!["no new search terms".to_string()]);
    }

    #[tokio::test]
    async fn download_fetches_each_hit_and_remembers_them() {
        let stub = Arc::new(StubStorefront::new());
        let workflow = SearchWorkflow::new(stub.clone(), small_chunk_config());
        let hits = vec![StubStorefront::hit("10001"), StubStorefront::hit("10002")];

        let report = workflow.download(hits.clone(), None).await.expect("download");

        assert_eq!(report.status, JobStatus::Finished);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.failures, 0);

        // The same hits again are skipped entirely.
        let again = workflow.download(hits, None).await.expect("repeat download");
        assert_eq!(again.records.len(), 0);
        assert_eq!(
            stub.fetched().len(),
            2,
            "already-downloaded products must not be fetched again"
        );
    }

    #[tokio::test]
    async fn download_failure_fails_the_job_but_keeps_successes() {
        let stub = Arc::new(StubStorefront::failing_on(&["bad-1"]));
        let workflow = SearchWorkflow::new(stub, small_chunk_config());
        let hits = vec![
            StubStorefront::hit("ok-1"),
            StubStorefront::hit("bad-1"),
            StubStorefront::hit("ok-2"),
        ];

        let report = workflow.download(hits, None).await.expect("download");

        assert_eq!(report.status, JobStatus::Error, "downloads fail closed");
        assert_eq!(report.failures, 1);
        assert!(
            report.records.len() <= 2,
            "only items completed before the failure are retained"
        );
        assert!(
            report
                .records
                .iter()
                .all(|r| r.product_number.starts_with("ok-")),
            "the failed product contributes no record"
        );
    }

    #[tokio::test]
    async fn search_can_be_cancelled_from_another_task() {
        let stub = Arc::new(StubStorefront::slow(Duration::from_secs(30)));
        let workflow = Arc::new(SearchWorkflow::new(stub, small_chunk_config()));

        let runner = tokio::spawn({
            let workflow = workflow.clone();
            async move { workflow.search("alpha beta gamma delta", None).await }
        });

        // Wait for the search job to appear and start running.
        let search_id = JobId::from(SEARCH_JOB_ID);
        loop {
            if workflow
                .registry()
                .job_status(&search_id)
                .map(|s| s.is_running())
                .unwrap_or(false)
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(workflow.cancel_search());
        let report = runner
            .await
            .expect("search task must not panic")
            .expect("cancelled search still reports");

        assert_eq!(report.status, JobStatus::Cancelled);
        assert!(report.pages.is_empty(), "no chunk completed before cancel");
    }

    #[tokio::test]
    async fn cancel_search_without_a_job_is_a_no_op() {
        let stub = Arc::new(StubStorefront::new());
        let workflow = SearchWorkflow::new(stub, small_chunk_config());
        assert!(!workflow.cancel_search());
        assert!(!workflow.cancel_download());
        assert_eq!(workflow.cancel_all(), 0);
    }

    #[tokio::test]
    async fn search_and_download_share_the_registry() {
        let stub = Arc::new(StubStorefront::new());
        let workflow = SearchWorkflow::new(stub, small_chunk_config());

        let report = workflow.search("alpha beta", None).await.expect("search");
        workflow
            .download(report.hits, None)
            .await
            .expect("download");

        let registry = workflow.registry();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(&JobId::from(SEARCH_JOB_ID)));
        assert!(registry.contains(&JobId::from(DOWNLOAD_JOB_ID)));
        assert_eq!(registry.finished_jobs().len(), 2);
    }

    #[tokio::test]
    async fn repeated_terms_collapse_to_one_hit() {
        let stub = Arc::new(StubStorefront::new());
        let workflow = SearchWorkflow::new(stub, small_chunk_config());
        let report = workflow.search("dup dup", None).await.expect("search");
        assert_eq!(report.terms_submitted, 1);
        assert_eq!(report.hits.len(), 1);
    }
}
