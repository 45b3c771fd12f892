//! Sequential fetch/parse pipeline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{Local, NaiveDate, NaiveTime, Timelike};
use scraper::Html;
use scrapify_adapters::{AdapterError, SiteAdapter};
use scrapify_core::{CompanySelection, JobListing, JobPosting, RunResult, ScrapeRecord, SiteConfig};
use scrapify_storage::{FetchError, PageFetcher, RecordSink, SinkError};
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::registry::{ConfiguredCompany, Registry, Resolution};
use crate::report::{ProgressTracker, RunReporter};

pub const NO_RECORDS_MESSAGE: &str = "Scraping complete: no job descriptions collected.";

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("{company}: no configuration, skipped")]
    ConfigurationMissing { company: String },
    #[error("{company}: failed to fetch listings page: {source}")]
    ListingFetchFailed { company: String, source: FetchError },
    #[error("{company}: listing parser failed: {source}")]
    ListingParseFailed { company: String, source: AdapterError },
    #[error("{company} / {title}: failed to fetch detail page: {source}")]
    DetailFetchFailed {
        company: String,
        title: String,
        source: FetchError,
    },
    #[error("{company} / {title}: description parser failed: {source}")]
    DetailParseFailed {
        company: String,
        title: String,
        source: AdapterError,
    },
    #[error("saving to {location} failed: {source}")]
    PersistFailed { location: String, source: SinkError },
    #[error("run cancelled with {remaining} of {total} companies not attempted")]
    Cancelled { remaining: usize, total: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub listing_timeout: Duration,
    pub detail_timeout: Duration,
    /// Pause between consecutive detail fetches of one company.
    pub detail_delay: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            listing_timeout: Duration::from_secs(20),
            detail_timeout: Duration::from_secs(15),
            detail_delay: Duration::from_millis(500),
        }
    }
}

struct RunState {
    progress: ProgressTracker,
    total: usize,
    records: Vec<ScrapeRecord>,
    errors: Vec<String>,
    date: NaiveDate,
    time: NaiveTime,
}

pub struct ScrapePipeline {
    registry: Registry,
    fetcher: Arc<dyn PageFetcher>,
    sink: Arc<dyn RecordSink>,
    reporter: Arc<dyn RunReporter>,
    options: PipelineOptions,
    cancel: Arc<AtomicBool>,
}

fn parse_listings(
    adapter: &dyn SiteAdapter,
    body: &str,
    site: &SiteConfig,
) -> Result<Vec<JobListing>, AdapterError> {
    let document = Html::parse_document(body);
    adapter.extract_listings(&document, site)
}

fn parse_description(adapter: &dyn SiteAdapter, body: &str) -> Result<String, AdapterError> {
    let document = Html::parse_document(body);
    adapter.extract_description(&document)
}

impl ScrapePipeline {
    pub fn new(
        registry: Registry,
        fetcher: Arc<dyn PageFetcher>,
        sink: Arc<dyn RecordSink>,
        reporter: Arc<dyn RunReporter>,
    ) -> Self {
        Self {
            registry,
            fetcher,
            sink,
            reporter,
            options: PipelineOptions::default(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Setting the returned flag stops the run before its next company.
    /// Records already collected are still saved.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub async fn run(&self, selection: &CompanySelection) -> RunResult {
        let run_id = Uuid::new_v4();
        let span = info_span!("scrape_run", %run_id);
        let result = self.run_inner(selection).instrument(span).await;
        self.reporter.finished(&result);
        result
    }

    async fn run_inner(&self, selection: &CompanySelection) -> RunResult {
        let companies = self.registry.select(selection);
        let now = Local::now();
        let mut state = RunState {
            progress: ProgressTracker::new(companies.len()),
            total: companies.len(),
            records: Vec::new(),
            errors: Vec::new(),
            date: now.date_naive(),
            time: now.time().with_nanosecond(0).unwrap_or_else(|| now.time()),
        };
        info!(companies = companies.len(), "starting scrape run");
        self.report_progress(state.progress.current());

        for (index, id) in companies.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                let err = ScrapeError::Cancelled {
                    remaining: companies.len() - index,
                    total: companies.len(),
                };
                warn!("{err}");
                self.reporter.log(&format!("Cancelled: {err}"));
                state.errors.push(err.to_string());
                break;
            }

            match self.registry.resolve(id) {
                Resolution::NotConfigured(company) => {
                    self.record_error(&mut state, ScrapeError::ConfigurationMissing { company });
                    let value = state.progress.company_done(index);
                    self.report_progress(value);
                }
                Resolution::Configured(company) => {
                    self.scrape_company(&company, index, &mut state).await;
                }
            }
        }

        self.persist(state).await
    }

    fn report_progress(&self, value: u8) {
        self.reporter.progress(value);
    }

    fn record_error(&self, state: &mut RunState, err: ScrapeError) {
        warn!("{err}");
        self.reporter.log(&format!("Error: {err}"));
        state.errors.push(err.to_string());
    }

    async fn discover(
        &self,
        company: &ConfiguredCompany,
        index: usize,
        state: &mut RunState,
    ) -> Result<Vec<JobListing>, ScrapeError> {
        let adapter = company.adapter.as_ref();
        if let Some(api) = adapter
            .listings_from_api(self.fetcher.as_ref(), &company.site)
            .await
        {
            match api {
                Ok(jobs) => {
                    let value = state.progress.listing_fetched(index);
                    self.report_progress(value);
                    return Ok(jobs);
                }
                Err(err) => {
                    warn!(company = %company.id, error = %err, "listing API failed, falling back to page");
                    self.reporter
                        .log(&format!("Listing API failed ({err}), scanning careers page instead"));
                }
            }
        }

        let response = self
            .fetcher
            .fetch_text(&company.site.url, &company.site.headers, self.options.listing_timeout)
            .await
            .map_err(|source| ScrapeError::ListingFetchFailed {
                company: company.display_name.clone(),
                source,
            })?;
        let value = state.progress.listing_fetched(index);
        self.report_progress(value);

        parse_listings(adapter, &response.body, &company.site).map_err(|source| {
            ScrapeError::ListingParseFailed {
                company: company.display_name.clone(),
                source,
            }
        })
    }

    async fn scrape_company(&self, company: &ConfiguredCompany, index: usize, state: &mut RunState) {
        let name = company.display_name.as_str();
        self.reporter
            .log(&format!("-- {name} ({}/{}) --", index + 1, state.total));
        if let Some(note) = &company.site.note {
            self.reporter.log(&format!("Note: {note}"));
        }
        self.reporter.status(&format!("[{name}] Fetching listings..."));

        let listings = match self.discover(company, index, state).await {
            Ok(listings) => listings,
            Err(err) => {
                self.record_error(state, err);
                let value = state.progress.company_done(index);
                self.report_progress(value);
                return;
            }
        };

        if listings.is_empty() {
            warn!(company = %company.id, "no postings found");
            self.reporter.log(&format!("No postings found for {name}."));
            let value = state.progress.company_done(index);
            self.report_progress(value);
            return;
        }

        let num = listings.len();
        info!(company = %company.id, postings = num, "listing parsed");
        self.reporter.log(&format!("Found {num} postings"));
        let value = state.progress.listing_parsed(index);
        self.report_progress(value);

        for (i, listing) in listings.into_iter().enumerate() {
            self.reporter
                .status(&format!("[{name}] {}/{num}: {}", i + 1, listing.title));

            match self.scrape_detail(company, &listing).await {
                Ok(posting) => match ScrapeRecord::from_posting(&posting, state.date, Some(state.time)) {
                    Some(record) => {
                        debug!(company = %company.id, title = %record.title, "description collected");
                        self.reporter.log(&format!("Collected: {}", record.title));
                        state.records.push(record);
                    }
                    None => {
                        info!(company = %company.id, title = %posting.title, "no description");
                        self.reporter.log(&format!("No description: {}", posting.title));
                    }
                },
                Err(err) => self.record_error(state, err),
            }

            let value = state.progress.detail_done(index, i + 1, num);
            self.report_progress(value);

            if i + 1 < num && !self.options.detail_delay.is_zero() {
                tokio::time::sleep(self.options.detail_delay).await;
            }
        }

        let value = state.progress.company_done(index);
        self.report_progress(value);
    }

    async fn scrape_detail(
        &self,
        company: &ConfiguredCompany,
        listing: &JobListing,
    ) -> Result<JobPosting, ScrapeError> {
        let response = self
            .fetcher
            .fetch_text(&listing.url, &company.site.headers, self.options.detail_timeout)
            .await
            .map_err(|source| ScrapeError::DetailFetchFailed {
                company: company.display_name.clone(),
                title: listing.title.clone(),
                source,
            })?;

        let description = parse_description(company.adapter.as_ref(), &response.body).map_err(
            |source| ScrapeError::DetailParseFailed {
                company: company.display_name.clone(),
                title: listing.title.clone(),
                source,
            },
        )?;

        Ok(JobPosting {
            company: company.display_name.clone(),
            title: listing.title.clone(),
            detail_url: listing.url.clone(),
            description,
        })
    }

    async fn persist(&self, state: RunState) -> RunResult {
        let RunState {
            mut progress,
            records,
            mut errors,
            ..
        } = state;

        if records.is_empty() {
            self.report_progress(progress.finish());
            return RunResult::completed(NO_RECORDS_MESSAGE, errors);
        }

        let location = self.sink.location();
        let count = records.len();
        self.reporter
            .status(&format!("Saving {count} record(s) to {location}..."));
        self.report_progress(progress.saving());

        let sink = Arc::clone(&self.sink);
        let saved = tokio::task::spawn_blocking(move || sink.append_batch(&records))
            .await
            .context("record sink task failed");

        match saved {
            Ok(Ok(written)) => {
                info!(records = written, location = %location, "batch saved");
                self.report_progress(progress.finish());
                RunResult::completed(format!("Added {written} job(s) to {location}."), errors)
            }
            Ok(Err(source)) => {
                let err = ScrapeError::PersistFailed {
                    location: location.clone(),
                    source,
                };
                error!("{err}");
                self.reporter.log(&format!("Error: {err}"));
                errors.push(err.to_string());
                RunResult::aborted(format!("Failed to save results to {location}."), errors)
            }
            Err(err) => {
                error!("run aborted: {err:#}");
                RunResult::aborted(format!("Run aborted: {err:#}"), errors)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use scrapify_adapters::{adapter_by_name, LeverAdapter};
    use scrapify_storage::{FetchedResponse, StatusCode, XlsxSink};

    use super::*;
    use crate::registry::CompanyEntry;
    use crate::report::{ChannelReporter, RunEvent};

    #[derive(Default)]
    struct FakeWeb {
        pages: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
        cancel_on: Option<(String, Arc<AtomicBool>)>,
    }

    impl FakeWeb {
        fn page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), body.to_string());
            self
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for FakeWeb {
        async fn fetch_text(
            &self,
            url: &str,
            _headers: &BTreeMap<String, String>,
            _timeout: Duration,
        ) -> Result<FetchedResponse, FetchError> {
            self.requested.lock().unwrap().push(url.to_string());
            if let Some((trigger, flag)) = &self.cancel_on {
                if trigger == url {
                    flag.store(true, Ordering::SeqCst);
                }
            }
            match self.pages.get(url) {
                Some(body) => Ok(FetchedResponse {
                    status: StatusCode::OK,
                    final_url: url.to_string(),
                    body: body.clone(),
                }),
                None => Err(FetchError::HttpStatus {
                    status: 500,
                    url: url.to_string(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct MemorySink {
        batches: Mutex<Vec<Vec<ScrapeRecord>>>,
        fail: bool,
    }

    impl RecordSink for MemorySink {
        fn append_batch(&self, records: &[ScrapeRecord]) -> Result<usize, SinkError> {
            if self.fail {
                return Err(SinkError::Save {
                    path: "memory".into(),
                    reason: "disk full".into(),
                });
            }
            self.batches.lock().unwrap().push(records.to_vec());
            Ok(records.len())
        }

        fn location(&self) -> String {
            "memory".into()
        }
    }

    impl MemorySink {
        fn saved(&self) -> Vec<(String, String, String)> {
            self.batches
                .lock()
                .unwrap()
                .iter()
                .flatten()
                .map(|r| (r.company.clone(), r.title.clone(), r.description.clone()))
                .collect()
        }
    }

    struct BrokenListings;

    #[async_trait]
    impl SiteAdapter for BrokenListings {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn extract_listings(
            &self,
            _document: &Html,
            _site: &SiteConfig,
        ) -> Result<Vec<JobListing>, AdapterError> {
            Err(AdapterError::Message("layout changed".into()))
        }

        fn extract_description(&self, _document: &Html) -> Result<String, AdapterError> {
            Ok(String::new())
        }
    }

    fn lever_company(name: &str, url: &str) -> CompanyEntry {
        CompanyEntry::configured(name, SiteConfig::new(url), Arc::new(LeverAdapter::plain("lever")))
    }

    fn listing_page(jobs: &[(&str, &str)]) -> String {
        let postings = jobs
            .iter()
            .map(|(title, href)| {
                format!(r#"<div class="posting"><a class="posting-title" href="{href}"><h5>{title}</h5></a></div>"#)
            })
            .collect::<String>();
        format!("<html><body>{postings}</body></html>")
    }

    fn detail_page(text: &str) -> String {
        format!(r#"<html><body><div class="section page-centered">{text}</div></body></html>"#)
    }

    struct Harness {
        pipeline: ScrapePipeline,
        web: Arc<FakeWeb>,
        sink: Arc<MemorySink>,
        events: tokio::sync::mpsc::UnboundedReceiver<RunEvent>,
    }

    fn harness(entries: Vec<CompanyEntry>, web: FakeWeb, sink: MemorySink) -> Harness {
        let web = Arc::new(web);
        let sink = Arc::new(sink);
        let (reporter, events) = ChannelReporter::channel();
        let pipeline = ScrapePipeline::new(
            Registry::new(entries),
            web.clone(),
            sink.clone(),
            Arc::new(reporter),
        )
        .with_options(PipelineOptions {
            detail_delay: Duration::ZERO,
            ..PipelineOptions::default()
        });
        Harness {
            pipeline,
            web,
            sink,
            events,
        }
    }

    fn drain(events: &mut tokio::sync::mpsc::UnboundedReceiver<RunEvent>) -> Vec<RunEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    fn progress_values(events: &[RunEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match e {
                RunEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    fn logs(events: &[RunEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                RunEvent::Log(line) => Some(line.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn engineer_with_description_is_kept_and_blank_manager_is_logged() {
        let web = FakeWeb::default()
            .page(
                "https://acme.test/careers",
                &listing_page(&[("Engineer", "/jobs/1"), ("Manager", "/jobs/2")]),
            )
            .page("https://acme.test/jobs/1", &detail_page("Great role"))
            .page("https://acme.test/jobs/2", "<html><body><p>Apply soon</p></body></html>");
        let mut h = harness(
            vec![lever_company("Acme", "https://acme.test/careers")],
            web,
            MemorySink::default(),
        );

        let result = h.pipeline.run(&CompanySelection::All).await;

        assert!(result.overall_success);
        assert!(result.errors.is_empty());
        assert_eq!(result.summary_message, "Added 1 job(s) to memory.");
        assert_eq!(
            h.sink.saved(),
            vec![("Acme".to_string(), "Engineer".to_string(), "Great role".to_string())]
        );

        let events = drain(&mut h.events);
        let logs = logs(&events);
        assert!(logs.iter().any(|l| l.to_lowercase().contains("no description") && l.contains("Manager")));
        assert_eq!(events.last(), Some(&RunEvent::Finished(result)));
    }

    #[tokio::test]
    async fn failing_company_is_isolated_from_the_others() {
        let web = FakeWeb::default()
            .page("https://one.test/jobs", &listing_page(&[("Welder", "/jobs/w")]))
            .page("https://one.test/jobs/w", &detail_page("Weld things"))
            .page("https://three.test/jobs", &listing_page(&[("Pilot", "/jobs/p")]))
            .page("https://three.test/jobs/p", &detail_page("Fly things"));
        let mut h = harness(
            vec![
                lever_company("One", "https://one.test/jobs"),
                lever_company("Two", "https://two.test/jobs"),
                lever_company("Three", "https://three.test/jobs"),
            ],
            web,
            MemorySink::default(),
        );

        let result = h.pipeline.run(&CompanySelection::All).await;

        assert!(result.overall_success);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Two:"));
        let companies = h.sink.saved().into_iter().map(|(c, _, _)| c).collect::<Vec<_>>();
        assert_eq!(companies, vec!["One", "Three"]);

        let progress = progress_values(&drain(&mut h.events));
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(progress.last(), Some(&100));
    }

    #[tokio::test]
    async fn failing_detail_page_only_skips_that_job() {
        let web = FakeWeb::default()
            .page(
                "https://acme.test/careers",
                &listing_page(&[("First", "/jobs/1"), ("Second", "/jobs/2"), ("Third", "/jobs/3")]),
            )
            .page("https://acme.test/jobs/1", &detail_page("One"))
            .page("https://acme.test/jobs/3", &detail_page("Three"));
        let mut h = harness(
            vec![lever_company("Acme", "https://acme.test/careers")],
            web,
            MemorySink::default(),
        );

        let result = h.pipeline.run(&CompanySelection::All).await;

        let titles = h.sink.saved().into_iter().map(|(_, t, _)| t).collect::<Vec<_>>();
        assert_eq!(titles, vec!["First", "Third"]);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("Second"));

        let progress = progress_values(&drain(&mut h.events));
        assert!(progress.contains(&80));
        assert_eq!(progress.last(), Some(&100));
    }

    #[tokio::test]
    async fn listing_parser_faults_and_empty_listings_are_handled_differently() {
        let web = FakeWeb::default()
            .page("https://broken.test/", "<html></html>")
            .page("https://empty.test/", "<html><body><div id=app></div></body></html>");
        let mut h = harness(
            vec![
                CompanyEntry::configured(
                    "Broken",
                    SiteConfig::new("https://broken.test/"),
                    Arc::new(BrokenListings),
                ),
                lever_company("Empty", "https://empty.test/"),
            ],
            web,
            MemorySink::default(),
        );

        let result = h.pipeline.run(&CompanySelection::All).await;

        assert!(result.overall_success);
        assert_eq!(result.summary_message, NO_RECORDS_MESSAGE);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("listing parser failed"));
        assert!(h.sink.batches.lock().unwrap().is_empty());

        let logs = logs(&drain(&mut h.events));
        assert!(logs.iter().any(|l| l == "No postings found for Empty."));
    }

    #[tokio::test]
    async fn unconfigured_company_is_reported_not_fatal() {
        let mut h = harness(
            vec![CompanyEntry::placeholder("Hexagon AB")],
            FakeWeb::default(),
            MemorySink::default(),
        );

        let result = h
            .pipeline
            .run(&CompanySelection::Single("hexagon-ab".into()))
            .await;

        assert!(result.overall_success);
        assert_eq!(result.errors, vec!["Hexagon AB: no configuration, skipped".to_string()]);
        assert!(h.web.requested().is_empty());
        assert_eq!(progress_values(&drain(&mut h.events)).last(), Some(&100));
    }

    #[tokio::test]
    async fn all_run_over_builtin_table_skips_placeholders() {
        let web = Arc::new(FakeWeb::default());
        let (reporter, _events) = ChannelReporter::channel();
        let pipeline = ScrapePipeline::new(
            Registry::builtin(scrapify_core::DEFAULT_USER_AGENT),
            web.clone(),
            Arc::new(MemorySink::default()),
            Arc::new(reporter),
        )
        .with_options(PipelineOptions {
            detail_delay: Duration::ZERO,
            ..PipelineOptions::default()
        });

        let result = pipeline.run(&CompanySelection::All).await;

        assert!(result.errors.iter().all(|e| !e.contains("no configuration")));
        assert_eq!(result.errors.len(), scrapify_adapters::BUILTIN_COMPANIES.len());
        assert!(result
            .errors
            .iter()
            .all(|e| e.contains("failed to fetch listings page")));
    }

    #[tokio::test]
    async fn api_adapter_falls_back_to_careers_page() {
        let anybotics = adapter_by_name("anybotics").unwrap();
        let web = FakeWeb::default()
            .page(
                "https://apply.test/anybotics/",
                r#"<body><a href="/anybotics/j/ABC/">Locomotion Engineer</a></body>"#,
            )
            .page(
                "https://apply.test/anybotics/j/ABC/",
                r#"<body><div class="description">Make robots walk.</div></body>"#,
            );
        let h = harness(
            vec![CompanyEntry::configured(
                "ANYbotics",
                SiteConfig::new("https://apply.test/anybotics/"),
                Arc::from(anybotics),
            )],
            web,
            MemorySink::default(),
        );

        let result = h.pipeline.run(&CompanySelection::All).await;

        assert!(result.errors.is_empty());
        assert_eq!(
            h.sink.saved(),
            vec![(
                "ANYbotics".to_string(),
                "Locomotion Engineer".to_string(),
                "Make robots walk.".to_string()
            )]
        );
        assert_eq!(
            h.web.requested()[0],
            "https://api.workable.com/organization/anybotics/jobs"
        );
    }

    #[tokio::test]
    async fn cancellation_stops_between_companies_and_keeps_records() {
        let flag_holder = Arc::new(AtomicBool::new(false));
        let mut web = FakeWeb::default()
            .page("https://one.test/jobs", &listing_page(&[("Welder", "/jobs/w")]))
            .page("https://one.test/jobs/w", &detail_page("Weld things"));
        web.cancel_on = Some(("https://one.test/jobs/w".to_string(), flag_holder.clone()));

        let web = Arc::new(web);
        let sink = Arc::new(MemorySink::default());
        let (reporter, _events) = ChannelReporter::channel();
        let mut pipeline = ScrapePipeline::new(
            Registry::new(vec![
                lever_company("One", "https://one.test/jobs"),
                lever_company("Two", "https://two.test/jobs"),
                lever_company("Three", "https://three.test/jobs"),
            ]),
            web.clone(),
            sink.clone(),
            Arc::new(reporter),
        );
        pipeline.cancel = flag_holder;
        let pipeline = pipeline.with_options(PipelineOptions {
            detail_delay: Duration::ZERO,
            ..PipelineOptions::default()
        });

        let result = pipeline.run(&CompanySelection::All).await;

        assert!(result.overall_success);
        assert_eq!(
            result.errors,
            vec!["run cancelled with 2 of 3 companies not attempted".to_string()]
        );
        assert_eq!(sink.saved().len(), 1);
        assert!(!web.requested().iter().any(|u| u.contains("two.test")));
    }

    #[tokio::test]
    async fn persist_failure_aborts_the_run() {
        let web = FakeWeb::default()
            .page("https://acme.test/careers", &listing_page(&[("Engineer", "/jobs/1")]))
            .page("https://acme.test/jobs/1", &detail_page("Great role"));
        let h = harness(
            vec![lever_company("Acme", "https://acme.test/careers")],
            web,
            MemorySink {
                fail: true,
                ..MemorySink::default()
            },
        );

        let result = h.pipeline.run(&CompanySelection::All).await;

        assert!(!result.overall_success);
        assert_eq!(result.summary_message, "Failed to save results to memory.");
        assert!(result.errors[0].contains("disk full"));
    }

    #[tokio::test]
    async fn second_run_lands_above_the_first_in_the_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(XlsxSink::new(dir.path().join("Scrapify.xlsx")));
        let options = PipelineOptions {
            detail_delay: Duration::ZERO,
            ..PipelineOptions::default()
        };

        for (run, titles) in [("a", ["A1", "A2"]), ("b", ["B1", "B2"])] {
            let jobs = titles
                .iter()
                .enumerate()
                .map(|(i, t)| (*t, format!("/{run}/{i}")))
                .collect::<Vec<_>>();
            let listing = listing_page(
                &jobs.iter().map(|(t, href)| (*t, href.as_str())).collect::<Vec<_>>(),
            );
            let mut web = FakeWeb::default().page("https://acme.test/careers", &listing);
            for (title, href) in &jobs {
                web = web.page(
                    &format!("https://acme.test{href}"),
                    &detail_page(&format!("About {title}")),
                );
            }
            let pipeline = ScrapePipeline::new(
                Registry::new(vec![lever_company("Acme", "https://acme.test/careers")]),
                Arc::new(web),
                sink.clone(),
                Arc::new(ChannelReporter::channel().0),
            )
            .with_options(options);
            let result = pipeline.run(&CompanySelection::All).await;
            assert!(result.overall_success, "{result:?}");
        }

        let roles = sink
            .read_rows()
            .unwrap()
            .into_iter()
            .map(|row| row[2].clone())
            .collect::<Vec<_>>();
        assert_eq!(roles, vec!["Role", "B1", "B2", "A1", "A2"]);
    }
}
