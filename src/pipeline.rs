//! Per-fund extraction pipeline and batch runner.
//!
//! A [`Pipeline`] turns one document and one fund request into a
//! [`HoldingsTable`]: locate pages, extract the grid, project and screen
//! rows, reassemble wrapped names, normalize fields, filter names and
//! de-duplicate. Failures are classified into an [`ExtractionFailure`] and
//! never abort anything beyond the fund they concern.
//!
//! [`BatchRunner`] runs many independent fund jobs over a shared
//! [`DocumentCache`], in parallel by default. A job either carries a loaded
//! document or a loader the runner calls under the batch time limit, so a
//! report that is slow to parse fails its own funds instead of stalling the
//! batch.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;

use crate::cache::DocumentCache;
use crate::config::{ExtractionConfig, Provider};
use crate::document::{run_with_limit, PdfDocument, SourceDocument, TimeoutDocument};
use crate::error::{Error, ExtractionFailure, FailureReason};
use crate::extract::{ExtractorConfig, TableExtractor};
use crate::filter::NoiseFilter;
use crate::locate::{LocateError, PageLocator};
use crate::model::{FundInfo, FundRequest, HoldingsTable, TableRegion, TableStats};
use crate::normalize::FieldNormalizer;
use crate::reassemble::RecordReassembler;

/// Runs the extraction stages for single funds.
pub struct Pipeline<'a> {
    cache: &'a DocumentCache,
    extractor: TableExtractor,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline over a cache.
    pub fn new(cache: &'a DocumentCache) -> Self {
        Self {
            cache,
            extractor: TableExtractor::new(),
        }
    }

    /// Use a custom extractor configuration.
    pub fn with_extractor(mut self, config: ExtractorConfig) -> Self {
        self.extractor = TableExtractor::with_config(config);
        self
    }

    /// Try a provider's templates in order; the first table wins.
    ///
    /// When every template fails, the failure that salvaged the most
    /// records is returned (the earliest one on a tie).
    pub fn run_provider(
        &self,
        document: &dyn SourceDocument,
        request: &FundRequest,
        provider: &Provider,
    ) -> Result<HoldingsTable, ExtractionFailure> {
        let mut best: Option<ExtractionFailure> = None;

        for template in &provider.templates {
            match self.run(document, request, template) {
                Ok(table) => return Ok(table),
                Err(failure) => {
                    log::debug!(
                        "{}: template {} failed for {:?}: {}",
                        document.id(),
                        template.name,
                        request.fund_name_report,
                        failure.reason
                    );
                    // A timeout would only repeat with the next template
                    if failure.reason == FailureReason::Timeout {
                        return Err(failure);
                    }
                    best = match best {
                        Some(b) if b.partial.len() >= failure.partial.len() => Some(b),
                        _ => Some(failure),
                    };
                }
            }
        }

        Err(best.unwrap_or_else(|| {
            ExtractionFailure::new(
                FailureReason::Unreadable(format!("provider {} has no templates", provider.id)),
                request.fund_name_report.clone(),
            )
        }))
    }

    /// Extract one fund's table with one template.
    pub fn run(
        &self,
        document: &dyn SourceDocument,
        request: &FundRequest,
        config: &ExtractionConfig,
    ) -> Result<HoldingsTable, ExtractionFailure> {
        let fund = request.fund_name_report.as_str();
        let fail = |reason: FailureReason| ExtractionFailure::new(reason, fund);
        let unreadable = |err: Error| fail(FailureReason::from(&err));

        let pages = PageLocator::new(&config.locator, self.cache)
            .locate(document, fund)
            .map_err(|err| match err {
                LocateError::NotFound(_) => fail(FailureReason::PageNotFound),
                LocateError::Document(err) => unreadable(err),
            })?;

        let mut region = TableRegion::new(
            document.id().clone(),
            pages,
            config.table.column_boundaries.clone(),
        )
        .with_mode(config.table.mode)
        .with_panels(config.table.panels);
        if let Some(area) = config.table.area {
            region = region.with_area(area);
        }

        let grid = self
            .extractor
            .extract_cached(document, &region, self.cache)
            .map_err(unreadable)?;

        let mut stats = TableStats::new();
        stats.rows_extracted = grid.rows.len();

        let reassembler = RecordReassembler::new(config.table.columns.clone());
        let projected: Vec<_> = grid
            .rows
            .iter()
            .filter_map(|row| match reassembler.project(row) {
                Ok(record) => Some(record),
                Err(err) => {
                    stats.record_error(&err);
                    None
                }
            })
            .collect();
        if stats.rows_extracted > 0 && stats.geometry_mismatches == stats.rows_extracted {
            return Err(fail(FailureReason::GeometryMismatch).with_partial(Vec::new(), stats));
        }

        let filter = NoiseFilter::new(&config.noise);
        let screened = filter.screen(projected, &mut stats);
        let reassembled = reassembler.reassemble(screened);
        stats.orphan_fragments = reassembled.orphans.len();

        let normalizer = FieldNormalizer::new(config);
        let hint = match (&config.currencies.hint_pattern, region.pages.first()) {
            (Some(_), Some(first)) => {
                let text = self.cache.page_text(document, first).map_err(unreadable)?;
                normalizer.currency_hint(&text)
            }
            _ => None,
        };
        let normalized = normalizer.normalize(reassembled.records, document.id(), hint.as_deref());
        for err in &normalized.errors {
            stats.record_error(err);
        }

        let records = filter.retain(normalized.records, &mut stats);
        let info = FundInfo::from_request(request, document.id().clone());
        let table = HoldingsTable::new(info, records, stats);

        if table.is_empty() {
            let stats = table.stats().clone();
            return Err(fail(FailureReason::EmptyAfterFiltering).with_partial(Vec::new(), stats));
        }
        if let Some(min) = config.min_net_assets_total {
            let total = table.total_net_assets();
            if total < min {
                log::debug!(
                    "{}: {:?} net assets total {} below {}",
                    document.id(),
                    fund,
                    total,
                    min
                );
                let stats = table.stats().clone();
                return Err(fail(FailureReason::BelowSanityThreshold)
                    .with_partial(table.into_records(), stats));
            }
        }

        log::info!(
            "{}: {:?} extracted {} records from pages {:?}",
            document.id(),
            fund,
            table.len(),
            region.pages.pages()
        );
        Ok(table)
    }
}

/// Extract one fund with one template and a throwaway cache.
pub fn extract_fund(
    document: &dyn SourceDocument,
    request: &FundRequest,
    config: &ExtractionConfig,
) -> Result<HoldingsTable, ExtractionFailure> {
    let cache = DocumentCache::new();
    Pipeline::new(&cache).run(document, request, config)
}

/// Shared flag that stops a batch from starting new jobs.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Jobs already running finish normally.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Opens a job's document on demand.
pub type DocumentLoader =
    Arc<dyn Fn() -> crate::error::Result<Arc<dyn SourceDocument>> + Send + Sync>;

/// Where a job's document comes from.
#[derive(Clone)]
pub enum JobSource {
    /// Already loaded. Jobs sharing the same `Arc` share cached work.
    Loaded(Arc<dyn SourceDocument>),
    /// Loaded by the runner for this job, under the batch time limit.
    Deferred(DocumentLoader),
}

/// One fund to extract.
#[derive(Clone)]
pub struct FundJob {
    pub source: JobSource,
    pub request: FundRequest,
    pub provider: Arc<Provider>,
}

impl FundJob {
    pub fn new(document: Arc<dyn SourceDocument>, request: FundRequest, provider: Arc<Provider>) -> Self {
        Self {
            source: JobSource::Loaded(document),
            request,
            provider,
        }
    }

    /// A job whose document is opened by the runner.
    pub fn deferred<F>(loader: F, request: FundRequest, provider: Arc<Provider>) -> Self
    where
        F: Fn() -> crate::error::Result<Arc<dyn SourceDocument>> + Send + Sync + 'static,
    {
        Self {
            source: JobSource::Deferred(Arc::new(loader)),
            request,
            provider,
        }
    }

    /// A job over a PDF file that the runner opens.
    pub fn from_path(path: impl Into<PathBuf>, request: FundRequest, provider: Arc<Provider>) -> Self {
        let path = path.into();
        Self::deferred(
            move || {
                let document: Arc<dyn SourceDocument> = Arc::new(PdfDocument::load_file(&path)?);
                Ok(document)
            },
            request,
            provider,
        )
    }
}

/// Result of one job.
#[derive(Debug)]
pub enum JobOutcome {
    Extracted(HoldingsTable),
    Failed(ExtractionFailure),
    /// The batch was cancelled before the job started
    Cancelled(FundRequest),
}

impl JobOutcome {
    /// The table, if the job succeeded.
    pub fn table(&self) -> Option<&HoldingsTable> {
        match self {
            JobOutcome::Extracted(table) => Some(table),
            _ => None,
        }
    }

    /// The failure, if the job failed.
    pub fn failure(&self) -> Option<&ExtractionFailure> {
        match self {
            JobOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Batch execution options.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Run jobs on the rayon pool
    pub parallel: bool,
    /// Limit for loading a deferred document and for each page call
    pub page_timeout: Option<Duration>,
    /// Table extraction settings
    pub extractor: ExtractorConfig,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            page_timeout: None,
            extractor: ExtractorConfig::default(),
        }
    }
}

impl BatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable parallel processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Bound document loading and every page call.
    pub fn with_page_timeout(mut self, limit: Duration) -> Self {
        self.page_timeout = Some(limit);
        self
    }

    /// Set table extraction settings.
    pub fn with_extractor(mut self, extractor: ExtractorConfig) -> Self {
        self.extractor = extractor;
        self
    }
}

/// Runs fund jobs over a shared cache.
#[derive(Default)]
pub struct BatchRunner {
    options: BatchOptions,
    cache: DocumentCache,
    cancel: CancelToken,
}

impl BatchRunner {
    /// Create a runner with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runner with custom options.
    pub fn with_options(options: BatchOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Token that cancels this runner's batches.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// The cache shared by all jobs.
    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    /// Run all jobs. Outcomes are in job order.
    pub fn run(&self, jobs: &[FundJob]) -> Vec<JobOutcome> {
        log::info!(
            "running {} fund jobs ({})",
            jobs.len(),
            if self.options.parallel { "parallel" } else { "sequential" }
        );

        let outcomes: Vec<JobOutcome> = if self.options.parallel {
            jobs.par_iter().map(|job| self.run_job(job)).collect()
        } else {
            jobs.iter().map(|job| self.run_job(job)).collect()
        };

        let succeeded = outcomes.iter().filter(|o| o.table().is_some()).count();
        let stats = self.cache.stats();
        log::info!(
            "{} of {} funds extracted (cache hit rate {:.0}%)",
            succeeded,
            jobs.len(),
            stats.hit_rate() * 100.0
        );
        outcomes
    }

    fn run_job(&self, job: &FundJob) -> JobOutcome {
        if self.cancel.is_cancelled() {
            return JobOutcome::Cancelled(job.request.clone());
        }

        let document = match self.open(job) {
            Ok(document) => document,
            Err(err) => {
                let failure = ExtractionFailure::new(
                    FailureReason::from(&err),
                    job.request.fund_name_report.clone(),
                );
                log::warn!("{}", failure);
                return JobOutcome::Failed(failure);
            }
        };

        let pipeline = Pipeline::new(&self.cache).with_extractor(self.options.extractor.clone());
        let result = match self.options.page_timeout {
            Some(limit) => {
                let guarded = TimeoutDocument::new(Arc::clone(&document), limit);
                pipeline.run_provider(&guarded, &job.request, &job.provider)
            }
            None => pipeline.run_provider(document.as_ref(), &job.request, &job.provider),
        };

        match result {
            Ok(table) => JobOutcome::Extracted(table),
            Err(failure) => {
                log::warn!("{}: {}", document.id(), failure);
                JobOutcome::Failed(failure)
            }
        }
    }

    fn open(&self, job: &FundJob) -> crate::error::Result<Arc<dyn SourceDocument>> {
        match &job.source {
            JobSource::Loaded(document) => Ok(Arc::clone(document)),
            JobSource::Deferred(loader) => match self.options.page_timeout {
                Some(limit) => {
                    let loader = Arc::clone(loader);
                    let task = format!("loading document for {}", job.request.fund_name_report);
                    run_with_limit(&task, limit, move || loader())
                }
                None => loader(),
            },
        }
    }
}
