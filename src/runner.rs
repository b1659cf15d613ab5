use crate::{
    config::Config,
    detect::{FineDetector, FineVerdict},
    driver::{DriverError, PageDriver},
    extract,
    progress::{Evidence, PlateResult, ProgressStore},
    report,
    util::{plate_file_stem, stamp_clock},
};
use anyhow::{Context, Result, anyhow};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Runs one batch job against a single browser session.
pub struct BatchRunner {
    cfg: Config,
    driver: Box<dyn PageDriver>,
    progress: ProgressStore,
}

impl BatchRunner {
    pub fn new(cfg: &Config, driver: Box<dyn PageDriver>, progress: ProgressStore) -> Self {
        Self {
            cfg: cfg.clone(),
            driver,
            progress,
        }
    }

    /// Processes `plates` to completion and leaves the final state in the store.
    ///
    /// The store must already be in `processing` (see [`ProgressStore::try_begin`]).
    pub async fn run(mut self, plates: Vec<String>) {
        let started = Instant::now();
        info!(total = plates.len(), "batch job started");

        let outcome = self.run_inner(&plates).await;

        if let Err(err) = self.driver.close().await {
            debug!("{err}");
        }

        match outcome {
            Ok(report_path) => {
                info!(
                    report = %report_path.display(),
                    elapsed_secs = started.elapsed().as_secs(),
                    "batch job completed"
                );
                self.progress.complete(report_path);
            }
            Err(err) => {
                warn!("batch job failed: {err:#}");
                self.progress.fail(format!("Error: {err:#}"));
            }
        }
    }

    /// Runs the batch on the tokio runtime. A worker that dies without
    /// finishing (panic or cancellation) still leaves the store in `error`.
    pub fn spawn(self, plates: Vec<String>) -> JoinHandle<()> {
        let progress = self.progress.clone();
        let worker = tokio::spawn(self.run(plates));
        tokio::spawn(async move {
            if let Err(err) = worker.await {
                error!("batch worker aborted: {err}");
                progress.fail(format!("Error: batch worker aborted: {err}"));
            }
        })
    }

    async fn run_inner(&mut self, plates: &[String]) -> Result<PathBuf> {
        let detector = FineDetector::from_config(&self.cfg.detection)
            .context("building fine detector")?;

        self.progress.set_message("Starting browser...");
        self.driver
            .open()
            .await
            .context("starting browser session")?;

        self.progress.set_message("Navigating to SIMIT...");
        let url = self.cfg.site.url.clone();
        self.driver
            .navigate(&url)
            .await
            .with_context(|| format!("navigating to {url}"))?;

        let total = plates.len();
        for (idx, plate) in plates.iter().enumerate() {
            self.progress
                .set_step(format!("Processing: {plate}"), plate, idx);

            match self.process_plate(&detector, plate, idx).await {
                Ok(result) => {
                    let status = if result.has_fine() { "Yes" } else { "No" };
                    info!(%plate, fines = status, "plate checked");
                    self.progress
                        .record(result, format!("Completed: {plate} (fines: {status})"));
                    sleep(Duration::from_millis(self.cfg.timing.between_plates_ms)).await;
                }
                Err(err) => {
                    warn!(%plate, "plate failed: {err}");
                    self.progress.record(
                        PlateResult::failed(plate, err.to_string()),
                        format!("Error on {plate}"),
                    );
                }
            }
        }

        self.progress.set_step("Generating report...", "", total);
        let results = self.progress.results();
        let cfg = self.cfg.clone();
        let written = tokio::task::spawn_blocking(move || report::write_report(&cfg, &results))
            .await
            .context("report task panicked")?
            .context("writing report")?;

        written.ok_or_else(|| anyhow!("report generation produced no usable file"))
    }

    async fn process_plate(
        &mut self,
        detector: &FineDetector,
        plate: &str,
        idx: usize,
    ) -> Result<PlateResult, DriverError> {
        if let Err(err) = self.driver.dismiss_popup().await {
            debug!(%plate, "{err}");
        }

        self.driver.submit_plate(plate).await?;

        let html = match self.driver.page_html().await {
            Ok(html) => Some(html),
            Err(err) => {
                warn!(%plate, "page snapshot failed; assuming no fines: {err}");
                None
            }
        };
        let verdict = html
            .as_deref()
            .map(|h| detector.detect(h))
            .unwrap_or(FineVerdict::NONE);

        let details = match (&html, verdict.has_fine) {
            (Some(h), true) => {
                self.progress
                    .set_step(format!("Extracting details for {plate}..."), plate, idx);
                extract::extract_details(&self.cfg.detection, h)
            }
            _ => String::new(),
        };

        let shot = self
            .cfg
            .paths
            .screenshots_dir
            .join(format!("{}_{}.png", plate_file_stem(plate), stamp_clock()));
        let evidence = match self.driver.capture_screenshot(&shot).await {
            Ok(path) => Evidence::Captured(path),
            Err(err) => {
                debug!(%plate, "{err}");
                Evidence::None
            }
        };

        Ok(PlateResult::checked(plate, verdict, evidence, details))
    }
}
