//! Request orchestration.
//!
//! One request runs RECEIVED → VALIDATING → FETCHING → EXTRACTING →
//! COMPUTING → RENDERING → DELIVERED, with FAILED reachable from every
//! non-terminal stage. All validation happens before any network work;
//! the only failure that is retried is an archive timeout.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task;
use tracing::{debug, info, instrument, warn};

use era5_grid::{extract_field_set, LevelPair};
use map_renderer::{
    render_categorical, render_continuous, CategoryScale, ColorScale, MapExtent, RenderError,
    RenderOptions,
};
use shear_analysis::{
    classify_field, combined_shear, horizontal_shear, vertical_shear, AnalysisError,
    ClassifiedField, ShearField, Thresholds,
};
use turb_common::{
    parse_request_datetime, AvailabilityWindow, FieldKey, Product, RegionRegistry, RequestSpec,
    TurbError,
};

use crate::cache::FieldCache;
use crate::metrics::{BotMetrics, Timer};
use crate::provider::FieldProvider;
use crate::tracker::{RequestReport, RequestTracker};

/// Lifecycle stages of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Validating,
    Fetching,
    Extracting,
    Computing,
    Rendering,
    Delivered,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "RECEIVED",
            Stage::Validating => "VALIDATING",
            Stage::Fetching => "FETCHING",
            Stage::Extracting => "EXTRACTING",
            Stage::Computing => "COMPUTING",
            Stage::Rendering => "RENDERING",
            Stage::Delivered => "DELIVERED",
            Stage::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Rendered chart plus its delivery metadata.
pub struct ChartOutcome {
    pub png: Vec<u8>,
    pub caption: String,
    pub filename: String,
    /// Where the chart was persisted, when the write succeeded.
    pub path: Option<PathBuf>,
}

/// Tuning knobs the pipeline needs beyond its collaborators.
pub struct PipelineSettings {
    pub thresholds: Thresholds,
    pub levels: LevelPair,
    pub panel_width: u32,
    pub font_paths: Vec<String>,
    pub charts_dir: PathBuf,
    pub max_timeout_retries: u32,
    pub retry_initial_delay: Duration,
}

pub struct Pipeline {
    provider: Arc<dyn FieldProvider>,
    cache: Arc<FieldCache>,
    regions: RegionRegistry,
    availability: AvailabilityWindow,
    metrics: Arc<BotMetrics>,
    tracker: Arc<RequestTracker>,
    settings: PipelineSettings,
}

enum Raster {
    Continuous(ShearField),
    Categorical(ClassifiedField),
}

impl Pipeline {
    pub fn new(
        provider: Arc<dyn FieldProvider>,
        cache: Arc<FieldCache>,
        regions: RegionRegistry,
        availability: AvailabilityWindow,
        metrics: Arc<BotMetrics>,
        tracker: Arc<RequestTracker>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            provider,
            cache,
            regions,
            availability,
            metrics,
            tracker,
            settings,
        }
    }

    pub fn region_names(&self) -> Vec<&str> {
        self.regions.names()
    }

    /// Newest timestamp the archive is expected to hold right now.
    pub fn newest_available(&self) -> DateTime<Utc> {
        self.availability.newest_available(Utc::now())
    }

    /// Validate raw user input into a spec. No network work happens here;
    /// a bad date, region, or too-recent time fails before anything else.
    pub fn validate(
        &self,
        product: Product,
        date: &str,
        time: &str,
        region: &str,
        now: DateTime<Utc>,
    ) -> Result<RequestSpec, TurbError> {
        let valid_time = parse_request_datetime(date, time)?;
        let region = self.regions.resolve(region)?;
        self.availability.validate(valid_time, now)?;
        Ok(RequestSpec::new(valid_time, region.name.clone(), product))
    }

    /// Run a dated chart request end to end.
    #[instrument(skip(self))]
    pub async fn handle_chart(
        &self,
        chat_id: i64,
        product: Product,
        date: &str,
        time: &str,
        region: &str,
    ) -> Result<ChartOutcome, TurbError> {
        let received_at = Utc::now();
        self.metrics.record_request(product.slug());
        debug!(chat_id, stage = %Stage::Received, "chart request");

        match self.validate(product, date, time, region, received_at) {
            Ok(spec) => self.run(chat_id, received_at, spec).await,
            Err(err) => {
                self.report(
                    chat_id,
                    received_at,
                    product.slug(),
                    region.to_string(),
                    format!("{} {}", date, time),
                    Stage::Validating,
                    Some(&err),
                )
                .await;
                Err(err)
            }
        }
    }

    /// Run a newest-available request for the given region.
    #[instrument(skip(self))]
    pub async fn handle_latest(
        &self,
        chat_id: i64,
        product: Product,
        region: &str,
    ) -> Result<ChartOutcome, TurbError> {
        let received_at = Utc::now();
        self.metrics.record_request(product.slug());
        debug!(chat_id, stage = %Stage::Received, "latest-chart request");
        let valid_time = self.availability.newest_available(received_at);

        match self.regions.resolve(region) {
            Ok(resolved) => {
                let spec = RequestSpec::new(valid_time, resolved.name.clone(), product);
                self.run(chat_id, received_at, spec).await
            }
            Err(err) => {
                self.report(
                    chat_id,
                    received_at,
                    product.slug(),
                    region.to_string(),
                    valid_time.format("%Y-%m-%d %H:%M").to_string(),
                    Stage::Validating,
                    Some(&err),
                )
                .await;
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        chat_id: i64,
        received_at: DateTime<Utc>,
        spec: RequestSpec,
    ) -> Result<ChartOutcome, TurbError> {
        let mut stage = Stage::Fetching;
        let result = self.execute(&spec, &mut stage).await;

        let valid_time = spec.valid_time.format("%Y-%m-%d %H:%M").to_string();
        match &result {
            Ok(_) => {
                self.report(
                    chat_id,
                    received_at,
                    spec.product.slug(),
                    spec.region.clone(),
                    valid_time,
                    Stage::Delivered,
                    None,
                )
                .await;
            }
            Err(err) => {
                self.report(
                    chat_id,
                    received_at,
                    spec.product.slug(),
                    spec.region.clone(),
                    valid_time,
                    stage,
                    Some(err),
                )
                .await;
            }
        }
        result
    }

    async fn execute(&self, spec: &RequestSpec, stage: &mut Stage) -> Result<ChartOutcome, TurbError> {
        *stage = Stage::Fetching;
        let fields = self.fetch_with_retry(spec.field_key()).await?;

        *stage = Stage::Extracting;
        let region = self.regions.resolve(&spec.region)?;
        let subset = extract_field_set(&fields, &region.bbox)
            .map_err(|e| TurbError::Internal(format!("extraction failed: {}", e)))?;
        debug!(
            nlat = subset.nlat(),
            nlon = subset.nlon(),
            region = %region.name,
            "region extracted"
        );

        *stage = Stage::Computing;
        let thresholds = self.settings.thresholds;
        let raster = match spec.product {
            Product::Turbulence => {
                let vertical = vertical_shear(&subset).map_err(analysis_error)?;
                let horizontal = horizontal_shear(&subset).map_err(analysis_error)?;
                let combined = combined_shear(&vertical, &horizontal).map_err(analysis_error)?;
                let classified = classify_field(&combined, &thresholds);
                debug!(counts = ?classified.counts(), "cells classified");
                Raster::Categorical(classified)
            }
            Product::WindShear => {
                let vertical = vertical_shear(&subset).map_err(analysis_error)?;
                let horizontal = horizontal_shear(&subset).map_err(analysis_error)?;
                Raster::Continuous(combined_shear(&vertical, &horizontal).map_err(analysis_error)?)
            }
            Product::VerticalShear => {
                Raster::Continuous(vertical_shear(&subset).map_err(analysis_error)?)
            }
            Product::HorizontalShear => {
                Raster::Continuous(horizontal_shear(&subset).map_err(analysis_error)?)
            }
        };

        *stage = Stage::Rendering;
        let render_timer = Timer::start();
        let options = RenderOptions {
            panel_width: self.settings.panel_width,
            title: format!("{} - {}", spec.product.title(), region.name),
            subtitle: format!(
                "{} UTC, ERA5 {:.0}/{:.0} hPa",
                spec.valid_time.format("%Y-%m-%d %H:%M"),
                self.settings.levels.lower_hpa,
                self.settings.levels.upper_hpa
            ),
            font_paths: self.settings.font_paths.clone(),
        };
        let scale = ColorScale::shear(
            thresholds.light,
            thresholds.moderate,
            thresholds.severe,
            thresholds.extreme,
        );
        let png = task::spawn_blocking(move || -> Result<Vec<u8>, TurbError> {
            match raster {
                Raster::Continuous(field) => {
                    let extent = extent_of(&field.lats, &field.lons)?;
                    render_continuous(
                        &field.values,
                        field.nlat(),
                        field.nlon(),
                        &extent,
                        &scale,
                        &options,
                    )
                    .map_err(render_error)
                }
                Raster::Categorical(field) => {
                    let extent = extent_of(&field.lats, &field.lons)?;
                    let cells: Vec<Option<u8>> = field
                        .cells
                        .iter()
                        .map(|c| c.map(|cat| cat.index() as u8))
                        .collect();
                    render_categorical(
                        &cells,
                        field.nlat(),
                        field.nlon(),
                        &extent,
                        &CategoryScale::turbulence(),
                        &options,
                    )
                    .map_err(render_error)
                }
            }
        })
        .await
        .map_err(|e| TurbError::Internal(format!("render task failed: {}", e)))??;
        self.metrics.record_render(render_timer.elapsed_ms());

        let filename = format!("{}.png", spec.artifact_stem());
        let path = self.persist(&filename, &png).await;
        let caption = format!(
            "{} for {}, {} UTC (ERA5)",
            spec.product.title(),
            region.name,
            spec.valid_time.format("%Y-%m-%d %H:%M")
        );
        Ok(ChartOutcome {
            png,
            caption,
            filename,
            path,
        })
    }

    /// Fetch through the cache, retrying archive timeouts with doubling
    /// backoff. Every other error surfaces immediately.
    async fn fetch_with_retry(
        &self,
        key: FieldKey,
    ) -> Result<Arc<era5_grid::FieldSet>, TurbError> {
        let mut delay = self.settings.retry_initial_delay;
        let mut attempt = 0u32;
        loop {
            match self.cache.get_or_fetch(key, self.provider.as_ref()).await {
                Ok(fields) => return Ok(fields),
                Err(err) if err.is_retryable() && attempt < self.settings.max_timeout_retries => {
                    attempt += 1;
                    self.metrics.record_retry();
                    warn!(
                        attempt,
                        max = self.settings.max_timeout_retries,
                        delay_secs = delay.as_secs(),
                        "archive timed out, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn persist(&self, filename: &str, png: &[u8]) -> Option<PathBuf> {
        let dir = &self.settings.charts_dir;
        if let Err(err) = tokio::fs::create_dir_all(dir).await {
            warn!(dir = %dir.display(), error = %err, "cannot create charts directory");
            return None;
        }
        let path = dir.join(filename);
        match tokio::fs::write(&path, png).await {
            Ok(()) => {
                debug!(path = %path.display(), bytes = png.len(), "chart persisted");
                Some(path)
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to persist chart");
                None
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn report(
        &self,
        chat_id: i64,
        received_at: DateTime<Utc>,
        product: &str,
        region: String,
        valid_time: String,
        stage_reached: Stage,
        error: Option<&TurbError>,
    ) {
        let duration_ms = (Utc::now() - received_at).num_milliseconds().max(0) as u64;
        let (stage, failed_in, error_kind) = match error {
            None => {
                self.metrics.record_delivered(duration_ms);
                info!(
                    product,
                    region = %region,
                    valid_time = %valid_time,
                    duration_ms,
                    "chart delivered"
                );
                (Stage::Delivered, None, None)
            }
            Some(err) => {
                self.metrics.record_failure(err.kind());
                warn!(
                    product,
                    region = %region,
                    stage = %stage_reached,
                    kind = err.kind(),
                    error = %err,
                    "request failed"
                );
                (
                    Stage::Failed,
                    Some(stage_reached),
                    Some(err.kind().to_string()),
                )
            }
        };
        self.tracker
            .push(RequestReport {
                received_at,
                chat_id,
                product: product.to_string(),
                region,
                valid_time,
                stage,
                failed_in,
                error_kind,
                duration_ms,
            })
            .await;
    }
}

fn extent_of(lats: &[f64], lons: &[f64]) -> Result<MapExtent, TurbError> {
    let north = lats.first().copied().unwrap_or(f64::NAN);
    let south = lats.last().copied().unwrap_or(f64::NAN);
    let west = lons.first().copied().unwrap_or(f64::NAN);
    let east = lons.last().copied().unwrap_or(f64::NAN);
    // Row 0 is the northern edge; longitudes come unwrapped from extraction.
    MapExtent::new(south, north, west, east).map_err(render_error)
}

fn analysis_error(err: AnalysisError) -> TurbError {
    TurbError::Internal(format!("analysis: {}", err))
}

fn render_error(err: RenderError) -> TurbError {
    TurbError::RenderingFailure(err.to_string())
}
