//! Field acquisition seam.
//!
//! [`FieldProvider`] is the boundary the pipeline fetches global fields
//! through. The production implementation downloads from the CDS archive and
//! decodes NetCDF; tests substitute synthetic fields.

use std::path::PathBuf;

use async_trait::async_trait;
use cds_client::{CdsError, Client, Era5Request};
use era5_grid::{read_field_set, FieldSet, LevelPair};
use metrics::histogram;
use tracing::{info, instrument, warn};
use turb_common::{FieldKey, TurbError};

use crate::metrics::Timer;

/// Source of global (u, v, z) fields for one valid time.
#[async_trait]
pub trait FieldProvider: Send + Sync {
    async fn fetch(&self, key: &FieldKey) -> Result<FieldSet, TurbError>;
}

/// Fetches ERA5 pressure-level files from the CDS archive.
///
/// Downloads are kept on disk keyed by (date, hour) and reused across
/// process restarts. A file that no longer decodes is deleted and fetched
/// again rather than poisoning the cache.
pub struct CdsFieldProvider {
    client: Client,
    data_dir: PathBuf,
    levels: LevelPair,
}

impl CdsFieldProvider {
    pub fn new(client: Client, data_dir: PathBuf, levels: LevelPair) -> Self {
        Self {
            client,
            data_dir,
            levels,
        }
    }

    fn field_path(&self, key: &FieldKey) -> PathBuf {
        self.data_dir.join(format!(
            "era5_{}_{:02}z.nc",
            key.date.format("%Y%m%d"),
            key.hour
        ))
    }
}

#[async_trait]
impl FieldProvider for CdsFieldProvider {
    #[instrument(skip(self), fields(date = %key.date, hour = key.hour))]
    async fn fetch(&self, key: &FieldKey) -> Result<FieldSet, TurbError> {
        let path = self.field_path(key);

        if path.exists() {
            match decode(path.clone(), self.levels).await {
                Ok(fields) => {
                    info!(path = %path.display(), "Reusing downloaded field file");
                    return Ok(fields);
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "Stored field file unreadable, fetching again"
                    );
                    let _ = tokio::fs::remove_file(&path).await;
                }
            }
        }

        let request = Era5Request::for_key(key, &self.levels.request_levels());
        let timer = Timer::start();
        self.client
            .retrieve(&request, &path)
            .await
            .map_err(map_cds_error)?;
        histogram!("cds_download_duration_ms").record(timer.elapsed_ms() as f64);

        match decode(path.clone(), self.levels).await {
            Ok(fields) => Ok(fields),
            Err(err) => {
                // A fresh download that cannot be decoded must not linger,
                // or every later request would trip over it.
                let _ = tokio::fs::remove_file(&path).await;
                Err(err)
            }
        }
    }
}

/// NetCDF decode is synchronous; run it off the async workers.
async fn decode(path: PathBuf, levels: LevelPair) -> Result<FieldSet, TurbError> {
    let decoded = tokio::task::spawn_blocking(move || read_field_set(&path, levels))
        .await
        .map_err(|e| TurbError::Internal(format!("decode task failed: {}", e)))?;
    decoded.map_err(|e| TurbError::DataCorrupt(e.to_string()))
}

fn map_cds_error(err: CdsError) -> TurbError {
    match err {
        CdsError::NoData(msg) => TurbError::DataUnavailable(msg),
        CdsError::Rejected(msg) => TurbError::DataUnavailable(msg),
        CdsError::JobFailed { job_id, reason } => {
            TurbError::DataUnavailable(format!("archive job {} failed: {}", job_id, reason))
        }
        CdsError::Timeout { .. } => TurbError::DataTimeout,
        CdsError::Transport(e) => TurbError::DataUnavailable(format!("archive unreachable: {}", e)),
        CdsError::Config(msg) => TurbError::Internal(msg),
        CdsError::Io(e) => TurbError::Internal(e.to_string()),
        CdsError::Protocol(msg) => TurbError::Internal(format!("archive protocol: {}", msg)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cds_error_mapping() {
        let err = map_cds_error(CdsError::NoData(
            "the latest date available for this dataset is: 2024-11-21 00:00".to_string(),
        ));
        match err {
            TurbError::DataUnavailable(msg) => assert!(msg.contains("2024-11-21 00:00")),
            other => panic!("expected DataUnavailable, got {:?}", other),
        }

        assert!(matches!(
            map_cds_error(CdsError::Timeout {
                job_id: "j1".to_string(),
                waited_secs: 600,
            }),
            TurbError::DataTimeout
        ));
        assert!(matches!(
            map_cds_error(CdsError::Config("no api key".to_string())),
            TurbError::Internal(_)
        ));
    }

    #[test]
    fn test_field_path_layout() {
        let client = Client::new(cds_client::CdsConfig::new(
            "https://cds.example/api/v2",
            "1234:secret",
        ))
        .unwrap();
        let levels = LevelPair::new(500.0, 300.0).unwrap();
        let provider = CdsFieldProvider::new(client, PathBuf::from("/data/era5"), levels);
        let key = FieldKey {
            date: chrono::NaiveDate::from_ymd_opt(2024, 11, 24).unwrap(),
            hour: 9,
        };
        assert_eq!(
            provider.field_path(&key),
            PathBuf::from("/data/era5/era5_20241124_09z.nc")
        );
    }
}
