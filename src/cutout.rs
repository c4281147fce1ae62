//! Batch driver for cutout-image downloads.
//!
//! The actual survey clients live outside this crate; they plug in through
//! [`CutoutSource`]. A failed request is logged and counted, and the batch
//! moves on to the next target.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::geom::SkyPosition;

/// Container the survey should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CutoutFormat {
    /// Floating-point array container (e.g. FITS).
    FloatArray,
    /// 8-bit raster (e.g. PNG/JPEG).
    Raster8,
}

/// Parameters shared by every cutout in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutoutSpec {
    pub survey: String,
    pub fov_arcmin: f64,
    pub width_px: u32,
    pub height_px: u32,
    pub format: CutoutFormat,
}

/// One image to fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct CutoutRequest<'a> {
    /// Name used for logging and by the sink, typically the object name.
    pub label: &'a str,
    pub position: SkyPosition,
    pub spec: &'a CutoutSpec,
}

#[derive(Error, Debug)]
pub enum CutoutError {
    #[error("survey {survey} has no coverage at {position}")]
    NoCoverage { survey: String, position: SkyPosition },

    #[error("request failed: {0}")]
    Request(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A service that turns a request into an encoded image buffer.
pub trait CutoutSource {
    fn fetch(&mut self, request: &CutoutRequest<'_>) -> Result<Vec<u8>, CutoutError>;
}

/// Outcome of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub requested: usize,
    pub saved: usize,
    pub failed: usize,
    /// Labels of failed targets, in order.
    pub failures: Vec<String>,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requested, {} saved, {} failed",
            self.requested, self.saved, self.failed
        )
    }
}

/// Fetch a cutout for every target and hand each buffer to `sink`.
///
/// Errors from either the source or the sink are logged per target; they
/// never stop the loop.
pub fn fetch_batch<S, F>(
    source: &mut S,
    targets: &[(String, SkyPosition)],
    spec: &CutoutSpec,
    mut sink: F,
) -> BatchSummary
where
    S: CutoutSource + ?Sized,
    F: FnMut(&CutoutRequest<'_>, Vec<u8>) -> Result<(), CutoutError>,
{
    let mut summary = BatchSummary {
        requested: targets.len(),
        ..BatchSummary::default()
    };

    for (label, position) in targets {
        let request = CutoutRequest {
            label,
            position: *position,
            spec,
        };
        let result = source.fetch(&request).and_then(|buf| sink(&request, buf));
        match result {
            Ok(()) => summary.saved += 1,
            Err(e) => {
                warn!(target = %label, survey = %spec.survey, error = %e, "cutout failed");
                summary.failed += 1;
                summary.failures.push(label.clone());
            }
        }
    }

    info!(survey = %spec.survey, "{summary}");
    summary
}
