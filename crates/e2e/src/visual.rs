//! Visual regression snapshots
//!
//! Compares page screenshots against committed baselines: a SHA-256 hash
//! short-circuits identical files, otherwise pixels are compared with a
//! small per-channel tolerance for anti-aliasing noise and the failing
//! pixels are written out as a diff image.

use std::path::{Path, PathBuf};

use image::{GenericImageView, Pixel, RgbaImage};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

/// Per-channel difference below which two pixels count as equal
const CHANNEL_TOLERANCE: i32 = 5;

/// Result of one snapshot comparison
#[derive(Debug, Clone)]
pub struct VisualDiff {
    pub matches: bool,
    pub diff_percent: f64,
    pub diff_pixels: u64,
    pub total_pixels: u64,
    pub diff_image_path: Option<PathBuf>,
}

/// Configuration for visual comparisons
#[derive(Debug, Clone)]
pub struct VisualConfig {
    pub baseline_dir: PathBuf,
    pub actual_dir: PathBuf,
    pub diff_dir: PathBuf,
    /// Allowed differing pixels, in percent
    pub threshold: f64,
    /// Create missing baselines from the actual screenshot
    pub auto_update: bool,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            baseline_dir: PathBuf::from("test-results/baselines"),
            actual_dir: PathBuf::from("test-results/screenshots"),
            diff_dir: PathBuf::from("test-results/diffs"),
            threshold: 0.5,
            auto_update: false,
        }
    }
}

/// Snapshot comparison against committed baselines
pub struct VisualTester {
    config: VisualConfig,
}

impl VisualTester {
    pub fn new(config: VisualConfig) -> E2eResult<Self> {
        std::fs::create_dir_all(&config.baseline_dir)?;
        std::fs::create_dir_all(&config.actual_dir)?;
        std::fs::create_dir_all(&config.diff_dir)?;
        Ok(Self { config })
    }

    /// Where a screenshot named `name` should be written for comparison.
    pub fn actual_path(&self, name: &str) -> PathBuf {
        self.config.actual_dir.join(format!("{name}.png"))
    }

    /// Compare the named screenshot against its baseline.
    pub fn compare(&self, name: &str) -> E2eResult<VisualDiff> {
        let actual_path = self.actual_path(name);
        let baseline_path = self.config.baseline_dir.join(format!("{name}.png"));

        if !actual_path.exists() {
            return Err(E2eError::Assertion(format!(
                "screenshot `{name}` was never taken ({})",
                actual_path.display()
            )));
        }
        if !baseline_path.exists() {
            if self.config.auto_update {
                info!("creating baseline for `{name}`");
                std::fs::copy(&actual_path, &baseline_path)?;
                return Ok(VisualDiff {
                    matches: true,
                    diff_percent: 0.0,
                    diff_pixels: 0,
                    total_pixels: 0,
                    diff_image_path: None,
                });
            }
            return Err(E2eError::BaselineNotFound(
                baseline_path.to_string_lossy().to_string(),
            ));
        }

        if hash_file(&actual_path)? == hash_file(&baseline_path)? {
            debug!("`{name}` matches its baseline exactly");
            let actual = image::open(&actual_path)?;
            let (width, height) = actual.dimensions();
            return Ok(VisualDiff {
                matches: true,
                diff_percent: 0.0,
                diff_pixels: 0,
                total_pixels: u64::from(width) * u64::from(height),
                diff_image_path: None,
            });
        }

        let actual = image::open(&actual_path)?.to_rgba8();
        let baseline = image::open(&baseline_path)?.to_rgba8();
        if actual.dimensions() != baseline.dimensions() {
            warn!(
                "`{name}` dimensions differ: actual {:?} vs baseline {:?}",
                actual.dimensions(),
                baseline.dimensions()
            );
        }

        let (width, height) = actual.dimensions();
        let mut diff_image = RgbaImage::new(width, height);
        let mut diff_pixels = 0u64;
        let total_pixels = u64::from(width) * u64::from(height);

        for y in 0..height.min(baseline.height()) {
            for x in 0..width.min(baseline.width()) {
                let a = actual.get_pixel(x, y);
                let b = baseline.get_pixel(x, y);
                if pixels_differ(a, b) {
                    diff_pixels += 1;
                    diff_image.put_pixel(x, y, image::Rgba([255, 0, 0, 255]));
                } else {
                    let channels = a.channels();
                    diff_image.put_pixel(
                        x,
                        y,
                        image::Rgba([channels[0] / 2, channels[1] / 2, channels[2] / 2, 128]),
                    );
                }
            }
        }

        let diff_percent = (diff_pixels as f64 / total_pixels as f64) * 100.0;
        let matches = diff_percent <= self.config.threshold;

        let diff_image_path = if diff_pixels > 0 {
            let path = self.config.diff_dir.join(format!("{name}-diff.png"));
            diff_image.save(&path)?;
            Some(path)
        } else {
            None
        };

        if !matches {
            warn!(
                "visual regression in `{name}`: {diff_percent:.2}% pixels differ \
                 (threshold {:.2}%)",
                self.config.threshold
            );
        }

        Ok(VisualDiff {
            matches,
            diff_percent,
            diff_pixels,
            total_pixels,
            diff_image_path,
        })
    }

    /// Fail the test when the named screenshot regressed.
    pub fn assert_matches(&self, name: &str) -> E2eResult<()> {
        let diff = self.compare(name)?;
        if !diff.matches {
            return Err(E2eError::ScreenshotMismatch {
                name: name.to_string(),
                diff_percent: diff.diff_percent,
                threshold: self.config.threshold,
            });
        }
        Ok(())
    }

    /// Promote the actual screenshot to baseline.
    pub fn update_baseline(&self, name: &str) -> E2eResult<()> {
        let actual_path = self.actual_path(name);
        if !actual_path.exists() {
            return Err(E2eError::Assertion(format!(
                "cannot update baseline `{name}`: no actual screenshot at {}",
                actual_path.display()
            )));
        }
        let baseline_path = self.config.baseline_dir.join(format!("{name}.png"));
        std::fs::copy(&actual_path, &baseline_path)?;
        info!("updated baseline for `{name}`");
        Ok(())
    }
}

fn pixels_differ(a: &image::Rgba<u8>, b: &image::Rgba<u8>) -> bool {
    let a = a.channels();
    let b = b.channels();
    (0..4).any(|i| (i32::from(a[i]) - i32::from(b[i])).abs() > CHANNEL_TOLERANCE)
}

fn hash_file(path: &Path) -> E2eResult<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}
