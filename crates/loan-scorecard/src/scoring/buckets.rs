use serde::{Deserialize, Serialize};

use super::domain::Decision;

/// Threshold band mapping a normalized score to a bucket and decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketBand {
    pub bucket: String,
    pub min_score: f64,
    pub decision: Decision,
}

impl BucketBand {
    pub fn new(bucket: impl Into<String>, min_score: f64, decision: Decision) -> Self {
        Self {
            bucket: bucket.into(),
            min_score,
            decision,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BucketConfigError {
    #[error("bucket table is empty")]
    Empty,
    #[error("bucket '{bucket}' threshold {min_score} is outside [0, 100]")]
    ThresholdOutOfRange { bucket: String, min_score: f64 },
    #[error("threshold {min_score} is used by more than one bucket")]
    DuplicateThreshold { min_score: f64 },
    #[error("bucket '{bucket}' is declared twice")]
    DuplicateBucket { bucket: String },
    #[error("lowest threshold {lowest} leaves scores below it unclassified")]
    NotTotal { lowest: f64 },
}

/// Ordered threshold table, highest threshold first.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketClassifier {
    bands: Vec<BucketBand>,
}

impl BucketClassifier {
    pub fn new(mut bands: Vec<BucketBand>) -> Result<Self, BucketConfigError> {
        if bands.is_empty() {
            return Err(BucketConfigError::Empty);
        }

        for band in &bands {
            if !(band.min_score.is_finite() && (0.0..=100.0).contains(&band.min_score)) {
                return Err(BucketConfigError::ThresholdOutOfRange {
                    bucket: band.bucket.clone(),
                    min_score: band.min_score,
                });
            }
        }

        bands.sort_by(|a, b| b.min_score.total_cmp(&a.min_score));

        for pair in bands.windows(2) {
            if pair[0].min_score == pair[1].min_score {
                return Err(BucketConfigError::DuplicateThreshold {
                    min_score: pair[0].min_score,
                });
            }
        }

        for (index, band) in bands.iter().enumerate() {
            if bands[..index].iter().any(|other| other.bucket == band.bucket) {
                return Err(BucketConfigError::DuplicateBucket {
                    bucket: band.bucket.clone(),
                });
            }
        }

        let lowest = bands[bands.len() - 1].min_score;
        if lowest > 0.0 {
            return Err(BucketConfigError::NotTotal { lowest });
        }

        Ok(Self { bands })
    }

    /// A >= 80 auto-approve, B >= 65 recommend, C >= 50 refer, D >= 0 decline.
    pub fn standard() -> Self {
        Self {
            bands: vec![
                BucketBand::new("A", 80.0, Decision::AutoApprove),
                BucketBand::new("B", 65.0, Decision::Recommend),
                BucketBand::new("C", 50.0, Decision::Refer),
                BucketBand::new("D", 0.0, Decision::Decline),
            ],
        }
    }

    pub fn classify(&self, score: f64) -> &BucketBand {
        let score = if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 100.0)
        };

        self.bands
            .iter()
            .find(|band| score >= band.min_score)
            .unwrap_or_else(|| self.lowest())
    }

    pub fn lowest(&self) -> &BucketBand {
        // `new` rejects empty tables, so a last band always exists.
        &self.bands[self.bands.len() - 1]
    }

    pub fn band_for(&self, bucket: &str) -> Option<&BucketBand> {
        self.bands.iter().find(|band| band.bucket == bucket)
    }

    pub fn bands(&self) -> &[BucketBand] {
        &self.bands
    }
}

impl Default for BucketClassifier {
    fn default() -> Self {
        Self::standard()
    }
}
