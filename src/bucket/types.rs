use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::BucketError;
use crate::constants::DEFAULT_BUCKET_BANDS;

/// Quality tier assigned to a speaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Bucket {
    Excellent,
    Good,
    Average,
    Poor,
    NeedsImprovement,
}

impl Bucket {
    /// All buckets, best first.
    pub const ALL: [Bucket; 5] = [
        Bucket::Excellent,
        Bucket::Good,
        Bucket::Average,
        Bucket::Poor,
        Bucket::NeedsImprovement,
    ];

    /// Ordinal rank; higher is better.
    pub fn rank(self) -> u8 {
        match self {
            Bucket::Excellent => 4,
            Bucket::Good => 3,
            Bucket::Average => 2,
            Bucket::Poor => 1,
            Bucket::NeedsImprovement => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::Excellent => "EXCELLENT",
            Bucket::Good => "GOOD",
            Bucket::Average => "AVERAGE",
            Bucket::Poor => "POOR",
            Bucket::NeedsImprovement => "NEEDS_IMPROVEMENT",
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Bucket {
    type Err = BucketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "EXCELLENT" => Ok(Bucket::Excellent),
            "GOOD" => Ok(Bucket::Good),
            "AVERAGE" => Ok(Bucket::Average),
            "POOR" => Ok(Bucket::Poor),
            "NEEDS_IMPROVEMENT" => Ok(Bucket::NeedsImprovement),
            _ => Err(BucketError::UnknownBucket {
                value: s.to_string(),
            }),
        }
    }
}

/// Lower score bounds mapping a quality score onto a [`Bucket`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketBands {
    pub excellent: f64,
    pub good: f64,
    pub average: f64,
    pub poor: f64,
}

impl Default for BucketBands {
    fn default() -> Self {
        let [excellent, good, average, poor] = DEFAULT_BUCKET_BANDS;
        Self {
            excellent,
            good,
            average,
            poor,
        }
    }
}

impl BucketBands {
    /// Parses `"90,75,55,35"` (EXCELLENT, GOOD, AVERAGE, POOR lower bounds).
    pub fn parse(value: &str) -> Result<Self, BucketError> {
        let parsed: Result<Vec<f64>, _> = value.split(',').map(|p| p.trim().parse()).collect();
        let values = parsed.map_err(|_| BucketError::InvalidBands {
            reason: format!("'{value}' is not a list of numbers"),
        })?;

        let [excellent, good, average, poor]: [f64; 4] =
            values
                .try_into()
                .map_err(|v: Vec<f64>| BucketError::InvalidBands {
                    reason: format!("expected 4 thresholds, got {}", v.len()),
                })?;

        let bands = Self {
            excellent,
            good,
            average,
            poor,
        };
        bands.validate()?;
        Ok(bands)
    }

    /// Thresholds must be finite, strictly descending and within `(0, 100]`.
    pub fn validate(&self) -> Result<(), BucketError> {
        let ordered = [self.excellent, self.good, self.average, self.poor];

        if ordered.iter().any(|t| !t.is_finite() || *t <= 0.0 || *t > 100.0) {
            return Err(BucketError::InvalidBands {
                reason: "thresholds must be within (0, 100]".to_string(),
            });
        }
        if ordered.windows(2).any(|w| w[0] <= w[1]) {
            return Err(BucketError::InvalidBands {
                reason: "thresholds must be strictly descending".to_string(),
            });
        }
        Ok(())
    }

    /// Maps a 0–100 quality score to a bucket. Monotone in `score`.
    pub fn classify(&self, score: f64) -> Bucket {
        if score >= self.excellent {
            Bucket::Excellent
        } else if score >= self.good {
            Bucket::Good
        } else if score >= self.average {
            Bucket::Average
        } else if score >= self.poor {
            Bucket::Poor
        } else {
            Bucket::NeedsImprovement
        }
    }
}

/// Why a bucket changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionReason {
    /// Applied from an evaluation-driven proposal.
    Automatic,
    /// Operator override.
    Manual,
}

impl std::fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionReason::Automatic => f.write_str("AUTOMATIC"),
            TransitionReason::Manual => f.write_str("MANUAL"),
        }
    }
}

/// A reassignment the evaluation engine recommends but does not apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketProposal {
    pub speaker_id: String,
    pub from_bucket: Bucket,
    pub to_bucket: Bucket,
    pub evaluation_id: String,
}

/// Append-only audit record of an applied bucket change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketTransition {
    pub speaker_id: String,
    pub previous_bucket: Bucket,
    pub new_bucket: Bucket,
    pub evaluation_id: Option<String>,
    pub reason: TransitionReason,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}
