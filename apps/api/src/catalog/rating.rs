//! Running-mean rating aggregation.
//!
//! Individual samples are never stored: a prompt only keeps its current mean and
//! the number of samples folded into it.

use anyhow::anyhow;
use serde_json::Value;

use crate::errors::AppError;
use crate::models::prompt::RatingUpdate;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// A validated rating sample in `[MIN_RATING, MAX_RATING]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingSample(u8);

impl RatingSample {
    pub fn new(value: u8) -> Result<Self, AppError> {
        if (MIN_RATING..=MAX_RATING).contains(&value) {
            Ok(Self(value))
        } else {
            Err(invalid_rating())
        }
    }

    /// Validates the untyped `rating` field of a request body.
    /// Only JSON numbers with an integral value in range are accepted.
    pub fn from_json(body: &Value) -> Result<Self, AppError> {
        let raw = body.get("rating").ok_or_else(invalid_rating)?;
        let number = raw.as_f64().ok_or_else(invalid_rating)?;
        if !number.is_finite() || number.fract() != 0.0 {
            return Err(invalid_rating());
        }
        if number < f64::from(MIN_RATING) || number > f64::from(MAX_RATING) {
            return Err(invalid_rating());
        }
        Self::new(number as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

fn invalid_rating() -> AppError {
    AppError::Validation(format!(
        "Invalid rating. Must be a whole number between {MIN_RATING} and {MAX_RATING}."
    ))
}

/// Stored rating state of one prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningMean {
    /// `None` until the first sample arrives.
    pub mean: Option<f64>,
    pub count: i32,
}

impl RunningMean {
    /// Folds one sample into the mean.
    ///
    /// The first sample sets the mean directly; a missing prior mean is never
    /// treated as zero.
    pub fn push(self, sample: RatingSample) -> Result<RatingUpdate, AppError> {
        let new_count = self
            .count
            .checked_add(1)
            .ok_or_else(|| AppError::Internal(anyhow!("rating count overflow")))?;
        let sample = f64::from(sample.value());

        let new_mean = match self.mean {
            Some(mean) if self.count > 0 => {
                (mean * f64::from(self.count) + sample) / f64::from(new_count)
            }
            _ => sample,
        };

        Ok(RatingUpdate {
            new_rating: new_mean.clamp(f64::from(MIN_RATING), f64::from(MAX_RATING)),
            new_count,
        })
    }
}

impl From<RatingUpdate> for RunningMean {
    fn from(update: RatingUpdate) -> Self {
        RunningMean {
            mean: Some(update.new_rating),
            count: update.new_count,
        }
    }
}
