use thiserror::Error;

use crate::db_types::{NewRating, Rating};

/// Post-completion mutual scoring and reputation aggregation.
#[allow(async_fn_in_trait)]
pub trait RatingManagement {
    /// Inserts the rating. Duplicate `(deal, rater, ratee)` submissions are rejected by a
    /// storage-level uniqueness constraint, so concurrent double-submission is safe.
    async fn insert_rating(&self, rating: NewRating) -> Result<Rating, RatingApiError>;

    /// Recomputes the user's aggregate rating as the mean of all received scores, but only once
    /// at least `min_count` ratings exist; below the threshold the stored rating is left alone.
    /// Returns the new aggregate if one was applied.
    async fn recalculate_rating(&self, user_id: i64, min_count: i64) -> Result<Option<f64>, RatingApiError>;

    async fn ratings_for_user(&self, user_id: i64) -> Result<Vec<Rating>, RatingApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum RatingApiError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("No deal with id {0} exists")]
    DealNotFound(i64),
    #[error("Only completed deals can be rated")]
    DealNotCompleted,
    #[error("Only the seller and the buyer rate each other")]
    NotARatingParty,
    #[error("This deal has already been rated by user {0}")]
    DuplicateRating(i64),
    #[error("Score {0} is out of range (1-5)")]
    ScoreOutOfRange(i64),
}

impl From<sqlx::Error> for RatingApiError {
    fn from(e: sqlx::Error) -> Self {
        RatingApiError::DatabaseError(e.to_string())
    }
}

impl From<crate::traits::DealLedgerError> for RatingApiError {
    fn from(e: crate::traits::DealLedgerError) -> Self {
        RatingApiError::DatabaseError(e.to_string())
    }
}
