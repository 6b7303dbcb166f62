use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewRating, Rating},
    sqlite::db::is_unique_violation,
    traits::RatingApiError,
};

/// The `(deal, rater, ratee)` uniqueness constraint turns a concurrent double-submission into a
/// unique violation, reported as [`RatingApiError::DuplicateRating`].
pub async fn insert_rating(rating: NewRating, conn: &mut SqliteConnection) -> Result<Rating, RatingApiError> {
    let rater_id = rating.rater_id;
    let rating = sqlx::query_as(
        r#"
            INSERT INTO ratings (deal_id, rater_id, ratee_id, score, comment)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(rating.deal_id)
    .bind(rating.rater_id)
    .bind(rating.ratee_id)
    .bind(rating.score)
    .bind(rating.comment)
    .fetch_one(conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            RatingApiError::DuplicateRating(rater_id)
        } else {
            RatingApiError::from(e)
        }
    })?;
    Ok(rating)
}

/// Recomputes the stored aggregate as the mean of every rating the user ever received, but only
/// once `min_count` ratings exist. Below the threshold the default stands, to resist early
/// manipulation by a handful of reviews.
pub async fn recalculate_rating(
    user_id: i64,
    min_count: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<f64>, RatingApiError> {
    let new_rating: Option<f64> = sqlx::query_scalar(
        r#"
            UPDATE users
            SET rating = ROUND((SELECT AVG(score) FROM ratings WHERE ratee_id = $1), 1)
            WHERE user_id = $1
              AND (SELECT COUNT(*) FROM ratings WHERE ratee_id = $1) >= $2
            RETURNING rating;
        "#,
    )
    .bind(user_id)
    .bind(min_count)
    .fetch_optional(conn)
    .await?;
    if let Some(rating) = new_rating {
        debug!("⭐️ Rating of user {user_id} recalculated to {rating:.1}");
    }
    Ok(new_rating)
}

pub async fn ratings_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Rating>, RatingApiError> {
    let ratings = sqlx::query_as("SELECT * FROM ratings WHERE ratee_id = $1 ORDER BY created_at DESC")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(ratings)
}
