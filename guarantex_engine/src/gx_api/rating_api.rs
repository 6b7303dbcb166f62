use log::*;

use crate::{
    config::EngineConfig,
    db_types::{DealStatus, NewRating, Rating},
    traits::{DealLedgerDatabase, RatingApiError, RatingManagement},
};

/// Post-completion mutual scoring.
///
/// Seller and buyer rate each other, once per deal and direction; guarantors neither rate nor
/// get rated. The ratee's aggregate only departs from the 5.0 default once enough ratings have
/// accumulated, which blunts early manipulation by a handful of reviews.
pub struct RatingApi<B> {
    db: B,
    config: EngineConfig,
}

impl<B> RatingApi<B>
where B: RatingManagement + DealLedgerDatabase
{
    pub fn new(db: B, config: EngineConfig) -> Self {
        Self { db, config }
    }

    /// Rates the counterparty of `rater_id` in the given deal.
    ///
    /// Valid only on `completed` deals; the ratee is deduced as the other of {seller, buyer}.
    /// A duplicate submission (including a concurrent double-click) is rejected by the store's
    /// uniqueness constraint.
    pub async fn rate(
        &self,
        deal_id: i64,
        rater_id: i64,
        score: i64,
        comment: Option<&str>,
    ) -> Result<Rating, RatingApiError> {
        if !(1..=5).contains(&score) {
            return Err(RatingApiError::ScoreOutOfRange(score));
        }
        let deal = self.db.fetch_deal_by_id(deal_id).await?.ok_or(RatingApiError::DealNotFound(deal_id))?;
        if deal.status != DealStatus::Completed {
            return Err(RatingApiError::DealNotCompleted);
        }
        let ratee_id = deal.counterparty_of(rater_id).ok_or(RatingApiError::NotARatingParty)?;
        let rating = self
            .db
            .insert_rating(NewRating { deal_id, rater_id, ratee_id, score, comment: comment.map(String::from) })
            .await?;
        match self.db.recalculate_rating(ratee_id, self.config.min_ratings_for_average).await? {
            Some(aggregate) => {
                debug!("⭐️ User {rater_id} rated {ratee_id} {score}/5; aggregate now {aggregate:.1}")
            },
            None => debug!(
                "⭐️ User {rater_id} rated {ratee_id} {score}/5; below the {}-rating threshold, default stands",
                self.config.min_ratings_for_average
            ),
        }
        Ok(rating)
    }

    pub async fn ratings_for_user(&self, user_id: i64) -> Result<Vec<Rating>, RatingApiError> {
        self.db.ratings_for_user(user_id).await
    }
}
