use std::sync::Arc;
use tracing::info;

use crate::db::{Person, Review, ReviewStore, UserStore};
use crate::error::AppError;
use crate::reviews::rotation::{bucket_key, ReviewRotation};
use crate::Result;

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

#[derive(Debug, Clone)]
pub struct NewReview {
    pub reviewer_reg_number: String,
    pub subject_reg_number: String,
    pub content: String,
    pub rating: i32,
}

pub struct ReviewService {
    users: Arc<dyn UserStore>,
    reviews: Arc<dyn ReviewStore>,
    rotation: ReviewRotation,
}

impl ReviewService {
    pub fn new(
        users: Arc<dyn UserStore>,
        reviews: Arc<dyn ReviewStore>,
        rotation: ReviewRotation,
    ) -> Self {
        Self {
            users,
            reviews,
            rotation,
        }
    }

    pub fn rotation(&self) -> &ReviewRotation {
        &self.rotation
    }

    /// Store a review in the current month's bucket. Both parties must be
    /// registered users.
    pub async fn create_review(&self, new_review: NewReview) -> Result<Review> {
        if !(MIN_RATING..=MAX_RATING).contains(&new_review.rating) {
            return Err(AppError::ValidationError(format!(
                "Rating must be between {} and {}",
                MIN_RATING, MAX_RATING
            )));
        }
        if new_review.content.trim().is_empty() {
            return Err(AppError::ValidationError("Review content is required".into()));
        }

        let reviewer = self
            .users
            .get_user_by_reg_number(&new_review.reviewer_reg_number)
            .await?;
        let subject = self
            .users
            .get_user_by_reg_number(&new_review.subject_reg_number)
            .await?;
        if reviewer.is_none() || subject.is_none() {
            return Err(AppError::ValidationError("Reviewer or subject not found".into()));
        }

        let now = self.rotation.now();
        let review = Review::new(
            new_review.reviewer_reg_number,
            new_review.subject_reg_number,
            new_review.content,
            new_review.rating,
            bucket_key(now),
            now,
        );

        let review = self.reviews.create_review(&review).await?;
        info!(
            "Stored review {} for {} in {}",
            review.id, review.subject_reg_number, review.month_year
        );
        Ok(review)
    }

    /// Reviews about `subject_reg_number` from the current month only.
    pub async fn get_reviews(&self, subject_reg_number: &str) -> Result<Vec<Review>> {
        if subject_reg_number.is_empty() {
            return Ok(Vec::new());
        }

        let current = self.rotation.current_bucket_key();
        let mut reviews = self.reviews.get_reviews(subject_reg_number, &current).await?;
        reviews.retain(|r| r.month_year == current);
        Ok(reviews)
    }

    pub async fn list_people(&self, exclude: Option<&str>) -> Result<Vec<Person>> {
        self.users.list_people(exclude).await
    }
}
