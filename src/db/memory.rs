use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{Person, Review, User};
use crate::db::{ReviewStore, UserStore};
use crate::error::DatabaseError;
use crate::Result;

/// In-process store for tests and `database.backend = "memory"` runs.
#[derive(Clone, Default)]
pub struct MemoryStore {
    // keyed by registration number
    users: Arc<RwLock<HashMap<String, User>>>,
    reviews: Arc<RwLock<HashMap<Uuid, Review>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn review_count(&self) -> usize {
        self.reviews.read().await.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: &User) -> Result<User> {
        let mut users = self.users.write().await;

        if users.contains_key(&user.reg_number) {
            return Err(DatabaseError::Duplicate.into());
        }

        users.insert(user.reg_number.clone(), user.clone());
        Ok(user.clone())
    }

    async fn get_user_by_reg_number(&self, reg_number: &str) -> Result<Option<User>> {
        Ok(self.users.read().await.get(reg_number).cloned())
    }

    async fn get_user_by_email_or_reg_number(
        &self,
        vit_email: &str,
        reg_number: &str,
    ) -> Result<Option<User>> {
        let users = self.users.read().await;
        let found = users
            .get(reg_number)
            .or_else(|| users.values().find(|u| u.vit_email == vit_email))
            .cloned();
        Ok(found)
    }

    async fn list_people(&self, exclude: Option<&str>) -> Result<Vec<Person>> {
        let exclude = exclude.filter(|reg| !reg.is_empty());
        let mut people: Vec<Person> = self
            .users
            .read()
            .await
            .values()
            .filter(|u| Some(u.reg_number.as_str()) != exclude)
            .map(|u| Person {
                name: u.name.clone(),
                reg_number: u.reg_number.clone(),
            })
            .collect();

        people.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.reg_number.cmp(&b.reg_number)));
        Ok(people)
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn create_review(&self, review: &Review) -> Result<Review> {
        let mut reviews = self.reviews.write().await;

        if reviews.contains_key(&review.id) {
            return Err(DatabaseError::Duplicate.into());
        }

        reviews.insert(review.id, review.clone());
        Ok(review.clone())
    }

    async fn get_reviews(&self, subject_reg_number: &str, month_year: &str) -> Result<Vec<Review>> {
        let mut found: Vec<Review> = self
            .reviews
            .read()
            .await
            .values()
            .filter(|r| r.subject_reg_number == subject_reg_number && r.month_year == month_year)
            .cloned()
            .collect();

        found.sort_by_key(|r| r.created_at);
        Ok(found)
    }

    async fn delete_reviews_outside(&self, month_year: &str) -> Result<u64> {
        // One write guard for the whole sweep: readers see all or nothing.
        let mut reviews = self.reviews.write().await;
        let before = reviews.len();
        reviews.retain(|_, r| r.month_year == month_year);
        Ok((before - reviews.len()) as u64)
    }
}
