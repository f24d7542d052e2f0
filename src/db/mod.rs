//! Persistence for users and reviews.
//!
//! Services talk to the [`UserStore`] and [`ReviewStore`] traits;
//! [`DbOperations`] backs them with Postgres and [`MemoryStore`] keeps
//! everything in process.

pub mod memory;
pub mod models;
pub mod operations;

use async_trait::async_trait;

use crate::Result;

pub use memory::MemoryStore;
pub use models::{NewUser, Person, Review, User};
pub use operations::DbOperations;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user. A taken registration number is
    /// `DatabaseError::Duplicate`.
    async fn create_user(&self, user: &User) -> Result<User>;

    async fn get_user_by_reg_number(&self, reg_number: &str) -> Result<Option<User>>;

    async fn get_user_by_email_or_reg_number(
        &self,
        vit_email: &str,
        reg_number: &str,
    ) -> Result<Option<User>>;

    /// Everyone's name and registration number, minus `exclude` if given.
    async fn list_people(&self, exclude: Option<&str>) -> Result<Vec<Person>>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn create_review(&self, review: &Review) -> Result<Review>;

    async fn get_reviews(&self, subject_reg_number: &str, month_year: &str) -> Result<Vec<Review>>;

    /// Delete every review whose bucket is not `month_year` in a single
    /// statement. Returns the number of rows removed.
    async fn delete_reviews_outside(&self, month_year: &str) -> Result<u64>;
}
