use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use std::time::Duration;

use crate::db::models::{Person, Review, User};
use crate::db::{ReviewStore, UserStore};
use crate::Result;

const USER_COLUMNS: &str = "id, name, reg_number, mobile, vit_email, personal_email, team_number, \
     codename, password, residence_type, hostel_type, block_room, created_at";

const REVIEW_COLUMNS: &str =
    "id, reviewer_reg_number, subject_reg_number, content, rating, month_year, created_at";

#[derive(Clone)]
pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    /// Create tables and indexes. Idempotent.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        self.pool.as_ref()
    }

    pub async fn begin_transaction(&self) -> Result<Transaction<'_, Postgres>> {
        Ok(self.pool.as_ref().begin().await?)
    }

    pub async fn create_user_with_transaction(
        &self,
        user: &User,
        transaction: &mut Transaction<'_, Postgres>,
    ) -> Result<User> {
        let query = format!(
            r#"
            INSERT INTO users ({USER_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {USER_COLUMNS}
            "#
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.reg_number)
            .bind(&user.mobile)
            .bind(&user.vit_email)
            .bind(&user.personal_email)
            .bind(&user.team_number)
            .bind(&user.codename)
            .bind(&user.password)
            .bind(&user.residence_type)
            .bind(&user.hostel_type)
            .bind(&user.block_room)
            .bind(user.created_at)
            .fetch_one(&mut **transaction)
            .await?;

        Ok(user)
    }
}

#[async_trait]
impl UserStore for DbOperations {
    async fn create_user(&self, user: &User) -> Result<User> {
        let mut transaction = self.begin_transaction().await?;

        let result = self.create_user_with_transaction(user, &mut transaction).await;

        match result {
            Ok(user) => {
                transaction.commit().await?;
                Ok(user)
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e)
            }
        }
    }

    async fn get_user_by_reg_number(&self, reg_number: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE reg_number = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(reg_number)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    async fn get_user_by_email_or_reg_number(
        &self,
        vit_email: &str,
        reg_number: &str,
    ) -> Result<Option<User>> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE vit_email = $1 OR reg_number = $2 LIMIT 1"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(vit_email)
            .bind(reg_number)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    async fn list_people(&self, exclude: Option<&str>) -> Result<Vec<Person>> {
        let people = match exclude.filter(|reg| !reg.is_empty()) {
            Some(reg_number) => {
                sqlx::query_as::<_, Person>(
                    "SELECT name, reg_number FROM users WHERE reg_number <> $1 ORDER BY name",
                )
                .bind(reg_number)
                .fetch_all(self.pool.as_ref())
                .await?
            }
            None => {
                sqlx::query_as::<_, Person>("SELECT name, reg_number FROM users ORDER BY name")
                    .fetch_all(self.pool.as_ref())
                    .await?
            }
        };

        Ok(people)
    }
}

#[async_trait]
impl ReviewStore for DbOperations {
    async fn create_review(&self, review: &Review) -> Result<Review> {
        let query = format!(
            r#"
            INSERT INTO reviews ({REVIEW_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {REVIEW_COLUMNS}
            "#
        );

        let review = sqlx::query_as::<_, Review>(&query)
            .bind(review.id)
            .bind(&review.reviewer_reg_number)
            .bind(&review.subject_reg_number)
            .bind(&review.content)
            .bind(review.rating)
            .bind(&review.month_year)
            .bind(review.created_at)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(review)
    }

    async fn get_reviews(&self, subject_reg_number: &str, month_year: &str) -> Result<Vec<Review>> {
        let query = format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews \
             WHERE subject_reg_number = $1 AND month_year = $2 ORDER BY created_at"
        );
        let reviews = sqlx::query_as::<_, Review>(&query)
            .bind(subject_reg_number)
            .bind(month_year)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(reviews)
    }

    async fn delete_reviews_outside(&self, month_year: &str) -> Result<u64> {
        let mut transaction = self.begin_transaction().await?;

        let result = sqlx::query("DELETE FROM reviews WHERE month_year <> $1")
            .bind(month_year)
            .execute(&mut *transaction)
            .await;

        match result {
            Ok(result) => {
                transaction.commit().await?;
                Ok(result.rows_affected())
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e.into())
            }
        }
    }
}
