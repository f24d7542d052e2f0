use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{error, info};

use crate::error::AppError;
use crate::reviews::service::NewReview;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    #[serde(alias = "reviewer_reg_number")]
    pub reviewer_reg_number: String,
    #[serde(alias = "subject_reg_number")]
    pub subject_reg_number: String,
    pub content: String,
    pub rating: i32,
}

#[derive(Debug, Deserialize)]
pub struct ReviewsQuery {
    #[serde(rename = "subjectRegNumber")]
    pub subject_reg_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PeopleQuery {
    #[serde(rename = "excludeRegNumber")]
    pub exclude_reg_number: Option<String>,
}

pub async fn create_review(
    req: web::Json<CreateReviewRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = req.into_inner();
    info!(
        "Received review from {} about {}",
        req.reviewer_reg_number, req.subject_reg_number
    );

    let new_review = NewReview {
        reviewer_reg_number: req.reviewer_reg_number,
        subject_reg_number: req.subject_reg_number,
        content: req.content,
        rating: req.rating,
    };

    match state.review_service.create_review(new_review).await {
        Ok(review) => Ok(HttpResponse::Created().json(serde_json::json!({ "id": review.id }))),
        Err(e) => {
            error!("Review rejected: {}", e);
            Err(e)
        }
    }
}

/// Current-month reviews about `subjectRegNumber`; empty when it is absent.
pub async fn get_reviews(
    query: web::Query<ReviewsQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let subject = query.subject_reg_number.as_deref().unwrap_or_default();
    let reviews = state.review_service.get_reviews(subject).await?;
    Ok(HttpResponse::Ok().json(reviews))
}

pub async fn list_people(
    query: web::Query<PeopleQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let people = state
        .review_service
        .list_people(query.exclude_reg_number.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(people))
}
