use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::db::NewUser;
use crate::error::{AppError, AuthError};
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: String,
    #[serde(alias = "reg_number")]
    pub reg_number: String,
    pub mobile: String,
    #[serde(alias = "vit_email")]
    pub vit_email: String,
    #[serde(alias = "personal_email")]
    pub personal_email: String,
    #[serde(alias = "team_number")]
    pub team_number: String,
    pub codename: String,
    pub password: String,
    #[serde(alias = "residence_type")]
    pub residence_type: String,
    #[serde(default, alias = "hostel_type")]
    pub hostel_type: Option<String>,
    #[serde(default, alias = "block_room")]
    pub block_room: Option<String>,
}

impl SignupRequest {
    fn into_parts(self) -> (NewUser, String) {
        let profile = NewUser {
            name: self.name,
            reg_number: self.reg_number,
            mobile: self.mobile,
            vit_email: self.vit_email,
            personal_email: self.personal_email,
            team_number: self.team_number,
            codename: self.codename,
            residence_type: self.residence_type,
            hostel_type: self.hostel_type,
            block_room: self.block_room,
        };
        (profile, self.password)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(alias = "reg_number")]
    pub reg_number: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Same value as `access_token`; older clients read this field.
    pub token: String,
}

impl TokenResponse {
    pub fn bearer(token: String) -> Self {
        Self {
            access_token: token.clone(),
            token_type: "bearer".to_string(),
            token,
        }
    }
}

pub async fn signup(
    req: web::Json<SignupRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let (profile, password) = req.into_inner().into_parts();
    let reg_number = profile.reg_number.clone();
    info!("Received signup request for {}", reg_number);

    match state.auth_service.signup(profile, password).await {
        Ok(token) => {
            info!("Signup successful for {}", reg_number);
            Ok(HttpResponse::Ok().json(TokenResponse::bearer(token)))
        }
        Err(e) => {
            error!("Signup failed for {}: {}", reg_number, e);
            Err(e)
        }
    }
}

pub async fn login(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received login request for {}", req.reg_number);
    match state.auth_service.login(&req.reg_number, &req.password).await {
        Ok(token) => {
            info!("Login successful for {}", req.reg_number);
            Ok(HttpResponse::Ok().json(TokenResponse::bearer(token)))
        }
        Err(e) => {
            error!("Login failed for {}: {}", req.reg_number, e);
            Err(e)
        }
    }
}

/// Claims of the presented bearer token.
pub async fn me(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req).ok_or(AuthError::MissingToken)?;
    let claims = state.auth_service.validate_token(token)?;
    Ok(HttpResponse::Ok().json(claims))
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.trim().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|t| !t.is_empty())
}
