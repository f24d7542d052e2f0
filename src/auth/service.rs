use chrono::Duration;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::password::{hash_password, verify_password};
use crate::auth::token::{Claims, TokenIssuer};
use crate::clock::Clock;
use crate::db::{NewUser, User, UserStore};
use crate::error::{AppError, AuthError, DatabaseError};
use crate::Result;

pub const MIN_PASSWORD_LENGTH: usize = 6;

pub struct AuthService {
    users: Arc<dyn UserStore>,
    issuer: TokenIssuer,
    token_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        issuer: TokenIssuer,
        token_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            issuer,
            token_ttl,
            clock,
        }
    }

    /// Register a user and return a bearer token whose subject is the VIT
    /// email. Rejected when the email or the registration number is taken.
    pub async fn signup(&self, profile: NewUser, password: String) -> Result<String> {
        validate_signup(&profile, &password)?;

        if self
            .users
            .get_user_by_email_or_reg_number(&profile.vit_email, &profile.reg_number)
            .await?
            .is_some()
        {
            return Err(AuthError::UserExists.into());
        }

        let record = tokio::task::spawn_blocking(move || hash_password(&password)).await??;

        let user = User::new(profile, record, self.clock.now());
        let user = match self.users.create_user(&user).await {
            Ok(user) => user,
            // Lost a race with a concurrent signup for the same number.
            Err(AppError::DatabaseError(DatabaseError::Duplicate)) => {
                return Err(AuthError::UserExists.into());
            }
            Err(e) => return Err(e),
        };
        info!("Registered user {}", user.reg_number);

        let claims = Claims::new()
            .with("sub", user.vit_email.as_str())
            .with("reg_number", user.reg_number.as_str());
        self.issue(&claims)
    }

    /// Log in by registration number. The token subject is the registration
    /// number.
    pub async fn login(&self, reg_number: &str, password: &str) -> Result<String> {
        let Some(user) = self.users.get_user_by_reg_number(reg_number).await? else {
            warn!("Login for unknown registration number {}", reg_number);
            return Err(AuthError::InvalidCredentials.into());
        };

        let plain = password.to_string();
        let record = user.password.clone();
        let valid = tokio::task::spawn_blocking(move || verify_password(&plain, &record)).await?;
        if !valid {
            warn!("Wrong password for {}", reg_number);
            return Err(AuthError::InvalidCredentials.into());
        }

        let claims = Claims::new()
            .with("sub", reg_number)
            .with("reg_number", user.reg_number.as_str());
        self.issue(&claims)
    }

    pub fn validate_token(&self, token: &str) -> std::result::Result<Claims, AuthError> {
        self.issuer.verify_at(token, self.clock.now())
    }

    fn issue(&self, claims: &Claims) -> Result<String> {
        self.issuer.issue_at(claims, self.token_ttl, self.clock.now())
    }
}

fn validate_signup(profile: &NewUser, password: &str) -> Result<()> {
    let required = [
        ("name", &profile.name),
        ("regNumber", &profile.reg_number),
        ("mobile", &profile.mobile),
        ("teamNumber", &profile.team_number),
        ("codename", &profile.codename),
        ("residenceType", &profile.residence_type),
    ];
    if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(AppError::ValidationError(format!("{} is required", field)));
    }

    for (field, email) in [
        ("vitEmail", &profile.vit_email),
        ("personalEmail", &profile.personal_email),
    ] {
        if !looks_like_email(email) {
            return Err(AppError::ValidationError(format!("{} is not a valid email", field)));
        }
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::ValidationError(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    Ok(())
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
