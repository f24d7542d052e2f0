use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub reg_number: String,
    pub mobile: String,
    pub vit_email: String,
    pub personal_email: String,
    pub team_number: String,
    pub codename: String,
    /// Credential record, never the plain password.
    #[serde(skip_serializing)]
    pub password: String,
    pub residence_type: String,
    pub hostel_type: Option<String>,
    pub block_room: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Profile fields supplied at signup.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub reg_number: String,
    pub mobile: String,
    pub vit_email: String,
    pub personal_email: String,
    pub team_number: String,
    pub codename: String,
    pub residence_type: String,
    pub hostel_type: Option<String>,
    pub block_room: Option<String>,
}

impl User {
    pub fn new(profile: NewUser, password_record: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: profile.name,
            reg_number: profile.reg_number,
            mobile: profile.mobile,
            vit_email: profile.vit_email,
            personal_email: profile.personal_email,
            team_number: profile.team_number,
            codename: profile.codename,
            password: password_record,
            residence_type: profile.residence_type,
            hostel_type: profile.hostel_type,
            block_room: profile.block_room,
            created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub reviewer_reg_number: String,
    pub subject_reg_number: String,
    pub content: String,
    pub rating: i32,
    /// Bucket key (`YYYY-MM`) of the month the review was written in.
    pub month_year: String,
    pub created_at: DateTime<Utc>,
}

impl Review {
    pub fn new(
        reviewer_reg_number: String,
        subject_reg_number: String,
        content: String,
        rating: i32,
        month_year: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            reviewer_reg_number,
            subject_reg_number,
            content,
            rating,
            month_year,
            created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Person {
    pub name: String,
    #[serde(rename = "regNumber")]
    pub reg_number: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_serialization_omits_password() {
        let user = User::new(
            NewUser {
                name: "Asha".into(),
                reg_number: "21BCE0001".into(),
                mobile: "9999999999".into(),
                vit_email: "asha@vitstudent.ac.in".into(),
                personal_email: "asha@example.com".into(),
                team_number: "7".into(),
                codename: "falcon".into(),
                residence_type: "hosteller".into(),
                hostel_type: Some("MH".into()),
                block_room: None,
            },
            "pbkdf2_sha256$1$c2FsdA$a2V5".into(),
            Utc::now(),
        );

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["reg_number"], "21BCE0001");
    }

    #[test]
    fn test_person_uses_camel_case_reg_number() {
        let person = Person {
            name: "Asha".into(),
            reg_number: "21BCE0001".into(),
        };
        let json = serde_json::to_value(&person).unwrap();
        assert_eq!(json, serde_json::json!({"name": "Asha", "regNumber": "21BCE0001"}));
    }
}
