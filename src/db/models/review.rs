use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

/// Author summary embedded in review payloads.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ReviewAuthor {
    pub id: i32,
    pub name: String,
    pub avatar: Option<String>,
}

/// Flat row produced by the review/user join, including whether the
/// requesting user marked the review helpful. `helpful_count` is derived
/// from `review_helpful` and never written directly by a client.
#[derive(Debug, FromRow)]
pub struct ReviewRow {
    pub id: i32,
    pub product_id: i32,
    pub user_id: i32,
    pub rating: i32,
    pub content: String,
    pub helpful_count: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub user_name: String,
    pub user_avatar: Option<String>,
    pub is_helpful: bool,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub id: i32,
    pub product_id: i32,
    pub rating: i32,
    pub content: String,
    pub helpful_count: i32,
    pub is_helpful: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub user: ReviewAuthor,
}

impl From<ReviewRow> for ReviewResponse {
    fn from(row: ReviewRow) -> Self {
        ReviewResponse {
            id: row.id,
            product_id: row.product_id,
            rating: row.rating,
            content: row.content,
            helpful_count: row.helpful_count,
            is_helpful: row.is_helpful,
            created_at: row.created_at,
            updated_at: row.updated_at,
            user: ReviewAuthor {
                id: row.user_id,
                name: row.user_name,
                avatar: row.user_avatar,
            },
        }
    }
}

/// Body of review create/update requests. Fields are optional so that a
/// missing field surfaces as a 400 with a message, not a decode rejection.
#[derive(Deserialize, ToSchema)]
pub struct ReviewInput {
    pub rating: Option<i32>,
    pub content: Option<String>,
}

impl ReviewInput {
    /// Service-layer contract: rating is a required integer in [1,5] and
    /// content must be non-empty after trimming. Nothing reaches the store
    /// until both hold.
    pub fn validate(&self) -> Result<(i32, &str), &'static str> {
        let rating = self.rating.ok_or("Rating and content are required")?;
        let content = self
            .content
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or("Rating and content are required")?;
        if !(1..=5).contains(&rating) {
            return Err("Rating must be between 1 and 5");
        }
        Ok((rating, content))
    }
}

#[derive(Deserialize, ToSchema)]
pub struct MarkHelpfulRequest {
    #[serde(rename = "isHelpful", default = "default_true")]
    pub is_helpful: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize, Deserialize, Debug, IntoParams)]
pub struct ReviewListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort: Option<String>,
}

/// Review list orderings. Unknown sort keys fall back to newest-first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReviewSort {
    DateDesc,
    RatingDesc,
    HelpfulDesc,
}

impl ReviewSort {
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some("rating_desc") => ReviewSort::RatingDesc,
            Some("helpful_desc") => ReviewSort::HelpfulDesc,
            _ => ReviewSort::DateDesc,
        }
    }

    pub fn order_clause(self) -> &'static str {
        match self {
            ReviewSort::DateDesc => "r.created_at DESC",
            ReviewSort::RatingDesc => "r.rating DESC",
            ReviewSort::HelpfulDesc => "r.helpful_count DESC",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(rating: Option<i32>, content: Option<&str>) -> ReviewInput {
        ReviewInput {
            rating,
            content: content.map(String::from),
        }
    }

    #[test]
    fn rating_bounds_are_inclusive() {
        assert!(input(Some(1), Some("ok")).validate().is_ok());
        assert!(input(Some(5), Some("ok")).validate().is_ok());
        assert!(input(Some(0), Some("ok")).validate().is_err());
        assert!(input(Some(6), Some("ok")).validate().is_err());
    }

    #[test]
    fn missing_fields_rejected() {
        assert!(input(None, Some("ok")).validate().is_err());
        assert!(input(Some(3), None).validate().is_err());
    }

    #[test]
    fn blank_content_rejected_and_trimmed() {
        assert!(input(Some(3), Some("   ")).validate().is_err());
        let inp = input(Some(3), Some("  solid  "));
        let (rating, content) = inp.validate().unwrap();
        assert_eq!(rating, 3);
        assert_eq!(content, "solid");
    }

    #[test]
    fn unknown_sort_falls_back_to_date() {
        assert_eq!(ReviewSort::from_param(Some("upside_down")), ReviewSort::DateDesc);
        assert_eq!(ReviewSort::from_param(None), ReviewSort::DateDesc);
        assert_eq!(
            ReviewSort::from_param(Some("helpful_desc")),
            ReviewSort::HelpfulDesc
        );
    }

    #[test]
    fn is_helpful_defaults_to_true() {
        let body: MarkHelpfulRequest = serde_json::from_str("{}").unwrap();
        assert!(body.is_helpful);
        let body: MarkHelpfulRequest = serde_json::from_str(r#"{"isHelpful": false}"#).unwrap();
        assert!(!body.is_helpful);
    }

    #[test]
    fn response_uses_camel_case_wire_names() {
        let row = ReviewRow {
            id: 9,
            product_id: 42,
            user_id: 7,
            rating: 5,
            content: "Great".into(),
            helpful_count: 3,
            created_at: NaiveDateTime::default(),
            updated_at: NaiveDateTime::default(),
            user_name: "Alice".into(),
            user_avatar: None,
            is_helpful: true,
        };
        let json = serde_json::to_value(ReviewResponse::from(row)).unwrap();
        assert_eq!(json["helpfulCount"], 3);
        assert_eq!(json["isHelpful"], true);
        assert_eq!(json["user"]["name"], "Alice");
        assert!(json.get("user_id").is_none());
    }
}
