use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

#[derive(Serialize, Deserialize, Debug, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub description: String,
    #[schema(value_type = f64)]
    pub price: BigDecimal,
    pub category_id: i32,
    pub user_id: i32,
    /// Mean of all review ratings; None while the product has no reviews.
    #[schema(value_type = Option<f64>)]
    pub rating: Option<BigDecimal>,
    pub review_count: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// One row of the catalog listing, with the category name and primary image
/// joined in.
#[derive(Serialize, Deserialize, Debug, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: i32,
    pub name: String,
    pub slug: String,
    #[schema(value_type = f64)]
    pub price: BigDecimal,
    #[schema(value_type = Option<f64>)]
    pub rating: Option<BigDecimal>,
    pub review_count: i32,
    pub category_id: i32,
    pub category_name: String,
    pub image: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, FromRow, ToSchema)]
pub struct Specification {
    pub name: String,
    pub value: String,
}

/// Full product detail. The bookmark/review flags are personalized for an
/// authenticated caller and false for anonymous requests.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub category_name: String,
    pub specifications: Vec<Specification>,
    pub images: Vec<String>,
    pub is_bookmarked: bool,
    pub is_reviewed: bool,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = f64)]
    pub price: BigDecimal,
    pub category_id: i32,
    pub specifications: Option<Vec<Specification>>,
    /// Image paths/URLs; the first one becomes the primary image.
    pub images: Option<Vec<String>>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<f64>)]
    pub price: Option<BigDecimal>,
    pub category_id: Option<i32>,
    /// When present, replaces the full specification list.
    pub specifications: Option<Vec<Specification>>,
    /// When present, replaces the full image list.
    pub images: Option<Vec<String>>,
}

impl UpdateProduct {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.category_id.is_none()
            && self.specifications.is_none()
            && self.images.is_none()
    }
}

#[derive(Serialize, Deserialize, Debug, IntoParams)]
pub struct ProductFilterParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<i32>,
    pub search: Option<String>,
    pub sort: Option<String>,
}

/// Catalog sort orders. Unknown query values fall back to newest-first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProductSort {
    PriceAsc,
    PriceDesc,
    RatingDesc,
    Newest,
}

impl ProductSort {
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some("price_asc") => ProductSort::PriceAsc,
            Some("price_desc") => ProductSort::PriceDesc,
            Some("rating_desc") => ProductSort::RatingDesc,
            _ => ProductSort::Newest,
        }
    }

    pub fn order_clause(self) -> &'static str {
        match self {
            ProductSort::PriceAsc => "p.price ASC",
            ProductSort::PriceDesc => "p.price DESC",
            ProductSort::RatingDesc => "p.rating DESC NULLS LAST, p.review_count DESC",
            ProductSort::Newest => "p.created_at DESC, p.id DESC",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sort_falls_back_to_newest() {
        assert_eq!(ProductSort::from_param(Some("sideways")), ProductSort::Newest);
        assert_eq!(ProductSort::from_param(None), ProductSort::Newest);
        assert_eq!(
            ProductSort::from_param(Some("price_asc")),
            ProductSort::PriceAsc
        );
    }

    #[test]
    fn rating_sort_pushes_unrated_last() {
        assert!(ProductSort::RatingDesc.order_clause().contains("NULLS LAST"));
    }
}
