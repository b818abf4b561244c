use serde::Serialize;
use utoipa::ToSchema;

/// Outcome of the bookmark toggle.
#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkToggle {
    pub product_id: i32,
    pub bookmarked: bool,
}
