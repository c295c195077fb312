use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::InventoryKey;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddKeysRequest {
    pub product_id: Uuid,
    pub platform_id: Uuid,
    pub keys: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddKeysResponse {
    pub inserted: usize,
    /// Keys that already existed and were left untouched.
    pub skipped: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct InventoryList {
    #[schema(value_type = Vec<InventoryKey>)]
    pub items: Vec<InventoryKey>,
}

/// Key counts for one (product, platform) pair.
#[derive(Debug, Clone, Serialize, ToSchema, sqlx::FromRow)]
pub struct StockRow {
    pub product_id: Uuid,
    pub product_name: String,
    pub platform_id: Uuid,
    pub platform_name: String,
    pub available: i64,
    pub sold: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockSummary {
    pub items: Vec<StockRow>,
}
