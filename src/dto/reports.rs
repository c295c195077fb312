use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::inventory::StockRow;

#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatsOverview {
    pub users: i64,
    pub products: i64,
    pub orders: i64,
    pub orders_by_status: Vec<StatusCount>,
    /// Sum of paid and completed order totals.
    pub revenue: i64,
    pub keys_available: i64,
    pub keys_sold: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LowStockList {
    pub threshold: i64,
    pub items: Vec<StockRow>,
}

#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
pub struct RevenuePoint {
    pub bucket: NaiveDate,
    pub orders: i64,
    pub revenue: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RevenueReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub granularity: String,
    pub total_revenue: i64,
    pub points: Vec<RevenuePoint>,
}

#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
pub struct TopProductRow {
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub units_sold: i64,
    pub revenue: i64,
}

#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
pub struct PlatformSalesRow {
    pub platform_id: Option<Uuid>,
    pub platform_name: String,
    pub units_sold: i64,
    pub revenue: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopProductList {
    pub items: Vec<TopProductRow>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlatformSalesList {
    pub items: Vec<PlatformSalesRow>,
}
