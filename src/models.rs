use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{
    genres, inventory, order_items, orders, platforms, products, users,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Completed,
    Failed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Completed,
        OrderStatus::Failed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// pending -> paid | failed | cancelled, paid -> completed.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (
                OrderStatus::Pending,
                OrderStatus::Paid | OrderStatus::Failed | OrderStatus::Cancelled
            ) | (OrderStatus::Paid, OrderStatus::Completed)
        )
    }

    /// Entering this status hands reserved keys back to the inventory.
    pub fn releases_keys(&self) -> bool {
        matches!(self, OrderStatus::Failed | OrderStatus::Cancelled)
    }

    /// Whether the buyer may see the keys of an order in this status.
    pub fn reveals_keys(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Completed)
    }

    /// Statuses whose totals count as revenue.
    pub fn revenue_statuses() -> [&'static str; 2] {
        [OrderStatus::Paid.as_str(), OrderStatus::Completed.as_str()]
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown order status '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Paid through the VNPay gateway.
    Vnpay,
    /// Settled outside the gateway and confirmed by an admin.
    Manual,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Vnpay => "vnpay",
            PaymentMethod::Manual => "manual",
        }
    }
}

/// Highest list price in VND a product may carry.
pub const MAX_PRICE: i64 = 1_000_000_000_000;

/// Price after applying a percentage discount, rounded down to whole VND.
pub fn discounted_price(price: i64, discount_percent: i32) -> i64 {
    let discount = i128::from(discount_percent.clamp(0, 100));
    let discounted = i128::from(price) * (100 - discount) / 100;
    // Never larger in magnitude than `price`, so it fits back.
    discounted as i64
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
    pub is_verified: bool,
    pub avatar_url: Option<String>,
    pub has_password: bool,
    pub google_linked: bool,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            role: model.role,
            is_verified: model.is_verified,
            avatar_url: model.avatar_url,
            has_password: model.password_hash.is_some(),
            google_linked: model.google_id.is_some(),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Platform {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<platforms::Model> for Platform {
    fn from(model: platforms::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Genre {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<genres::Model> for Genre {
    fn from(model: genres::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub discount_percent: i32,
    pub final_price: i64,
    pub image_url: Option<String>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub release_date: Option<NaiveDate>,
    /// Unsold keys across all platforms.
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn from_entity(model: products::Model, stock: i64) -> Self {
        Self {
            id: model.id,
            final_price: discounted_price(model.price, model.discount_percent),
            name: model.name,
            description: model.description,
            price: model.price,
            discount_percent: model.discount_percent,
            image_url: model.image_url,
            developer: model.developer,
            publisher: model.publisher,
            release_date: model.release_date,
            stock,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlatformStock {
    pub id: Uuid,
    pub name: String,
    pub stock: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub platforms: Vec<PlatformStock>,
    pub genres: Vec<Genre>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InventoryKey {
    pub id: Uuid,
    pub product_id: Uuid,
    pub platform_id: Uuid,
    pub key_code: String,
    pub is_sold: bool,
    pub order_id: Option<Uuid>,
    pub sold_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<inventory::Model> for InventoryKey {
    fn from(model: inventory::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            platform_id: model.platform_id,
            key_code: model.key_code,
            is_sold: model.is_sold,
            order_id: model.order_id,
            sold_at: model.sold_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_price: i64,
    pub payment_method: String,
    pub status: String,
    pub payment_ref: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<orders::Model> for Order {
    fn from(model: orders::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            total_price: model.total_price,
            payment_method: model.payment_method,
            status: model.status,
            payment_ref: model.payment_ref,
            paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub platform_id: Option<Uuid>,
    pub product_name: String,
    pub platform_name: String,
    pub unit_price: i64,
    pub quantity: i32,
    /// Empty unless the order is paid or completed, or an admin is looking.
    pub keys: Vec<String>,
}

impl OrderItem {
    pub fn from_entity(model: order_items::Model, reveal_keys: bool) -> Self {
        let keys = if reveal_keys {
            serde_json::from_value(model.keys).unwrap_or_default()
        } else {
            Vec::new()
        };
        Self {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            platform_id: model.platform_id,
            product_name: model.product_name,
            platform_name: model.platform_name,
            unit_price: model.unit_price,
            quantity: model.quantity,
            keys,
        }
    }
}
