use chrono::{Duration, NaiveDate, Utc};

use crate::{
    dto::reports::{
        LowStockList, PlatformSalesList, PlatformSalesRow, RevenuePoint, RevenueReport,
        StatsOverview, StatusCount, TopProductList, TopProductRow,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::OrderStatus,
    response::{ApiResponse, Meta},
    routes::params::{LowStockQuery, RevenueQuery, TopProductsQuery},
    services::inventory_service::stock_rows,
    state::AppState,
};

pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;
pub const DEFAULT_REPORT_DAYS: i64 = 30;
pub const DEFAULT_TOP_LIMIT: i64 = 10;

#[derive(sqlx::FromRow)]
struct OverviewCounts {
    users: i64,
    products: i64,
    orders: i64,
    revenue: i64,
    keys_available: i64,
    keys_sold: i64,
}

fn revenue_statuses() -> Vec<&'static str> {
    OrderStatus::revenue_statuses().to_vec()
}

/// Resolves the `[from, to)` window, defaulting to the last 30 days including today.
pub fn report_window(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    today: NaiveDate,
) -> AppResult<(NaiveDate, NaiveDate)> {
    let to = to.unwrap_or(today + Duration::days(1));
    let from = from.unwrap_or(to - Duration::days(DEFAULT_REPORT_DAYS));
    if from >= to {
        return Err(AppError::BadRequest("`from` must be before `to`".into()));
    }
    Ok((from, to))
}

pub async fn overview(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<StatsOverview>> {
    ensure_admin(user)?;

    let counts = sqlx::query_as::<_, OverviewCounts>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM users) AS users,
            (SELECT COUNT(*) FROM products) AS products,
            (SELECT COUNT(*) FROM orders) AS orders,
            (SELECT COALESCE(SUM(total_price), 0)::BIGINT
               FROM orders WHERE status = ANY($1)) AS revenue,
            (SELECT COUNT(*) FROM inventory WHERE is_sold = FALSE) AS keys_available,
            (SELECT COUNT(*) FROM inventory WHERE is_sold = TRUE) AS keys_sold
        "#,
    )
    .bind(revenue_statuses())
    .fetch_one(&state.pool)
    .await?;

    let orders_by_status = sqlx::query_as::<_, StatusCount>(
        r#"
        SELECT status, COUNT(*) AS count
        FROM orders
        GROUP BY status
        ORDER BY status
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    let data = StatsOverview {
        users: counts.users,
        products: counts.products,
        orders: counts.orders,
        orders_by_status,
        revenue: counts.revenue,
        keys_available: counts.keys_available,
        keys_sold: counts.keys_sold,
    };
    Ok(ApiResponse::success("Overview", data, None))
}

pub async fn low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<LowStockList>> {
    ensure_admin(user)?;
    let threshold = query.threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD).max(0);
    let items = stock_rows(&state.pool, Some(threshold)).await?;
    let meta = Meta::total(items.len() as i64);
    Ok(ApiResponse::success(
        "Low stock",
        LowStockList { threshold, items },
        Some(meta),
    ))
}

pub async fn revenue(
    state: &AppState,
    user: &AuthUser,
    query: RevenueQuery,
) -> AppResult<ApiResponse<RevenueReport>> {
    ensure_admin(user)?;
    let (from, to) = report_window(query.from, query.to, Utc::now().date_naive())?;
    let granularity = query.granularity.unwrap_or_default();

    let points = sqlx::query_as::<_, RevenuePoint>(
        r#"
        SELECT date_trunc($1, COALESCE(paid_at, created_at))::DATE AS bucket,
               COUNT(*) AS orders,
               COALESCE(SUM(total_price), 0)::BIGINT AS revenue
        FROM orders
        WHERE status = ANY($2)
          AND COALESCE(paid_at, created_at) >= $3
          AND COALESCE(paid_at, created_at) < $4
        GROUP BY bucket
        ORDER BY bucket
        "#,
    )
    .bind(granularity.as_sql())
    .bind(revenue_statuses())
    .bind(from)
    .bind(to)
    .fetch_all(&state.pool)
    .await?;

    let total_revenue = points.iter().map(|p| p.revenue).sum();
    let data = RevenueReport {
        from,
        to,
        granularity: granularity.as_sql().to_string(),
        total_revenue,
        points,
    };
    Ok(ApiResponse::success("Revenue", data, None))
}

pub async fn top_products(
    state: &AppState,
    user: &AuthUser,
    query: TopProductsQuery,
) -> AppResult<ApiResponse<TopProductList>> {
    ensure_admin(user)?;
    let limit = query.limit.unwrap_or(DEFAULT_TOP_LIMIT).clamp(1, 100);

    // Lines of deleted products keep their snapshot name and are grouped by it.
    let items = sqlx::query_as::<_, TopProductRow>(
        r#"
        SELECT oi.product_id,
               MAX(oi.product_name) AS product_name,
               SUM(oi.quantity)::BIGINT AS units_sold,
               SUM(oi.unit_price * oi.quantity)::BIGINT AS revenue
        FROM order_items oi
        JOIN orders o ON o.id = oi.order_id
        WHERE o.status = ANY($1)
        GROUP BY oi.product_id,
                 CASE WHEN oi.product_id IS NULL THEN oi.product_name END
        ORDER BY units_sold DESC, revenue DESC
        LIMIT $2
        "#,
    )
    .bind(revenue_statuses())
    .bind(limit)
    .fetch_all(&state.pool)
    .await?;

    Ok(ApiResponse::success(
        "Top products",
        TopProductList { items },
        None,
    ))
}

pub async fn sales_by_platform(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<PlatformSalesList>> {
    ensure_admin(user)?;

    let items = sqlx::query_as::<_, PlatformSalesRow>(
        r#"
        SELECT oi.platform_id,
               MAX(oi.platform_name) AS platform_name,
               SUM(oi.quantity)::BIGINT AS units_sold,
               SUM(oi.unit_price * oi.quantity)::BIGINT AS revenue
        FROM order_items oi
        JOIN orders o ON o.id = oi.order_id
        WHERE o.status = ANY($1)
        GROUP BY oi.platform_id,
                 CASE WHEN oi.platform_id IS NULL THEN oi.platform_name END
        ORDER BY revenue DESC
        "#,
    )
    .bind(revenue_statuses())
    .fetch_all(&state.pool)
    .await?;

    Ok(ApiResponse::success(
        "Sales by platform",
        PlatformSalesList { items },
        None,
    ))
}
