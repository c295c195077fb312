use chrono::Utc;
use sea_orm::sea_query::{Expr, LockBehavior, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{OrderLineRequest, OrderList, OrderWithItems, PlaceOrderRequest},
    entity::{
        inventory::{Column as InvCol, Entity as Inventory},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        platforms::Entity as Platforms,
        product_platforms::Entity as ProductPlatforms,
        products::Entity as Products,
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    mailer::DeliveredKeys,
    middleware::auth::AuthUser,
    models::{Order, OrderItem, OrderStatus, discounted_price},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

/// Most keys one order line may ask for.
pub const MAX_LINE_QUANTITY: i32 = 100;

/// Merges lines for the same (product, platform), keeping first-seen order.
pub fn merge_lines(lines: Vec<OrderLineRequest>) -> AppResult<Vec<OrderLineRequest>> {
    if lines.is_empty() {
        return Err(AppError::BadRequest("Order has no items".into()));
    }
    let mut merged: Vec<OrderLineRequest> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity < 1 {
            return Err(AppError::BadRequest("quantity must be at least 1".into()));
        }
        match merged
            .iter_mut()
            .find(|m| m.product_id == line.product_id && m.platform_id == line.platform_id)
        {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(line.quantity)
                    .ok_or_else(|| AppError::BadRequest("quantity is too large".into()))?;
            }
            None => merged.push(line),
        }
    }
    if merged.iter().any(|line| line.quantity > MAX_LINE_QUANTITY) {
        return Err(AppError::BadRequest(format!(
            "quantity must be at most {MAX_LINE_QUANTITY} per item"
        )));
    }
    Ok(merged)
}

/// Gateway-safe reference: letters and digits only.
pub fn build_payment_ref(order_id: Uuid) -> String {
    let date = Utc::now().format("%Y%m%d%H%M%S");
    let simple = order_id.simple().to_string();
    format!("GK{}{}", date, &simple[..8]).to_uppercase()
}

pub fn parse_status(order: &OrderModel) -> AppResult<OrderStatus> {
    order
        .status
        .parse::<OrderStatus>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))
}

struct PricedLine {
    product_id: Uuid,
    platform_id: Uuid,
    product_name: String,
    platform_name: String,
    unit_price: i64,
    quantity: i32,
}

pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
    payload: PlaceOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let lines = merge_lines(payload.items)?;
    let txn = state.orm.begin().await?;

    let mut priced = Vec::with_capacity(lines.len());
    let mut total_price: i64 = 0;
    for line in lines {
        let product = Products::find_by_id(line.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::BadRequest(format!("Unknown product {}", line.product_id)))?;
        let platform = Platforms::find_by_id(line.platform_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest(format!("Unknown platform {}", line.platform_id))
            })?;
        let offered = ProductPlatforms::find_by_id((product.id, platform.id))
            .one(&txn)
            .await?
            .is_some();
        if !offered {
            return Err(AppError::BadRequest(format!(
                "{} is not available on {}",
                product.name, platform.name
            )));
        }

        let unit_price = discounted_price(product.price, product.discount_percent);
        total_price = unit_price
            .checked_mul(i64::from(line.quantity))
            .and_then(|subtotal| total_price.checked_add(subtotal))
            .ok_or_else(|| AppError::BadRequest("Order total is too large".into()))?;
        priced.push(PricedLine {
            product_id: product.id,
            platform_id: platform.id,
            product_name: product.name,
            platform_name: platform.name,
            unit_price,
            quantity: line.quantity,
        });
    }

    let now = Utc::now();
    let order_id = Uuid::new_v4();
    let order = OrderActive {
        id: Set(order_id),
        user_id: Set(user.user_id),
        total_price: Set(total_price),
        payment_method: Set(payload.payment_method.as_str().to_string()),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        payment_ref: Set(build_payment_ref(order_id)),
        paid_at: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    let mut items = Vec::with_capacity(priced.len());
    for line in priced {
        let keys = Inventory::find()
            .filter(InvCol::ProductId.eq(line.product_id))
            .filter(InvCol::PlatformId.eq(line.platform_id))
            .filter(InvCol::IsSold.eq(false))
            .order_by_asc(InvCol::CreatedAt)
            .limit(line.quantity as u64)
            .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
            .all(&txn)
            .await?;

        // Dropping the transaction rolls back the order and earlier reservations.
        if keys.len() < line.quantity as usize {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {} on {}: requested {}, available {}",
                line.product_name,
                line.platform_name,
                line.quantity,
                keys.len()
            )));
        }

        let key_ids: Vec<Uuid> = keys.iter().map(|k| k.id).collect();
        Inventory::update_many()
            .col_expr(InvCol::IsSold, Expr::value(true))
            .col_expr(InvCol::OrderId, Expr::value(Some(order.id)))
            .col_expr(InvCol::SoldAt, Expr::value(Some(now.fixed_offset())))
            .filter(InvCol::Id.is_in(key_ids))
            .exec(&txn)
            .await?;

        let codes: Vec<String> = keys.into_iter().map(|k| k.key_code).collect();
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(Some(line.product_id)),
            platform_id: Set(Some(line.platform_id)),
            product_name: Set(line.product_name),
            platform_name: Set(line.platform_name),
            unit_price: Set(line.unit_price),
            quantity: Set(line.quantity),
            keys: Set(serde_json::json!(codes)),
            created_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;
        items.push(OrderItem::from_entity(item, false));
    }

    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        user_id = %user.user_id,
        total_price = order.total_price,
        "order placed"
    );

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_create",
        "orders",
        serde_json::json!({ "order_id": order.id, "total_price": order.total_price }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order created",
        OrderWithItems {
            order: Order::from(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Lists orders matching `owner` (all orders when `None`).
pub async fn find_orders(
    state: &AppState,
    owner: Option<Uuid>,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();
    if let Some(user_id) = owner {
        condition = condition.add(OrderCol::UserId.eq(user_id));
    }
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    find_orders(state, Some(user.user_id), query).await
}

/// Order with its items. Keys are included when `reveal_keys` is set or the
/// status allows it.
pub async fn with_items<C: ConnectionTrait>(
    db: &C,
    order: OrderModel,
    reveal_keys: bool,
) -> AppResult<OrderWithItems> {
    let reveal = reveal_keys || parse_status(&order)?.reveals_keys();
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(db)
        .await?
        .into_iter()
        .map(|item| OrderItem::from_entity(item, reveal))
        .collect();

    Ok(OrderWithItems {
        order: Order::from(order),
        items,
    })
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let data = with_items(&state.orm, order, false).await?;
    Ok(ApiResponse::success("Order", data, Some(Meta::empty())))
}

/// Moves `order` to `next` if the status machine allows it. Entering a
/// releasing status returns the reserved keys to the inventory.
pub async fn transition_order<C: ConnectionTrait>(
    db: &C,
    order: OrderModel,
    next: OrderStatus,
) -> AppResult<OrderModel> {
    let current = parse_status(&order)?;
    if !current.can_transition_to(next) {
        return Err(AppError::BadRequest(format!(
            "Cannot change order status from {} to {}",
            current, next
        )));
    }

    if next.releases_keys() {
        let released = Inventory::update_many()
            .col_expr(InvCol::IsSold, Expr::value(false))
            .col_expr(InvCol::OrderId, Expr::value(Option::<Uuid>::None))
            .col_expr(
                InvCol::SoldAt,
                Expr::value(Option::<chrono::DateTime<chrono::FixedOffset>>::None),
            )
            .filter(InvCol::OrderId.eq(order.id))
            .exec(db)
            .await?;
        OrderItems::update_many()
            .col_expr(OrderItemCol::Keys, Expr::value(serde_json::json!([])))
            .filter(OrderItemCol::OrderId.eq(order.id))
            .exec(db)
            .await?;
        tracing::info!(
            order_id = %order.id,
            released = released.rows_affected,
            "reserved keys released"
        );
    }

    let now = Utc::now();
    let mut active: OrderActive = order.into();
    active.status = Set(next.as_str().to_string());
    if next == OrderStatus::Paid {
        active.paid_at = Set(Some(now.into()));
    }
    active.updated_at = Set(now.into());
    let updated = active.update(db).await?;

    tracing::info!(order_id = %updated.id, from = %current, to = %next, "order status changed");
    Ok(updated)
}

pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if parse_status(&order)? != OrderStatus::Pending {
        return Err(AppError::BadRequest(
            "Only pending orders can be cancelled".into(),
        ));
    }

    let order = transition_order(&txn, order, OrderStatus::Cancelled).await?;
    let data = with_items(&txn, order, false).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_cancel",
        "orders",
        serde_json::json!({ "order_id": id }),
    )
    .await;

    Ok(ApiResponse::success("Order cancelled", data, Some(Meta::empty())))
}

/// Emails the keys of a freshly paid order to its buyer. Best effort.
pub async fn deliver_keys(state: &AppState, order: &OrderModel) {
    if let Err(err) = try_deliver_keys(state, order).await {
        tracing::warn!(order_id = %order.id, error = %err, "key delivery email failed");
    }
}

async fn try_deliver_keys(state: &AppState, order: &OrderModel) -> anyhow::Result<()> {
    let buyer = Users::find_by_id(order.user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| anyhow::anyhow!("buyer {} not found", order.user_id))?;

    let lines: Vec<DeliveredKeys> = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|item| DeliveredKeys {
            product_name: item.product_name,
            platform_name: item.platform_name,
            keys: serde_json::from_value(item.keys).unwrap_or_default(),
        })
        .collect();

    state
        .mailer
        .send_order_keys(&buyer.email, &order.payment_ref, &lines)
        .await?;
    Ok(())
}
