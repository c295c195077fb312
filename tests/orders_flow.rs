mod common;

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use game_key_store::{
    dto::{
        admin::UpdateRoleRequest,
        catalog::NameRequest,
        inventory::AddKeysRequest,
        orders::{OrderLineRequest, PlaceOrderRequest, UpdateOrderStatusRequest},
        payment::CreatePaymentUrlRequest,
        products::{CreateProductRequest, UpdateProductRequest},
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::{MAX_PRICE, OrderStatus, PaymentMethod, Role},
    routes::params::{
        Granularity, LowStockQuery, ProductQuery, RevenueQuery, TopProductsQuery,
    },
    services::{
        admin_service, catalog_service, inventory_service, order_service,
        order_service::MAX_LINE_QUANTITY, payment_service, product_service, report_service,
    },
    state::AppState,
    vnpay::{self, rsp},
};
use uuid::Uuid;

// Catalog -> inventory -> order -> VNPay IPN -> reports, with cancellation
// handing keys back to the pool.
#[tokio::test]
async fn order_payment_and_report_flow() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        return Ok(());
    };
    let state = common::setup_state(&database_url).await?;

    let admin = common::create_user(&state, "admin", "admin@example.com", "admin123", "admin").await?;
    let buyer = common::create_user(&state, "player", "player@example.com", "player123", "user").await?;

    // Catalog
    let steam = catalog_service::create_platform(&state, &admin, name("Steam"))
        .await?
        .data
        .unwrap();
    let duplicate = catalog_service::create_platform(&state, &admin, name("  Steam ")).await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));
    assert!(matches!(
        catalog_service::create_platform(&state, &buyer, name("Xbox")).await,
        Err(AppError::Forbidden)
    ));

    let rpg = catalog_service::create_genre(&state, &admin, name("RPG"))
        .await?
        .data
        .unwrap();

    let overpriced = product_service::create_product(
        &state,
        &admin,
        product_request("Gold Edition", MAX_PRICE + 1, vec![steam.id], vec![]),
    )
    .await;
    assert!(matches!(overpriced, Err(AppError::BadRequest(_))));

    let product = product_service::create_product(
        &state,
        &admin,
        CreateProductRequest {
            description: Some("A game for testing".into()),
            discount_percent: 10,
            developer: Some("Studio".into()),
            ..product_request("Test Quest", 200_000, vec![steam.id], vec![rpg.id])
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(product.product.final_price, 180_000);
    assert_eq!(product.product.stock, 0);
    let product_id = product.product.id;

    // Inventory
    let added = inventory_service::add_keys(
        &state,
        &admin,
        keys(product_id, steam.id, &["KEY-1", "KEY-2", "KEY-3", " KEY-1 "]),
    )
    .await?
    .data
    .unwrap();
    assert_eq!(added.inserted, 3);
    assert!(added.skipped.is_empty());

    let again = inventory_service::add_keys(&state, &admin, keys(product_id, steam.id, &["KEY-3", "KEY-4"]))
        .await?
        .data
        .unwrap();
    assert_eq!(again.inserted, 1);
    assert_eq!(again.skipped, vec!["KEY-3".to_string()]);
    assert_eq!(stock(&state, product_id).await?, 4);

    // Ordering more than is in stock leaves nothing reserved.
    let too_many = order_service::place_order(&state, &buyer, order_of(product_id, steam.id, 5)).await;
    assert!(matches!(too_many, Err(AppError::BadRequest(_))));
    let bulk = order_service::place_order(
        &state,
        &buyer,
        order_of(product_id, steam.id, MAX_LINE_QUANTITY + 1),
    )
    .await;
    assert!(matches!(bulk, Err(AppError::BadRequest(_))));
    assert_eq!(stock(&state, product_id).await?, 4);

    let placed = order_service::place_order(&state, &buyer, order_of(product_id, steam.id, 2))
        .await?
        .data
        .unwrap();
    let order = placed.order;
    assert_eq!(order.status, OrderStatus::Pending.as_str());
    assert_eq!(order.total_price, 360_000);
    assert!(placed.items.iter().all(|item| item.keys.is_empty()));
    assert_eq!(stock(&state, product_id).await?, 2);

    // Payment
    let link = payment_service::create_payment_url(
        &state,
        &buyer,
        CreatePaymentUrlRequest {
            order_id: order.id,
            bank_code: None,
            locale: None,
        },
        "127.0.0.1",
    )
    .await?
    .data
    .unwrap();
    assert_eq!(link.payment_ref, order.payment_ref);
    assert!(link.payment_url.starts_with(&state.config.vnpay.pay_url));

    let mut forged = signed_ipn(&order.payment_ref, order.total_price, "00");
    forged.insert("vnp_ResponseCode".into(), "24".into());
    assert_eq!(
        payment_service::handle_ipn(&state, forged).await.rsp_code,
        rsp::INVALID_CHECKSUM
    );

    let wrong_amount = signed_ipn(&order.payment_ref, order.total_price + 1, "00");
    assert_eq!(
        payment_service::handle_ipn(&state, wrong_amount).await.rsp_code,
        rsp::INVALID_AMOUNT
    );

    let unknown = signed_ipn("GKUNKNOWN", order.total_price, "00");
    assert_eq!(
        payment_service::handle_ipn(&state, unknown).await.rsp_code,
        rsp::ORDER_NOT_FOUND
    );

    let ipn = signed_ipn(&order.payment_ref, order.total_price, "00");
    assert_eq!(
        payment_service::handle_ipn(&state, ipn.clone()).await.rsp_code,
        rsp::SUCCESS
    );
    assert_eq!(
        payment_service::handle_ipn(&state, ipn.clone()).await.rsp_code,
        rsp::ALREADY_CONFIRMED
    );

    let returned = payment_service::handle_return(&state, ipn).await?.data.unwrap();
    assert!(returned.success);
    assert_eq!(returned.status.as_deref(), Some("paid"));

    let paid = order_service::get_order(&state, &buyer, order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(paid.order.status, "paid");
    assert!(paid.order.paid_at.is_some());
    assert_eq!(paid.items[0].keys.len(), 2);

    // Another buyer cannot see the order.
    let stranger = AuthUser {
        user_id: Uuid::new_v4(),
        role: "user".into(),
    };
    assert!(matches!(
        order_service::get_order(&state, &stranger, order.id).await,
        Err(AppError::NotFound)
    ));

    // Admin status changes follow the state machine.
    let completed = admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Completed,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(completed.order.status, "completed");
    assert!(matches!(
        admin_service::update_order_status(
            &state,
            &admin,
            order.id,
            UpdateOrderStatusRequest {
                status: OrderStatus::Cancelled,
            },
        )
        .await,
        Err(AppError::BadRequest(_))
    ));

    // Cancellation returns reserved keys.
    let second = order_service::place_order(&state, &buyer, order_of(product_id, steam.id, 1))
        .await?
        .data
        .unwrap();
    assert_eq!(stock(&state, product_id).await?, 1);
    let cancelled = order_service::cancel_order(&state, &buyer, second.order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(cancelled.order.status, "cancelled");
    assert_eq!(stock(&state, product_id).await?, 2);
    assert!(matches!(
        order_service::cancel_order(&state, &buyer, second.order.id).await,
        Err(AppError::BadRequest(_))
    ));

    // A failed gateway payment also releases keys.
    let third = order_service::place_order(&state, &buyer, order_of(product_id, steam.id, 1))
        .await?
        .data
        .unwrap();
    let declined = signed_ipn(&third.order.payment_ref, third.order.total_price, "24");
    assert_eq!(
        payment_service::handle_ipn(&state, declined).await.rsp_code,
        rsp::SUCCESS
    );
    assert_eq!(stock(&state, product_id).await?, 2);

    // Reports
    let low = report_service::low_stock(&state, &admin, LowStockQuery { threshold: Some(5) })
        .await?
        .data
        .unwrap();
    let row = low
        .items
        .iter()
        .find(|row| row.product_id == product_id)
        .expect("product should be low on stock");
    assert_eq!(row.available, 2);
    assert_eq!(row.sold, 2);

    let top = report_service::top_products(&state, &admin, TopProductsQuery { limit: None })
        .await?
        .data
        .unwrap();
    assert_eq!(top.items.len(), 1);
    assert_eq!(top.items[0].units_sold, 2);
    assert_eq!(top.items[0].revenue, 360_000);

    let overview = report_service::overview(&state, &admin).await?.data.unwrap();
    assert_eq!(overview.revenue, 360_000);
    assert_eq!(overview.keys_sold, 2);
    assert_eq!(overview.keys_available, 2);

    assert!(matches!(
        report_service::overview(&state, &buyer).await,
        Err(AppError::Forbidden)
    ));

    revenue_reports(&state, &admin, &buyer, order.id, steam.id).await?;
    catalog_maintenance(&state, &admin, product_id, steam.id, rpg.id).await?;
    account_removal(&state, &admin, &buyer, product_id, steam.id).await
}

async fn revenue_reports(
    state: &AppState,
    admin: &AuthUser,
    buyer: &AuthUser,
    order_id: Uuid,
    platform_id: Uuid,
) -> anyhow::Result<()> {
    let by_platform = report_service::sales_by_platform(state, admin)
        .await?
        .data
        .unwrap();
    assert_eq!(by_platform.items.len(), 1);
    assert_eq!(by_platform.items[0].platform_id, Some(platform_id));
    assert_eq!(by_platform.items[0].platform_name, "Steam");
    assert_eq!(by_platform.items[0].units_sold, 2);
    assert_eq!(by_platform.items[0].revenue, 360_000);
    assert!(matches!(
        report_service::sales_by_platform(state, buyer).await,
        Err(AppError::Forbidden)
    ));

    // Pin the sale to a known instant so buckets are predictable.
    sqlx::query("UPDATE orders SET paid_at = '2024-01-15T12:00:00Z' WHERE id = $1")
        .bind(order_id)
        .execute(&state.pool)
        .await?;

    let monthly = revenue(state, admin, date(2024, 1, 1), date(2024, 2, 1), Granularity::Month).await?;
    assert_eq!(monthly.total_revenue, 360_000);
    assert_eq!(monthly.points.len(), 1);
    assert_eq!(monthly.points[0].bucket, date(2024, 1, 1));
    assert_eq!(monthly.points[0].orders, 1);

    let daily = revenue(state, admin, date(2024, 1, 10), date(2024, 1, 20), Granularity::Day).await?;
    assert_eq!(daily.points.len(), 1);
    assert_eq!(daily.points[0].bucket, date(2024, 1, 15));
    assert_eq!(daily.points[0].revenue, 360_000);

    // `from` is inclusive, `to` is exclusive.
    let same_day = revenue(state, admin, date(2024, 1, 15), date(2024, 1, 16), Granularity::Day).await?;
    assert_eq!(same_day.total_revenue, 360_000);
    let before = revenue(state, admin, date(2024, 1, 1), date(2024, 1, 15), Granularity::Day).await?;
    assert_eq!(before.total_revenue, 0);
    assert!(before.points.is_empty());

    let empty_window = report_service::revenue(
        state,
        admin,
        RevenueQuery {
            from: Some(date(2024, 1, 15)),
            to: Some(date(2024, 1, 15)),
            granularity: None,
        },
    )
    .await;
    assert!(matches!(empty_window, Err(AppError::BadRequest(_))));

    Ok(())
}

async fn catalog_maintenance(
    state: &AppState,
    admin: &AuthUser,
    product_id: Uuid,
    steam_id: Uuid,
    rpg_id: Uuid,
) -> anyhow::Result<()> {
    // Renames hit the unique index and report a conflict.
    let epic = catalog_service::create_platform(state, admin, name("Epic"))
        .await?
        .data
        .unwrap();
    assert!(matches!(
        catalog_service::update_platform(state, admin, epic.id, name("Steam")).await,
        Err(AppError::Conflict(_))
    ));
    let action = catalog_service::create_genre(state, admin, name("Action"))
        .await?
        .data
        .unwrap();
    assert!(matches!(
        catalog_service::update_genre(state, admin, action.id, name("RPG")).await,
        Err(AppError::Conflict(_))
    ));

    let renamed = catalog_service::update_genre(state, admin, rpg_id, name("Role-playing"))
        .await?
        .data
        .unwrap();
    assert_eq!(renamed.name, "Role-playing");
    assert_eq!(audit_count(state, "genre_update").await?, 1);

    // Steam still has keys for the product.
    let dropped = product_service::update_product(
        state,
        admin,
        product_id,
        UpdateProductRequest {
            platform_ids: Some(vec![epic.id]),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(dropped, Err(AppError::Conflict(_))));
    let detail = product_service::get_product(state, product_id).await?.data.unwrap();
    assert_eq!(detail.platforms.len(), 1);
    assert_eq!(detail.platforms[0].id, steam_id);

    assert!(matches!(
        catalog_service::delete_platform(state, admin, steam_id).await,
        Err(AppError::Conflict(_))
    ));
    catalog_service::delete_platform(state, admin, epic.id).await?;

    // Sold keys stay, unsold ones can go.
    let (sold_key,): (Uuid,) =
        sqlx::query_as("SELECT id FROM inventory WHERE is_sold LIMIT 1")
            .fetch_one(&state.pool)
            .await?;
    assert!(matches!(
        inventory_service::delete_key(state, admin, sold_key).await,
        Err(AppError::BadRequest(_))
    ));
    let (unsold_key,): (Uuid,) =
        sqlx::query_as("SELECT id FROM inventory WHERE NOT is_sold LIMIT 1")
            .fetch_one(&state.pool)
            .await?;
    inventory_service::delete_key(state, admin, unsold_key).await?;
    assert_eq!(stock(state, product_id).await?, 1);

    // Stock filter in both directions.
    let sold_out = product_service::create_product(
        state,
        admin,
        product_request("Sold Out", 50_000, vec![steam_id], vec![]),
    )
    .await?
    .data
    .unwrap();
    let in_stock = listed(state, Some(true)).await?;
    assert!(in_stock.contains(&product_id));
    assert!(!in_stock.contains(&sold_out.product.id));
    let out_of_stock = listed(state, Some(false)).await?;
    assert!(out_of_stock.contains(&sold_out.product.id));
    assert!(!out_of_stock.contains(&product_id));
    assert_eq!(listed(state, None).await?.len(), 2);

    Ok(())
}

async fn account_removal(
    state: &AppState,
    admin: &AuthUser,
    buyer: &AuthUser,
    product_id: Uuid,
    steam_id: Uuid,
) -> anyhow::Result<()> {
    assert!(matches!(
        admin_service::delete_user(state, admin, admin.user_id).await,
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        admin_service::update_user_role(
            state,
            admin,
            admin.user_id,
            UpdateRoleRequest { role: Role::User }
        )
        .await,
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        admin_service::delete_user(state, admin, Uuid::new_v4()).await,
        Err(AppError::NotFound)
    ));

    // Buyers with delivered keys are kept.
    assert!(matches!(
        admin_service::delete_user(state, admin, buyer.user_id).await,
        Err(AppError::Conflict(_))
    ));
    assert_eq!(orders_of(state, buyer.user_id).await?, 3);

    // A pending order hands its keys back when its owner is removed.
    let casual = common::create_user(state, "casual", "casual@example.com", "casual123", "user").await?;
    order_service::place_order(state, &casual, order_of(product_id, steam_id, 1)).await?;
    assert_eq!(stock(state, product_id).await?, 0);

    admin_service::delete_user(state, admin, casual.user_id).await?;
    assert_eq!(stock(state, product_id).await?, 1);
    assert_eq!(orders_of(state, casual.user_id).await?, 0);
    assert_eq!(audit_count(state, "user_delete").await?, 1);

    Ok(())
}

fn name(value: &str) -> NameRequest {
    NameRequest {
        name: value.to_string(),
    }
}

fn product_request(
    name: &str,
    price: i64,
    platform_ids: Vec<Uuid>,
    genre_ids: Vec<Uuid>,
) -> CreateProductRequest {
    CreateProductRequest {
        name: name.to_string(),
        description: None,
        price,
        discount_percent: 0,
        image_url: None,
        developer: None,
        publisher: None,
        release_date: None,
        platform_ids,
        genre_ids,
    }
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

async fn revenue(
    state: &AppState,
    admin: &AuthUser,
    from: NaiveDate,
    to: NaiveDate,
    granularity: Granularity,
) -> anyhow::Result<game_key_store::dto::reports::RevenueReport> {
    let query = RevenueQuery {
        from: Some(from),
        to: Some(to),
        granularity: Some(granularity),
    };
    Ok(report_service::revenue(state, admin, query).await?.data.unwrap())
}

async fn listed(state: &AppState, in_stock: Option<bool>) -> anyhow::Result<Vec<Uuid>> {
    let query = ProductQuery {
        in_stock,
        ..Default::default()
    };
    let list = product_service::list_products(state, query).await?.data.unwrap();
    Ok(list.items.into_iter().map(|product| product.id).collect())
}

async fn audit_count(state: &AppState, action: &str) -> anyhow::Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM audit_logs WHERE action = $1")
        .bind(action)
        .fetch_one(&state.pool)
        .await?;
    Ok(count)
}

async fn orders_of(state: &AppState, user_id: Uuid) -> anyhow::Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&state.pool)
        .await?;
    Ok(count)
}

fn keys(product_id: Uuid, platform_id: Uuid, codes: &[&str]) -> AddKeysRequest {
    AddKeysRequest {
        product_id,
        platform_id,
        keys: codes.iter().map(|c| c.to_string()).collect(),
    }
}

fn order_of(product_id: Uuid, platform_id: Uuid, quantity: i32) -> PlaceOrderRequest {
    PlaceOrderRequest {
        items: vec![OrderLineRequest {
            product_id,
            platform_id,
            quantity,
        }],
        payment_method: PaymentMethod::Vnpay,
    }
}

async fn stock(state: &AppState, product_id: Uuid) -> anyhow::Result<i64> {
    let detail = product_service::get_product(state, product_id)
        .await?
        .data
        .unwrap();
    Ok(detail.product.stock)
}

/// Callback parameters as VNPay would send them, signed with the test secret.
fn signed_ipn(txn_ref: &str, total_price: i64, response_code: &str) -> HashMap<String, String> {
    let mut params = BTreeMap::new();
    params.insert("vnp_TmnCode".to_string(), "TESTTMN1".to_string());
    params.insert("vnp_TxnRef".to_string(), txn_ref.to_string());
    params.insert("vnp_Amount".to_string(), (total_price * 100).to_string());
    params.insert("vnp_ResponseCode".to_string(), response_code.to_string());
    params.insert("vnp_TransactionStatus".to_string(), response_code.to_string());
    params.insert("vnp_OrderInfo".to_string(), "Thanh toan don hang".to_string());
    params.insert("vnp_TransactionNo".to_string(), "14000000".to_string());

    let hash = vnpay::sign(common::VNPAY_SECRET, &vnpay::build_query(&params));
    let mut params: HashMap<String, String> = params.into_iter().collect();
    params.insert(vnpay::SECURE_HASH.to_string(), hash);
    params
}
