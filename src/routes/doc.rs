use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        admin::{UpdateRoleRequest, UserList},
        auth::{
            EmailRequest, LoginRequest, LoginResponse, RegisterRequest, ResetPasswordRequest,
            VerifyEmailRequest,
        },
        catalog::{GenreList, NameRequest, PlatformList},
        inventory::{AddKeysRequest, AddKeysResponse, InventoryList, StockRow, StockSummary},
        orders::{
            OrderLineRequest, OrderList, OrderWithItems, PlaceOrderRequest,
            UpdateOrderStatusRequest,
        },
        payment::{CreatePaymentUrlRequest, PaymentReturnResponse, PaymentUrlResponse},
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        reports::{
            LowStockList, PlatformSalesList, PlatformSalesRow, RevenuePoint, RevenueReport,
            StatsOverview, StatusCount, TopProductList, TopProductRow,
        },
        upload::{UploadForm, UploadResponse},
        users::{AddWishlistRequest, ChangePasswordRequest, UpdateProfileRequest},
    },
    error::ErrorData,
    models::{
        Genre, InventoryKey, Order, OrderItem, OrderStatus, PaymentMethod, Platform,
        PlatformStock, Product, ProductDetail, Role, User,
    },
    response::{ApiResponse, Meta},
    routes::{
        admin, auth, catalog, health, inventory, orders, params, payment, products, reports,
        upload, users,
    },
    vnpay::IpnResponse,
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::verify_email,
        auth::resend_pin,
        auth::login,
        auth::forgot_password,
        auth::reset_password,
        auth::google_login,
        auth::google_callback,
        auth::me,
        users::get_profile,
        users::update_profile,
        users::change_password,
        users::list_wishlist,
        users::add_to_wishlist,
        users::remove_from_wishlist,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        catalog::list_platforms,
        catalog::get_platform,
        catalog::create_platform,
        catalog::update_platform,
        catalog::delete_platform,
        catalog::list_genres,
        catalog::get_genre,
        catalog::create_genre,
        catalog::update_genre,
        catalog::delete_genre,
        inventory::list_keys,
        inventory::add_keys,
        inventory::delete_key,
        inventory::summary,
        orders::list_orders,
        orders::place_order,
        orders::get_order,
        orders::cancel_order,
        payment::create_payment_url,
        payment::vnpay_ipn,
        payment::vnpay_return,
        admin::list_users,
        admin::update_user_role,
        admin::delete_user,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        reports::overview,
        reports::low_stock,
        reports::revenue,
        reports::top_products,
        reports::sales_by_platform,
        upload::upload_image
    ),
    components(
        schemas(
            User,
            Role,
            Platform,
            Genre,
            Product,
            PlatformStock,
            ProductDetail,
            InventoryKey,
            Order,
            OrderItem,
            OrderStatus,
            PaymentMethod,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            VerifyEmailRequest,
            EmailRequest,
            ResetPasswordRequest,
            UpdateProfileRequest,
            ChangePasswordRequest,
            AddWishlistRequest,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            NameRequest,
            PlatformList,
            GenreList,
            AddKeysRequest,
            AddKeysResponse,
            InventoryList,
            StockRow,
            StockSummary,
            OrderLineRequest,
            PlaceOrderRequest,
            UpdateOrderStatusRequest,
            OrderWithItems,
            OrderList,
            CreatePaymentUrlRequest,
            PaymentUrlResponse,
            PaymentReturnResponse,
            IpnResponse,
            UpdateRoleRequest,
            UserList,
            StatusCount,
            StatsOverview,
            LowStockList,
            RevenuePoint,
            RevenueReport,
            TopProductRow,
            TopProductList,
            PlatformSalesRow,
            PlatformSalesList,
            UploadForm,
            UploadResponse,
            ErrorData,
            params::SortOrder,
            params::ProductSortBy,
            params::Granularity,
            Meta,
            ApiResponse<User>,
            ApiResponse<ProductList>,
            ApiResponse<ProductDetail>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<ErrorData>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration, verification, login and Google sign-in"),
        (name = "Users", description = "Own profile and wishlist"),
        (name = "Products", description = "Product catalog"),
        (name = "Platforms", description = "Platforms keys are sold for"),
        (name = "Genres", description = "Product genres"),
        (name = "Inventory", description = "Key inventory (admin)"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Payment", description = "VNPay checkout and callbacks"),
        (name = "Admin", description = "Admin endpoints"),
        (name = "Stats", description = "Store statistics (admin)"),
        (name = "Reports", description = "Sales reports (admin)"),
        (name = "Upload", description = "Image upload (admin)"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
