pub mod audit_logs;
pub mod genres;
pub mod inventory;
pub mod order_items;
pub mod orders;
pub mod platforms;
pub mod product_genres;
pub mod product_platforms;
pub mod products;
pub mod users;
pub mod wishlists;

pub use audit_logs::Entity as AuditLogs;
pub use genres::Entity as Genres;
pub use inventory::Entity as Inventory;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use platforms::Entity as Platforms;
pub use product_genres::Entity as ProductGenres;
pub use product_platforms::Entity as ProductPlatforms;
pub use products::Entity as Products;
pub use users::Entity as Users;
pub use wishlists::Entity as Wishlists;
