pub mod admin;
pub mod auth;
pub mod catalog;
pub mod inventory;
pub mod orders;
pub mod payment;
pub mod products;
pub mod reports;
pub mod upload;
pub mod users;
