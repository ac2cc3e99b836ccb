pub mod auth;
pub mod chat;
pub mod contract;
pub mod product;
pub mod warehouse;
