pub mod auth;
pub mod chat_service;
pub mod contract_service;
pub mod document_service;
pub mod notification_service;
pub mod product_service;
pub mod scheduler;
pub mod warehouse_service;
