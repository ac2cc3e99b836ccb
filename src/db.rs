pub mod user_repo;
pub use user_repo::UserRepository;
pub mod warehouse_repo;
pub use warehouse_repo::WarehouseRepository;
pub mod contract_repo;
pub use contract_repo::ContractRepository;
pub mod product_repo;
pub use product_repo::ProductRepository;
pub mod chat_repo;
pub use chat_repo::ChatRepository;
