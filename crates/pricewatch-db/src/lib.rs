pub mod config;
pub mod database;
pub mod history_repository;
pub mod product_repository;

pub use config::DatabaseConfig;
pub use database::Database;
pub use history_repository::PriceHistoryRepository;
pub use product_repository::ProductRepository;
