pub mod account_repo;
pub mod app_config;
pub mod booking_repo;
pub mod coupon_repo;
pub mod database;
pub mod event_repo;
pub mod memory;

pub use account_repo::PgCustomerRepository;
pub use booking_repo::PgBookingRepository;
pub use coupon_repo::PgCouponRepository;
pub use database::DbClient;
pub use event_repo::PgEventRepository;
pub use memory::InMemoryStore;
