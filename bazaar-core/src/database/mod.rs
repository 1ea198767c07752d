//! Persistence ports and their Postgres implementations.

pub mod repository_ports;

#[cfg(feature = "database")]
pub mod postgres;

pub use repository_ports::advertisements::{
    AdvertisementRepository, ListingQuery, SortField, SortOrder,
};
pub use repository_ports::users::{NewUser, User, UserProfile, UserRepository};

#[cfg(feature = "database")]
pub use postgres::{
    MIGRATOR, PostgresAdvertisementRepository, PostgresUserRepository,
    connect_pool,
};
