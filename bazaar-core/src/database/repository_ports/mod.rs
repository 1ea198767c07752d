pub mod advertisements;
pub mod users;
