pub mod health;
pub mod thumbnail;
