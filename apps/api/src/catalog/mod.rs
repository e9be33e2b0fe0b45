pub mod filter;
pub mod handlers;
pub mod memory;
pub mod postgres;
pub mod projection;
pub mod rating;
pub mod store;
