pub mod detector;
pub mod error;
pub mod event;
pub mod feed;
pub mod index;
pub mod types;
pub mod wire;
