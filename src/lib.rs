pub mod definition;
pub mod engine;
pub mod events;
pub mod executors;
pub mod shared;
pub mod store;
