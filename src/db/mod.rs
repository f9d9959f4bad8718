pub mod connection;
pub mod rows;

pub use connection::AggregateStore;
pub use rows::Row;
