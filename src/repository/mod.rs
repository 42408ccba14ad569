pub mod database;
pub mod schema;
