pub mod db;
pub mod models;
mod orders;
mod sessions;
mod tables;
mod users;

pub use db::{Database, DatabaseError};
pub use orders::GrantOutcome;
pub use tables::*;
