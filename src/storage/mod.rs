mod catalog;
pub mod db;
mod files;
pub mod models;
mod tables;

pub use catalog::{Catalog, CatalogError, Constraint};
pub use db::{Database, DatabaseError};
pub use tables::*;
