pub mod aggregation;
pub mod climate;
pub mod db;
mod error;
pub mod filters;
pub mod quality;
pub mod query_builder;
pub mod routes;
mod startup;
mod utils;

pub use aggregation::*;
pub use climate::*;
pub use db::*;
pub use error::{Error, ErrorBody};
pub use filters::*;
pub use quality::*;
pub use query_builder::*;
pub use routes::*;
pub use startup::*;
pub use utils::*;
