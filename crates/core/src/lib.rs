pub mod config;
pub mod error;
pub mod html;
pub mod memory;
pub mod model;
pub mod store;

pub use config::Config;
pub use error::*;
pub use model::*;
pub use store::*;
