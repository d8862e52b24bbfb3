pub mod config;
pub mod error;
pub mod models;
pub mod normalize;
pub mod time;
pub mod traits;

pub use config::*;
pub use error::*;
pub use models::*;
pub use traits::*;
