pub mod error;
pub mod health;
pub mod predict;

pub use error::AppError;
