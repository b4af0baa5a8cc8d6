pub mod envelope;
pub mod models;
pub mod traits;

pub use envelope::*;
pub use models::*;
pub use traits::*;
