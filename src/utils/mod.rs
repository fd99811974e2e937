pub mod response;
pub mod validation;

pub use response::*;
pub use validation::*;
