pub mod health_check;
pub mod parse_document;

pub use health_check::*;
pub use parse_document::*;
