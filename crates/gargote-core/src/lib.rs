pub mod assertions;
pub mod definition;
pub mod engine;
pub mod error;
pub mod extractors;
pub mod http;
pub mod json;
pub mod patterns;
pub mod results;
pub mod template;

pub use error::GargoteError;
