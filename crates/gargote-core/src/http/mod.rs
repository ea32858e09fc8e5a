pub mod client;
pub mod request;
pub mod response;

pub use client::{HttpClient, HttpClientBuilder};
pub use request::{prepare_request, PreparedRequest, RequestBody};
pub use response::ResponseData;
