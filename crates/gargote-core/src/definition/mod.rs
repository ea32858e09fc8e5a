pub mod io;
pub mod model;
pub mod validation;

pub use io::{load_test, parse_test};
pub use model::{
    Action, Capture, HttpMethod, Query, Response, Stage, Swarm, Test, Validation,
    DEFAULT_TIMEOUT_MS,
};
pub use validation::validate_test;
