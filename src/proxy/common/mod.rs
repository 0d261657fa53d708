pub mod errors;

pub use errors::{error_response, forbidden_path_response};
