pub mod network_errors;

pub use network_errors::{classify_network_error, NetworkErrorCategory, NetworkErrorInfo};
