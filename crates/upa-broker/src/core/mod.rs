//! Core brokering logic

mod broker;
mod selection;
mod validation;

pub use broker::{Broker, DEFAULT_CALL_TIMEOUT};
pub use selection::{select, Reply, Selection};
pub use validation::{validate_request, Route};
