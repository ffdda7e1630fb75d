pub mod search;
pub mod service;

pub use search::search_dashboard;
pub use service::{load_paddock_view, PaddockView, PaddockViewError};
