pub mod tracker_model;
pub mod tracker_service;

pub use tracker_model::{ExpenseFilter, TrackerView, ViewState};
pub use tracker_service::TrackerService;
