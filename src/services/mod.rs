pub mod seating;

pub use seating::{GuestStats, LayoutView, Outcome, SeatingService, ServiceError};
