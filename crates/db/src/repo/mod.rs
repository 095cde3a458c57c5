pub mod accounts;
pub mod library;
pub mod movies;
pub mod payments;
pub mod plans;
pub mod ratings;
pub mod reviews;
pub mod stats;
pub mod subscriptions;
pub mod users;
