// Presentation layer - HTTP surface read by the dashboard
pub mod app_state;
pub mod handlers;
