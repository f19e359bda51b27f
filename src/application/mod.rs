// Application layer - Telemetry reconciliation use cases and the traits they depend on
pub mod connection_supervisor;
pub mod event_stream;
pub mod fallback_cache;
pub mod fleet_service;
pub mod robot_directory;
pub mod robot_feed;
pub mod staleness_sweeper;
pub mod stream_reconciler;
pub mod telemetry_cache;

#[cfg(test)]
pub mod testing;
