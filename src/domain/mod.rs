// Domain layer - Pure telemetry data model
pub mod channel;
pub mod clock;
pub mod robot;
pub mod snapshot;
pub mod telemetry;
