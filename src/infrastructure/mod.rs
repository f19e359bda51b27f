// Infrastructure layer - External dependencies and adapters
pub mod chunked_json;
pub mod config;
pub mod key_value_store;
pub mod robot_api;
pub mod websocket_stream;
