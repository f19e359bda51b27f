// Application state for HTTP handlers
use crate::application::fleet_service::FleetService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub fleet: Arc<FleetService>,
}
