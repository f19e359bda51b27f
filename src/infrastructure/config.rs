use crate::application::connection_supervisor::SupervisorSettings;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    pub stream: StreamSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub fleet: FleetSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreamSettings {
    pub ws_base: String,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    #[serde(default = "default_stale_timeout_ms")]
    pub stale_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    #[serde(default = "default_storage_dir")]
    pub dir: String,
    /// When false the fallback cache lives in memory and is lost on restart
    #[serde(default = "default_persist")]
    pub persist: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_listen")]
    pub listen: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FleetSettings {
    /// Robots to watch when discovery is off or the backend cannot list them
    #[serde(default)]
    pub robots: Vec<String>,
    #[serde(default = "default_discover")]
    pub discover: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
            persist: default_persist(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for FleetSettings {
    fn default() -> Self {
        Self {
            robots: Vec::new(),
            discover: default_discover(),
        }
    }
}

impl StreamSettings {
    pub fn supervisor_settings(&self) -> SupervisorSettings {
        SupervisorSettings {
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            sweep_interval: Duration::from_millis(self.sweep_interval_ms),
            stale_timeout: Duration::from_millis(self.stale_timeout_ms),
        }
    }
}

fn default_refresh_path() -> String {
    "/token/refresh/".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    5_000
}

fn default_sweep_interval_ms() -> u64 {
    500
}

fn default_stale_timeout_ms() -> u64 {
    2_000
}

fn default_storage_dir() -> String {
    "data/telemetry-cache".to_string()
}

fn default_persist() -> bool {
    true
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_discover() -> bool {
    true
}

/// `config/telemetry.{toml,...}` if present, overridden by `ROBOT_TELEMETRY__SECTION__KEY`
pub fn load_settings() -> anyhow::Result<Settings> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/telemetry").required(false))
        .add_source(
            config::Environment::with_prefix("ROBOT_TELEMETRY")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("fleet.robots")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Event-stream URL for one robot: `{ws_base}/ws/robot_message/{robot_id}/`
pub fn robot_stream_url(ws_base: &str, robot_id: &str) -> String {
    format!(
        "{}/ws/robot_message/{}/",
        ws_base.trim_end_matches('/'),
        urlencoding::encode(robot_id)
    )
}
