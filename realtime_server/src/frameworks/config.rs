use std::{env, net::IpAddr, time::Duration};

// Runtime/server settings read from the environment.

pub fn http_port() -> u16 {
    env::var("REALTIME_SERVER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3001)
}

pub fn bind_addr() -> IpAddr {
    env::var("REALTIME_BIND_ADDR")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(IpAddr::from([127, 0, 0, 1]))
}

pub fn world_tick_interval() -> Duration {
    let millis = env::var("WORLD_TICK_INTERVAL_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|millis| *millis > 0)
        .unwrap_or(DEFAULT_WORLD_TICK_MS);
    Duration::from_millis(millis)
}

// Unset means history is kept in memory only.
pub fn database_url() -> Option<String> {
    env::var("DATABASE_URL")
        .ok()
        .filter(|value| !value.trim().is_empty())
}

pub fn db_max_connections() -> u32 {
    env::var("DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5)
}

pub const DEFAULT_WORLD_TICK_MS: u64 = 40;
pub const EGRESS_CHANNEL_CAPACITY: usize = 256;

/// Everything `run_with_settings` needs beyond the listener.
#[derive(Debug, Clone)]
pub struct Settings {
    pub world_tick_interval: Duration,
    pub egress_capacity: usize,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            world_tick_interval: world_tick_interval(),
            egress_capacity: EGRESS_CHANNEL_CAPACITY,
            database_url: database_url(),
            db_max_connections: db_max_connections(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            world_tick_interval: Duration::from_millis(DEFAULT_WORLD_TICK_MS),
            egress_capacity: EGRESS_CHANNEL_CAPACITY,
            database_url: None,
            db_max_connections: 5,
        }
    }
}
