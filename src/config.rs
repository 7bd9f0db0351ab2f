use std::env;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/poolservice.db";
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_GEOCODER_USER_AGENT: &str = "PoolServiceApp/1.0";
pub const DEFAULT_MAP_TILE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const DEFAULT_LIVE_REFRESH_SECONDS: u64 = 30;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub geocoder_url: String,
    pub geocoder_user_agent: String,
    pub map_tile_url: String,
    pub live_refresh_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            port: 8080,
            geocoder_url: DEFAULT_GEOCODER_URL.to_string(),
            geocoder_user_agent: DEFAULT_GEOCODER_USER_AGENT.to_string(),
            map_tile_url: DEFAULT_MAP_TILE_URL.to_string(),
            live_refresh_seconds: DEFAULT_LIVE_REFRESH_SECONDS,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            port: parsed("PORT").unwrap_or(defaults.port),
            geocoder_url: env::var("GEOCODER_URL").unwrap_or(defaults.geocoder_url),
            geocoder_user_agent: env::var("GEOCODER_USER_AGENT")
                .unwrap_or(defaults.geocoder_user_agent),
            map_tile_url: env::var("MAP_TILE_URL").unwrap_or(defaults.map_tile_url),
            live_refresh_seconds: parsed("LIVE_REFRESH_SECONDS")
                .filter(|seconds| *seconds > 0)
                .unwrap_or(defaults.live_refresh_seconds),
        }
    }
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|value| value.trim().parse().ok())
}
