use serde::{Deserialize, Serialize};

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    pub url: String,
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HashingConfig {
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

fn default_memory_kib() -> u32 {
    19 * 1024
}
fn default_iterations() -> u32 {
    2
}
fn default_parallelism() -> u32 {
    1
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

/// Admin account to seed on startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialAdminConfig {
    pub name: String,
    pub email: String,
    pub password: String,
}

fn default_token_ttl() -> i64 {
    24 * 60 * 60
}

/// Auth configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Session token lifetime in seconds (default: 1 day)
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: i64,
    #[serde(default)]
    pub hashing: HashingConfig,
    pub initial_admin: Option<InitialAdminConfig>,
}

fn default_hourly_rate() -> f64 {
    2.0
}

/// Parking pricing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParkingConfig {
    /// Price per hour charged when a booking is closed
    #[serde(default = "default_hourly_rate")]
    pub hourly_rate: f64,
}

impl Default for ParkingConfig {
    fn default() -> Self {
        Self {
            hourly_rate: default_hourly_rate(),
        }
    }
}

/// Server configuration - loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen: String, // "0.0.0.0:3001"
    pub db: DbConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub parking: ParkingConfig,
}

/// Load server config from a YAML file with PARKWISE__ env var overrides.
pub fn load_config(path: &str) -> anyhow::Result<ServerConfig> {
    use anyhow::Context;
    let config: ServerConfig = config::Config::builder()
        .add_source(config::File::new(path, config::FileFormat::Yaml))
        .add_source(
            config::Environment::with_prefix("PARKWISE")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()
        .with_context(|| format!("Failed to build config from: {}", path))?
        .try_deserialize()
        .with_context(|| format!("Failed to deserialize config from: {}", path))?;
    Ok(config)
}
