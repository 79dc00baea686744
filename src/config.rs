use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::orchestrator::RoomTimings;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Sala
    pub inactivity_timeout_secs: u64,
    pub warning_window_secs: u64,
    pub watchdog_interval_secs: u64,
    pub sync_cooldown_secs: u64,

    // Reproducción
    pub playback_volume: f32,
    pub fade_steps: u32,
    pub fade_step_ms: u64,
    pub resolver_timeout_secs: u64,

    // Peticiones por chat
    pub message_cooldown_secs: u64,

    // Dashboard
    pub dashboard_port: u16,
    pub log_capacity: usize,

    // Rendimiento y paths
    pub worker_threads: usize,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Sala
            inactivity_timeout_secs: env_or("TIMEOUT_SECONDS", "300")?,
            warning_window_secs: env_or("WARNING_WINDOW_SECONDS", "60")?,
            watchdog_interval_secs: env_or("WATCHDOG_INTERVAL_SECONDS", "30")?,
            sync_cooldown_secs: env_or("SYNC_COOLDOWN_SECONDS", "30")?,

            // Reproducción
            playback_volume: env_or("PLAYBACK_VOLUME", "0.3")?,
            fade_steps: env_or("FADE_STEPS", "10")?,
            fade_step_ms: env_or("FADE_STEP_MS", "100")?,
            resolver_timeout_secs: env_or("RESOLVER_TIMEOUT_SECONDS", "15")?,

            // Peticiones por chat
            message_cooldown_secs: env_or("MESSAGE_COOLDOWN_SECONDS", "2")?,

            // Dashboard
            dashboard_port: env_or("DASHBOARD_PORT", "8080")?,
            log_capacity: env_or("LOG_CAPACITY", "50")?,

            // Rendimiento y paths
            worker_threads: match std::env::var("WORKER_THREADS") {
                Ok(val) if !val.trim().is_empty() => val.parse()?,
                _ => num_cpus::get(),
            },
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string())
                .into(),
        };

        std::fs::create_dir_all(&config.data_dir)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.playback_volume < 0.0 || self.playback_volume > 2.0 {
            anyhow::bail!(
                "PLAYBACK_VOLUME debe estar entre 0.0 y 2.0, llegó: {}",
                self.playback_volume
            );
        }

        if self.warning_window_secs >= self.inactivity_timeout_secs {
            anyhow::bail!(
                "WARNING_WINDOW_SECONDS ({}) debe ser menor que TIMEOUT_SECONDS ({})",
                self.warning_window_secs,
                self.inactivity_timeout_secs
            );
        }

        if self.watchdog_interval_secs == 0 {
            anyhow::bail!("WATCHDOG_INTERVAL_SECONDS debe ser mayor que 0");
        }

        if self.fade_steps == 0 {
            anyhow::bail!("FADE_STEPS debe ser mayor que 0");
        }

        if self.log_capacity == 0 {
            anyhow::bail!("LOG_CAPACITY debe ser mayor que 0");
        }

        Ok(())
    }

    pub fn timings(&self) -> RoomTimings {
        RoomTimings {
            watchdog_interval: Duration::from_secs(self.watchdog_interval_secs),
            inactivity_timeout: Duration::from_secs(self.inactivity_timeout_secs),
            warning_window: Duration::from_secs(self.warning_window_secs),
            sync_cooldown: Duration::from_secs(self.sync_cooldown_secs),
            fade_steps: self.fade_steps,
            fade_step_delay: Duration::from_millis(self.fade_step_ms),
            playback_volume: self.playback_volume,
        }
    }

    pub fn resolver_timeout(&self) -> Duration {
        Duration::from_secs(self.resolver_timeout_secs)
    }

    /// Resumen sin secretos para el log de arranque
    pub fn summary(&self) -> String {
        format!(
            "Config: app {} (guild: {}), timeout {}s (aviso a -{}s), \
             volumen {:.0}%, dashboard :{}, datos en {}",
            self.application_id,
            self.guild_id
                .map_or("global".to_string(), |id| id.to_string()),
            self.inactivity_timeout_secs,
            self.warning_window_secs,
            self.playback_volume * 100.0,
            self.dashboard_port,
            self.data_dir.display()
        )
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()?)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,
            inactivity_timeout_secs: 300,
            warning_window_secs: 60,
            watchdog_interval_secs: 30,
            sync_cooldown_secs: 30,
            playback_volume: 0.3,
            fade_steps: 10,
            fade_step_ms: 100,
            resolver_timeout_secs: 15,
            message_cooldown_secs: 2,
            dashboard_port: 8080,
            log_capacity: 50,
            worker_threads: num_cpus::get(),
            data_dir: "./data".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_bad_volume() {
        let config = Config {
            playback_volume: 3.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_warning_beyond_timeout() {
        let config = Config {
            inactivity_timeout_secs: 60,
            warning_window_secs: 90,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }
}
