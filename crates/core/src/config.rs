use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub routine: RoutineConfig,
    pub telegram: TelegramConfig,
    pub github: GithubConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `WRING_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("WRING_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            routine: RoutineConfig::from_env_profiled(p),
            telegram: TelegramConfig::from_env_profiled(p),
            github: GithubConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  routine:     threads={}, tick={}s, lag={}s",
            self.routine.resolved_threads(),
            self.routine.tick_secs,
            self.routine.lag_secs
        );
        tracing::info!("  telegram:    configured={}", self.telegram.is_configured());
        tracing::info!(
            "  github:      api={}, window={}s",
            self.github.api_url,
            self.github.window_secs
        );
    }
}

// ── Routine ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutineConfig {
    /// Worker pool size. 0 = four per available core.
    pub threads: usize,
    /// Delay between the end of one run and the start of the next.
    pub tick_secs: u64,
    /// Per-run deadline, also the shutdown grace period.
    pub lag_secs: u64,
}

impl Default for RoutineConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            tick_secs: 60,
            lag_secs: 600,
        }
    }
}

impl RoutineConfig {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        Self {
            threads: profiled_env_u64(p, "ROUTINE_THREADS", defaults.threads as u64) as usize,
            tick_secs: profiled_env_u64(p, "ROUTINE_TICK_SECS", defaults.tick_secs),
            lag_secs: profiled_env_u64(p, "ROUTINE_LAG_SECS", defaults.lag_secs),
        }
    }

    /// Resolve the pool size (0 means four per available core).
    pub fn resolved_threads(&self) -> usize {
        if self.threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get() << 2)
                .unwrap_or(16)
        } else {
            self.threads
        }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }

    pub fn lag(&self) -> Duration {
        Duration::from_secs(self.lag_secs)
    }
}

// ── Telegram ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token; `${VAR}` references are resolved by the notifier.
    pub token: Option<String>,
}

impl TelegramConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            token: profiled_env_opt(p, "TELEGRAM_TOKEN"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }
}

// ── GitHub ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    pub api_url: String,
    /// How far back notifications are listed on every run.
    pub window_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            window_secs: 180,
        }
    }
}

impl GithubConfig {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        Self {
            api_url: profiled_env_or(p, "GITHUB_API_URL", &defaults.api_url),
            window_secs: profiled_env_u64(p, "GITHUB_WINDOW_SECS", defaults.window_secs),
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}
