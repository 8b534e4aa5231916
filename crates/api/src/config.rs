use n3_core::policy::{
    CoordinationPolicy, DEFAULT_ATTACH_BATCH_LIMIT, DEFAULT_COVERAGE_MIN_SAMPLE,
    DEFAULT_COVERAGE_TARGET_PCT, DEFAULT_DRIFT_AGE_THRESHOLD_DAYS, DEFAULT_PROPOSAL_TURN_CAP,
    DEFAULT_RISK_FINDING_FLOOR,
};

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long background tasks get to drain on shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = env_parse("PORT", 3000);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env_parse("REQUEST_TIMEOUT_SECS", 30);
        let shutdown_timeout_secs: u64 = env_parse("SHUTDOWN_TIMEOUT_SECS", 30);

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
        }
    }
}

/// Load the coordination policy from environment variables.
///
/// | Env Var                    | Default |
/// |----------------------------|---------|
/// | `ATTACH_BATCH_LIMIT`       | `10`    |
/// | `PROPOSAL_TURN_CAP`        | `3`     |
/// | `STAKEHOLDER_MAY_INITIATE` | `true`  |
/// | `DRIFT_AGE_THRESHOLD_DAYS` | `30`    |
/// | `COVERAGE_MIN_SAMPLE`      | `30`    |
/// | `COVERAGE_TARGET_PCT`      | `80`    |
/// | `RISK_FINDING_FLOOR`       | `0.35`  |
///
/// Panics on unparseable or out-of-range values so misconfiguration fails
/// at startup.
pub fn policy_from_env() -> CoordinationPolicy {
    let policy = CoordinationPolicy {
        attach_batch_limit: env_parse("ATTACH_BATCH_LIMIT", DEFAULT_ATTACH_BATCH_LIMIT),
        proposal_turn_cap: env_parse("PROPOSAL_TURN_CAP", DEFAULT_PROPOSAL_TURN_CAP),
        stakeholder_may_initiate: env_parse("STAKEHOLDER_MAY_INITIATE", true),
        drift_age_threshold_days: env_parse(
            "DRIFT_AGE_THRESHOLD_DAYS",
            DEFAULT_DRIFT_AGE_THRESHOLD_DAYS,
        ),
        coverage_min_sample: env_parse("COVERAGE_MIN_SAMPLE", DEFAULT_COVERAGE_MIN_SAMPLE),
        coverage_target_pct: env_parse("COVERAGE_TARGET_PCT", DEFAULT_COVERAGE_TARGET_PCT),
        risk_finding_floor: env_parse("RISK_FINDING_FLOOR", DEFAULT_RISK_FINDING_FLOOR),
    };
    if let Err(e) = policy.validate() {
        panic!("Invalid coordination policy: {e}");
    }
    policy
}

fn env_parse<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{name} must be a valid value: {e}")),
        Err(_) => default,
    }
}
