use serde::Deserialize;

/// Outdial runtime configuration, loaded once at process start and passed
/// by reference — no ambient global state.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP server bind address
    pub bind_address: String,
    /// HTTP server port
    pub port: u16,
    /// Publicly reachable base URL, registered with the provider for
    /// callbacks (e.g. an ngrok tunnel during development)
    pub public_base_url: String,

    // Telephony provider credentials
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
    /// Verify provider signatures on inbound webhooks
    pub verify_signatures: bool,

    // Voice-clone synthesis service
    pub synthesis_url: String,
    /// Directory for stored audio artifacts
    pub media_dir: String,

    /// Upper bound on voicemail recording length, seconds
    pub record_max_secs: u32,

    // Reaper windows
    pub call_timeout_secs: i64,
    pub retention_secs: i64,
    pub sweep_interval_secs: u64,

    /// Log level
    pub log_level: String,
    /// Directory for rolling NDJSON logs; console-only when unset
    pub log_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            public_base_url: "http://localhost:8080".to_string(),
            account_sid: None,
            auth_token: None,
            from_number: None,
            verify_signatures: true,
            synthesis_url: "http://localhost:7860".to_string(),
            media_dir: "media".to_string(),
            record_max_secs: 120,
            call_timeout_secs: 300,
            retention_secs: 3600,
            sweep_interval_secs: 30,
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_address: std::env::var("OUTDIAL_BIND").unwrap_or(defaults.bind_address),
            port: std::env::var("OUTDIAL_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            public_base_url: std::env::var("OUTDIAL_PUBLIC_URL")
                .unwrap_or(defaults.public_base_url),
            account_sid: std::env::var("TWILIO_ACCOUNT_SID").ok(),
            auth_token: std::env::var("TWILIO_AUTH_TOKEN").ok(),
            from_number: std::env::var("TWILIO_PHONE_NUMBER").ok(),
            verify_signatures: std::env::var("OUTDIAL_VERIFY_SIGNATURES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.verify_signatures),
            synthesis_url: std::env::var("OUTDIAL_SYNTHESIS_URL")
                .unwrap_or(defaults.synthesis_url),
            media_dir: std::env::var("OUTDIAL_MEDIA_DIR").unwrap_or(defaults.media_dir),
            record_max_secs: std::env::var("OUTDIAL_RECORD_MAX_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.record_max_secs),
            call_timeout_secs: std::env::var("OUTDIAL_CALL_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.call_timeout_secs),
            retention_secs: std::env::var("OUTDIAL_RETENTION_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.retention_secs),
            sweep_interval_secs: std::env::var("OUTDIAL_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.sweep_interval_secs),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            log_dir: std::env::var("OUTDIAL_LOG_DIR").ok(),
        }
    }
}
