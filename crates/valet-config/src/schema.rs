use serde::{Deserialize, Serialize};

/// Root configuration, mapping to `valet.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValetConfig {
    pub link: LinkConfig,
    pub service: ServiceConfig,
    pub blades: BladesConfig,
    pub logging: LoggingConfig,
}

// ── Link (remote store) ────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Root URL of the remote request/response store.
    pub base_url: String,
    /// Per-request timeout for store calls.
    pub timeout_secs: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8780/api".into(),
            timeout_secs: 10,
        }
    }
}

// ── Service schedules ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Fast tick period in milliseconds.
    pub tick_interval_ms: u64,
    /// Network tick period in milliseconds. The network schedule re-arms
    /// only after a full sync+dispatch cycle completes.
    pub net_interval_ms: u64,
    /// Period of the periodic status report, in seconds. 0 disables it.
    pub status_interval_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            net_interval_ms: 2000,
            status_interval_secs: 90,
        }
    }
}

// ── Blades ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BladesConfig {
    /// Shared token a blade must present with `--postblade`. When unset,
    /// every postblade is refused.
    pub join_token: Option<String>,
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// tracing filter directive, e.g. "info" or "valet=debug,info".
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single finding from [`ValetConfig::validate`].
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Warning,
    Error,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl ValetConfig {
    /// Validate the configuration. Error-severity findings fail the load;
    /// the rest come back for the caller to log.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut findings = Vec::new();

        if self.link.base_url.is_empty() {
            findings.push(ConfigWarning {
                field: "link.base_url".into(),
                message: "base_url is empty".into(),
                severity: WarningSeverity::Error,
            });
        } else if !self.link.base_url.starts_with("http://")
            && !self.link.base_url.starts_with("https://")
        {
            findings.push(ConfigWarning {
                field: "link.base_url".into(),
                message: format!("'{}' is not an http(s) URL", self.link.base_url),
                severity: WarningSeverity::Error,
            });
        }

        if self.service.tick_interval_ms == 0 {
            findings.push(ConfigWarning {
                field: "service.tick_interval_ms".into(),
                message: "tick interval of 0 would spin the dispatch loop".into(),
                severity: WarningSeverity::Error,
            });
        }

        if self.service.net_interval_ms == 0 {
            findings.push(ConfigWarning {
                field: "service.net_interval_ms".into(),
                message: "net interval of 0 would hammer the remote store".into(),
                severity: WarningSeverity::Error,
            });
        } else if self.service.net_interval_ms < self.service.tick_interval_ms {
            findings.push(ConfigWarning {
                field: "service.net_interval_ms".into(),
                message: "net interval is shorter than the tick interval".into(),
                severity: WarningSeverity::Warning,
            });
        }

        if self.blades.join_token.is_none() {
            findings.push(ConfigWarning {
                field: "blades.join_token".into(),
                message: "no join token set, postblade commands will be refused".into(),
                severity: WarningSeverity::Warning,
            });
        }

        let errors: Vec<String> = findings
            .iter()
            .filter(|f| f.severity == WarningSeverity::Error)
            .map(|f| f.to_string())
            .collect();
        if !errors.is_empty() {
            return Err(errors.join("; "));
        }
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_clean_of_errors() {
        let config = ValetConfig::default();
        let findings = config.validate().unwrap();
        // The default config has no join token, which is a warning only.
        assert!(findings
            .iter()
            .all(|f| f.severity == WarningSeverity::Warning));
    }

    #[test]
    fn zero_tick_interval_is_an_error() {
        let mut config = ValetConfig::default();
        config.service.tick_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_http_base_url_is_an_error() {
        let mut config = ValetConfig::default();
        config.link.base_url = "ftp://store".into();
        assert!(config.validate().is_err());
    }
}
