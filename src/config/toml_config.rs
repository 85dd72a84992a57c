use crate::domain::model::{ApplicationPool, BindingIp, Certificate};
use crate::utils::error::{Result, SiteError};
use crate::utils::validation::{validate_one_of, validate_path, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    pub host: HostConfig,
    pub defaults: Option<DefaultsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    pub store_path: String,
    /// 建立新主機檔時預先登錄的應用程式集區
    #[serde(default)]
    pub application_pools: Vec<String>,
    #[serde(default)]
    pub certificates: Vec<CertificateConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateConfig {
    pub name: String,
    pub thumbprint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub format: Option<String>,
}

impl ToolConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(SiteError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| SiteError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${SITE_STORE})，未定義的保持原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_RE
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    /// Config used when no file is given: a `host.json` store in the working
    /// directory.
    pub fn with_store_path(store_path: &str) -> Self {
        Self {
            host: HostConfig {
                store_path: store_path.to_string(),
                application_pools: Vec::new(),
                certificates: Vec::new(),
            },
            defaults: None,
            logging: None,
        }
    }

    pub fn store_path(&self) -> &str {
        &self.host.store_path
    }

    pub fn default_ip(&self) -> Result<BindingIp> {
        let raw = self
            .defaults
            .as_ref()
            .and_then(|d| d.ip_address.as_deref())
            .unwrap_or("*");
        raw.parse().map_err(|_| SiteError::InvalidConfigValueError {
            field: "defaults.ip_address".to_string(),
            value: raw.to_string(),
            reason: "Not an IP address or '*'".to_string(),
        })
    }

    pub fn application_pools(&self) -> Vec<ApplicationPool> {
        self.host
            .application_pools
            .iter()
            .map(|name| ApplicationPool { name: name.clone() })
            .collect()
    }

    pub fn certificates(&self) -> Vec<Certificate> {
        self.host
            .certificates
            .iter()
            .map(|c| Certificate {
                name: c.name.clone(),
                thumbprint: c.thumbprint.clone(),
            })
            .collect()
    }

    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }

    pub fn json_logging(&self) -> bool {
        self.logging
            .as_ref()
            .and_then(|l| l.format.as_deref())
            .map(|f| f.eq_ignore_ascii_case("json"))
            .unwrap_or(false)
    }
}

impl Validate for ToolConfig {
    fn validate(&self) -> Result<()> {
        validate_path("host.store_path", &self.host.store_path)?;
        self.default_ip()?;

        if let Some(logging) = &self.logging {
            if let Some(level) = &logging.level {
                validate_one_of(
                    "logging.level",
                    level,
                    &["trace", "debug", "info", "warn", "error"],
                )?;
            }
            if let Some(format) = &logging.format {
                validate_one_of("logging.format", format, &["compact", "json"])?;
            }
        }

        for cert in &self.host.certificates {
            if cert.name.trim().is_empty() || cert.thumbprint.trim().is_empty() {
                return Err(SiteError::InvalidConfigValueError {
                    field: "host.certificates".to_string(),
                    value: cert.name.clone(),
                    reason: "Certificates need both a name and a thumbprint".to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[host]
store_path = "./host.json"
application_pools = ["DefaultAppPool"]

[[host.certificates]]
name = "Servant"
thumbprint = "0FA1"

[defaults]
ip_address = "10.0.0.2"

[logging]
level = "debug"
format = "json"
"#;

        let config = ToolConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.store_path(), "./host.json");
        assert_eq!(config.application_pools()[0].name, "DefaultAppPool");
        assert_eq!(config.certificates()[0].thumbprint, "0FA1");
        assert_eq!(config.default_ip().unwrap().to_string(), "10.0.0.2");
        assert_eq!(config.log_level(), Some("debug"));
        assert!(config.json_logging());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("SITE_BINDER_TEST_STORE", "/var/lib/sites.json");

        let config = ToolConfig::from_toml_str(
            r#"
[host]
store_path = "${SITE_BINDER_TEST_STORE}"
"#,
        )
        .unwrap();
        assert_eq!(config.store_path(), "/var/lib/sites.json");

        std::env::remove_var("SITE_BINDER_TEST_STORE");
    }

    #[test]
    fn test_config_validation() {
        let bad_ip = ToolConfig::from_toml_str(
            r#"
[host]
store_path = "./host.json"

[defaults]
ip_address = "not-an-ip"
"#,
        )
        .unwrap();
        assert!(bad_ip.validate().is_err());

        let bad_format = ToolConfig::from_toml_str(
            r#"
[host]
store_path = "./host.json"

[logging]
format = "xml"
"#,
        )
        .unwrap();
        assert!(bad_format.validate().is_err());

        assert!(ToolConfig::with_store_path("").validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[host]\nstore_path = \"./from-file.json\"\n")
            .unwrap();

        let config = ToolConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.store_path(), "./from-file.json");
        assert_eq!(config.default_ip().unwrap(), BindingIp::Wildcard);
    }
}
