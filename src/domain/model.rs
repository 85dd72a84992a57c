use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// 表單欄位名稱，錯誤訊息以此回報給呼叫端
pub mod fields {
    pub const NAME: &str = "name";
    pub const SITE_PATH: &str = "sitepath";
    pub const APPLICATION_POOL: &str = "applicationpool";
    pub const BINDING_USER_INPUT: &str = "bindingsuserinput";
    pub const BINDING_IP_ADDRESS: &str = "bindingsipaddress";
    pub const BINDING_CERTIFICATE_NAME: &str = "bindingscertificatename";

    /// `bindingsuserinput[0]` 形式的索引欄位
    pub fn indexed(field: &str, index: usize) -> String {
        format!("{}[{}]", field, index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub u64);

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Protocol::Http => 80,
            Protocol::Https => 443,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 綁定的 IP：萬用字元 `*` 或具體位址
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum BindingIp {
    Wildcard,
    Addr(IpAddr),
}

impl BindingIp {
    pub fn is_wildcard(&self) -> bool {
        matches!(self, BindingIp::Wildcard)
    }
}

impl fmt::Display for BindingIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingIp::Wildcard => f.write_str("*"),
            BindingIp::Addr(addr) => write!(f, "{}", addr),
        }
    }
}

impl FromStr for BindingIp {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(BindingIp::Wildcard);
        }
        // IPv6 亦接受方括號寫法 [::1]
        let unbracketed = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .unwrap_or(trimmed);
        unbracketed.parse::<IpAddr>().map(BindingIp::Addr)
    }
}

impl From<BindingIp> for String {
    fn from(ip: BindingIp) -> Self {
        ip.to_string()
    }
}

impl TryFrom<String> for BindingIp {
    type Error = std::net::AddrParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Certificate {
    pub name: String,
    pub thumbprint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CertificateRef {
    pub name: String,
    pub thumbprint: String,
}

impl From<&Certificate> for CertificateRef {
    fn from(cert: &Certificate) -> Self {
        Self {
            name: cert.name.clone(),
            thumbprint: cert.thumbprint.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Binding {
    pub protocol: Protocol,
    pub ip: BindingIp,
    pub port: u16,
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<CertificateRef>,
}

impl Binding {
    pub fn http(hostname: &str, port: u16) -> Self {
        Self {
            protocol: Protocol::Http,
            ip: BindingIp::Wildcard,
            port,
            hostname: hostname.to_string(),
            certificate: None,
        }
    }

    pub fn with_ip(mut self, ip: BindingIp) -> Self {
        self.ip = ip;
        self
    }

    /// Renders the binding back to the `scheme://host:port` form users type.
    pub fn user_input(&self) -> String {
        let host = match (&self.ip, self.hostname.is_empty()) {
            (BindingIp::Addr(IpAddr::V6(addr)), true) => format!("[{}]", addr),
            (BindingIp::Addr(addr), true) => addr.to_string(),
            (_, _) => self.hostname.clone(),
        };
        format!("{}://{}:{}", self.protocol, host, self.port)
    }

    /// The host's native `ip:port:hostname` binding triple.
    pub fn binding_information(&self) -> String {
        format!("{}:{}:{}", self.ip, self.port, self.hostname)
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.user_input(), self.binding_information())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationPool {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    pub name: String,
    pub site_path: String,
    #[serde(default)]
    pub application_pool: Option<String>,
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

/// 單一綁定的原始輸入，對應表單上同一索引的三個欄位
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingInput {
    pub user_input: String,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub certificate_name: String,
}

impl BindingInput {
    pub fn new(user_input: &str, ip_address: &str, certificate_name: &str) -> Self {
        Self {
            user_input: user_input.to_string(),
            ip_address: ip_address.to_string(),
            certificate_name: certificate_name.to_string(),
        }
    }
}

/// 建立或更新站台的期望狀態
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRequest {
    pub name: String,
    pub site_path: String,
    #[serde(default)]
    pub application_pool: Option<String>,
    #[serde(default)]
    pub bindings: Vec<BindingInput>,
}

impl SiteRequest {
    /// Builds a request from submitted form pairs. Repeated binding keys are
    /// zipped by position; a blank `applicationpool` means no pool.
    pub fn from_form<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut request = SiteRequest::default();
        let mut user_inputs = Vec::new();
        let mut ips = Vec::new();
        let mut certificates = Vec::new();

        for (key, value) in pairs {
            match key {
                fields::NAME => request.name = value.to_string(),
                fields::SITE_PATH => request.site_path = value.to_string(),
                fields::APPLICATION_POOL => {
                    let pool = value.trim();
                    request.application_pool = (!pool.is_empty()).then(|| pool.to_string());
                }
                fields::BINDING_USER_INPUT => user_inputs.push(value),
                fields::BINDING_IP_ADDRESS => ips.push(value),
                fields::BINDING_CERTIFICATE_NAME => certificates.push(value),
                _ => tracing::debug!("Ignoring unknown form field: {}", key),
            }
        }

        request.bindings = user_inputs
            .iter()
            .enumerate()
            .map(|(i, input)| {
                BindingInput::new(
                    input,
                    ips.get(i).copied().unwrap_or(""),
                    certificates.get(i).copied().unwrap_or(""),
                )
            })
            .collect();

        request
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidBindingFormat,
    InvalidIpAddress,
    CertificateRequired,
    CertificateNotFound,
    DuplicateBinding,
    DuplicateName,
    MissingField,
    ApplicationPoolNotFound,
    SiteNotFound,
    HostRejected,
    HostUnavailable,
}

/// 欄位層級的驗證錯誤，序列化為 `{"Message": ..., "PropertyName": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    #[serde(skip_serializing, default = "default_kind")]
    pub kind: ErrorKind,
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "PropertyName")]
    pub property_name: String,
}

fn default_kind() -> ErrorKind {
    ErrorKind::HostRejected
}

impl ValidationError {
    pub fn new(kind: ErrorKind, property_name: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            property_name: property_name.to_string(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.property_name, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_binding_ip_parsing() {
        assert_eq!("".parse::<BindingIp>().unwrap(), BindingIp::Wildcard);
        assert_eq!(" * ".parse::<BindingIp>().unwrap(), BindingIp::Wildcard);
        assert_eq!(
            "10.0.0.5".parse::<BindingIp>().unwrap(),
            BindingIp::Addr(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)))
        );
        assert!("[::1]".parse::<BindingIp>().is_ok());
        assert!("10.0.0".parse::<BindingIp>().is_err());
        assert!("localhost".parse::<BindingIp>().is_err());
    }

    #[test]
    fn test_binding_rendering() {
        let binding = Binding::http("unit-test-site.com", 80);
        assert_eq!(binding.user_input(), "http://unit-test-site.com:80");
        assert_eq!(binding.binding_information(), "*:80:unit-test-site.com");

        let bare_ip = Binding::http("", 8080).with_ip("::1".parse().unwrap());
        assert_eq!(bare_ip.user_input(), "http://[::1]:8080");
    }

    #[test]
    fn test_validation_error_serializes_like_form_errors() {
        let error = ValidationError::new(
            ErrorKind::InvalidBindingFormat,
            &fields::indexed(fields::BINDING_USER_INPUT, 0),
            "The binding is invalid.",
        );
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains(
            "\"Message\":\"The binding is invalid.\",\"PropertyName\":\"bindingsuserinput[0]\""
        ));
    }

    #[test]
    fn test_site_request_from_form() {
        let request = SiteRequest::from_form([
            ("name", "unit-test-site"),
            ("sitepath", r"c:\inetpub\wwwroot"),
            ("bindingsuserinput", "http://unit-test-site.com"),
            ("bindingsipaddress", "*"),
            ("bindingscertificatename", "Servant"),
            ("bindingsuserinput", "https://secure.unit-test-site.com"),
            ("applicationpool", ""),
        ]);

        assert_eq!(request.name, "unit-test-site");
        assert_eq!(request.application_pool, None);
        assert_eq!(request.bindings.len(), 2);
        assert_eq!(request.bindings[0].certificate_name, "Servant");
        assert_eq!(request.bindings[1].ip_address, "");
    }

    #[test]
    fn test_binding_ip_serde_uses_plain_strings() {
        let binding = Binding::http("example.com", 80);
        let json = serde_json::to_value(&binding).unwrap();
        assert_eq!(json["ip"], "*");
        assert_eq!(json["protocol"], "http");

        let back: Binding = serde_json::from_value(json).unwrap();
        assert_eq!(back, binding);
    }
}
