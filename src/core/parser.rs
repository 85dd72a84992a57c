use crate::domain::model::{
    fields, Binding, BindingInput, BindingIp, Certificate, CertificateRef, ErrorKind, Protocol,
    ValidationError,
};
use regex::Regex;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::LazyLock;
use url::{Host, Url};

pub const INVALID_BINDING_MESSAGE: &str = "The binding is invalid.";

static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*$").expect("scheme pattern"));

static HOSTNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9\-]{0,61}[a-z0-9])?(\.[a-z0-9]([a-z0-9\-]{0,61}[a-z0-9])?)*$")
        .expect("hostname pattern")
});

/// Turns raw binding input into structured bindings.
///
/// Parsing is pure: the parser only consults the certificate snapshot it was
/// built with, so identical input always yields the identical result.
#[derive(Debug, Clone)]
pub struct BindingParser<'a> {
    certificates: &'a [Certificate],
    default_ip: BindingIp,
}

/// 解析 `scheme://host[:port]` 後的中間結果
#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedUri {
    protocol: Protocol,
    hostname: String,
    host_ip: Option<IpAddr>,
    port: u16,
}

impl<'a> BindingParser<'a> {
    pub fn new(certificates: &'a [Certificate]) -> Self {
        Self {
            certificates,
            default_ip: BindingIp::Wildcard,
        }
    }

    /// IP used when the ip field is left blank.
    pub fn with_default_ip(mut self, default_ip: BindingIp) -> Self {
        self.default_ip = default_ip;
        self
    }

    /// Parses the binding at form position `index`, reporting every problem
    /// with that binding at once.
    pub fn parse(
        &self,
        index: usize,
        input: &BindingInput,
    ) -> Result<Binding, Vec<ValidationError>> {
        let mut errors = Vec::new();

        let uri = parse_user_input(&input.user_input);
        if uri.is_none() {
            tracing::debug!("Binding {} rejected: '{}'", index, input.user_input);
            errors.push(ValidationError::new(
                ErrorKind::InvalidBindingFormat,
                &fields::indexed(fields::BINDING_USER_INPUT, index),
                INVALID_BINDING_MESSAGE,
            ));
        }

        let ip = match self.resolve_ip(&input.ip_address, uri.as_ref()) {
            Ok(ip) => Some(ip),
            Err(message) => {
                errors.push(ValidationError::new(
                    ErrorKind::InvalidIpAddress,
                    &fields::indexed(fields::BINDING_IP_ADDRESS, index),
                    message,
                ));
                None
            }
        };

        let certificate = match &uri {
            Some(uri) if uri.protocol == Protocol::Https => {
                match self.resolve_certificate(&input.certificate_name) {
                    Ok(cert) => Some(cert),
                    Err((kind, message)) => {
                        errors.push(ValidationError::new(
                            kind,
                            &fields::indexed(fields::BINDING_CERTIFICATE_NAME, index),
                            message,
                        ));
                        None
                    }
                }
            }
            _ => None,
        };

        match (uri, ip) {
            (Some(uri), Some(ip)) if errors.is_empty() => Ok(Binding {
                protocol: uri.protocol,
                ip,
                port: uri.port,
                hostname: uri.hostname,
                certificate,
            }),
            _ => Err(errors),
        }
    }

    /// Parses every binding, collecting all errors instead of stopping at the
    /// first one.
    pub fn parse_all(&self, inputs: &[BindingInput]) -> Result<Vec<Binding>, Vec<ValidationError>> {
        let mut bindings = Vec::with_capacity(inputs.len());
        let mut errors = Vec::new();

        for (index, input) in inputs.iter().enumerate() {
            match self.parse(index, input) {
                Ok(binding) => bindings.push(binding),
                Err(mut binding_errors) => errors.append(&mut binding_errors),
            }
        }

        if errors.is_empty() {
            Ok(bindings)
        } else {
            Err(errors)
        }
    }

    fn resolve_ip(&self, raw: &str, uri: Option<&ParsedUri>) -> Result<BindingIp, String> {
        let raw = raw.trim();
        let explicit = if raw.is_empty() {
            None
        } else {
            Some(
                raw.parse::<BindingIp>()
                    .map_err(|_| format!("'{}' is not a valid IP address.", raw))?,
            )
        };

        // 以 IP 作為主機時，IP 欄位只能留白、萬用或相同位址
        match (explicit, uri.and_then(|u| u.host_ip)) {
            (None, Some(host_ip)) | (Some(BindingIp::Wildcard), Some(host_ip)) => {
                Ok(BindingIp::Addr(host_ip))
            }
            (Some(BindingIp::Addr(addr)), Some(host_ip)) if addr != host_ip => Err(format!(
                "The IP address '{}' does not match the binding host '{}'.",
                addr, host_ip
            )),
            (Some(ip), _) => Ok(ip),
            (None, None) => Ok(self.default_ip),
        }
    }

    fn resolve_certificate(&self, name: &str) -> Result<CertificateRef, (ErrorKind, String)> {
        let name = name.trim();
        if name.is_empty() {
            return Err((
                ErrorKind::CertificateRequired,
                "A certificate is required for https bindings.".to_string(),
            ));
        }

        self.certificates
            .iter()
            .find(|cert| cert.name.eq_ignore_ascii_case(name))
            .map(CertificateRef::from)
            .ok_or_else(|| {
                (
                    ErrorKind::CertificateNotFound,
                    format!("The certificate '{}' could not be found.", name),
                )
            })
    }
}

fn parse_user_input(raw: &str) -> Option<ParsedUri> {
    let raw = raw.trim();
    if raw.is_empty() || raw.chars().any(is_illegal_char) || !has_valid_escapes(raw) {
        return None;
    }

    let (scheme, _) = raw.split_once("://")?;
    if !SCHEME_RE.is_match(scheme) {
        return None;
    }

    let url = Url::parse(raw).ok()?;
    let protocol = match url.scheme() {
        "http" => Protocol::Http,
        "https" => Protocol::Https,
        _ => return None,
    };

    if !url.username().is_empty()
        || url.password().is_some()
        || url.query().is_some()
        || url.fragment().is_some()
        || !matches!(url.path(), "" | "/")
    {
        return None;
    }

    let (hostname, host_ip) = match url.host()? {
        Host::Domain(domain) => {
            if domain.len() > 253 || !HOSTNAME_RE.is_match(domain) {
                return None;
            }
            (domain.to_string(), None)
        }
        Host::Ipv4(addr) => {
            // 只接受四段十進位寫法，不接受 `1.2.3`、`0x7f.1` 這類舊式簡寫
            if raw_host(raw).parse::<Ipv4Addr>().ok()? != addr {
                return None;
            }
            (String::new(), Some(IpAddr::V4(addr)))
        }
        Host::Ipv6(addr) => (String::new(), Some(IpAddr::V6(addr))),
    };

    let port = url.port_or_known_default()?;
    if port == 0 {
        return None;
    }

    Some(ParsedUri {
        protocol,
        hostname,
        host_ip,
        port,
    })
}

/// Host text exactly as typed, between `://` and the optional port.
fn raw_host(raw: &str) -> &str {
    let rest = raw.split_once("://").map_or(raw, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    if authority.starts_with('[') {
        return authority.split_once(']').map_or(authority, |(host, _)| host);
    }
    authority.rsplit_once(':').map_or(authority, |(host, _)| host)
}

fn is_illegal_char(c: char) -> bool {
    c.is_whitespace()
        || c.is_control()
        || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '\\' | '^' | '`')
}

/// 每個 `%` 後必須緊接兩位十六進位數字
fn has_valid_escapes(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .map(|pair| pair.iter().all(u8::is_ascii_hexdigit))
                .unwrap_or(false);
            if !valid {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}
