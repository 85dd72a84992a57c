use crate::domain::model::{Binding, BindingIp};

/// Wildcard overlaps every address; concrete addresses only overlap when equal.
pub fn ip_overlaps(a: &BindingIp, b: &BindingIp) -> bool {
    match (a, b) {
        (BindingIp::Wildcard, _) | (_, BindingIp::Wildcard) => true,
        (BindingIp::Addr(x), BindingIp::Addr(y)) => x == y,
    }
}

/// Host names compare ASCII case-insensitively, as DNS does.
pub fn hostnames_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Two bindings collide when they could both answer the same request:
/// same port, same host name and overlapping IPs. Protocol is irrelevant.
pub fn bindings_conflict(a: &Binding, b: &Binding) -> bool {
    a.port == b.port && hostnames_match(&a.hostname, &b.hostname) && ip_overlaps(&a.ip, &b.ip)
}
