//! Network policy: client IP allow-list, TLS requirement, authorization hook.

use std::net::IpAddr;
use std::str::FromStr;

use ipnet::IpNet;

use crate::gate::context::RequestContext;
use crate::gate::denial::Denial;

/// Parse an allow-list entry. A bare address is treated as a host network.
pub fn parse_network(entry: &str) -> Result<IpNet, ipnet::AddrParseError> {
    let entry = entry.trim();
    match IpNet::from_str(entry) {
        Ok(net) => Ok(net),
        Err(e) => IpAddr::from_str(entry).map(IpNet::from).map_err(|_| e),
    }
}

/// Empty allow-list means unrestricted.
pub fn check_client_ip(client_ip: Option<IpAddr>, allowed: &[IpNet]) -> Result<(), Denial> {
    if allowed.is_empty() {
        return Ok(());
    }
    let Some(ip) = client_ip.map(|ip| ip.to_canonical()) else {
        return Err(Denial::IpDenied);
    };
    if allowed.iter().any(|net| net.contains(&ip)) {
        Ok(())
    } else {
        Err(Denial::IpDenied)
    }
}

pub fn check_tls(tls: bool, require_tls: bool) -> Result<(), Denial> {
    if require_tls && !tls {
        return Err(Denial::TlsRequired);
    }
    Ok(())
}

/// Authorization decision for a request that passed every other check.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, ctx: &RequestContext, key: Option<&[u8]>) -> bool;
}

/// Default authorizer: everything that got this far is allowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _ctx: &RequestContext, _key: Option<&[u8]>) -> bool {
        true
    }
}

pub fn check_authorized(
    authorizer: &dyn Authorizer,
    ctx: &RequestContext,
    key: Option<&[u8]>,
) -> Result<(), Denial> {
    if authorizer.authorize(ctx, key) {
        Ok(())
    } else {
        Err(Denial::NotAuthorized)
    }
}
