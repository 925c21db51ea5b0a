//! Role-specific endpoint URLs derived from a service's port map
//!
//! Extraction never fails. A role with no matching port yields an empty
//! string, which callers must treat as "not discovered".

use crate::error::{Error, Result};
use enclave_client::{PortInfo, RawService};
use serde::{Deserialize, Serialize};
use url::Url;

/// Endpoints of an execution client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionEndpoints {
    /// JSON-RPC over HTTP
    pub rpc_url: String,
    /// JSON-RPC over WebSocket
    pub ws_url: String,
    /// Authenticated Engine API
    pub engine_url: String,
    /// Peer-to-peer listener
    pub p2p_url: String,
    /// Prometheus metrics
    pub metrics_url: String,
}

/// Endpoints of a consensus (beacon) client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusEndpoints {
    /// Beacon API
    pub beacon_url: String,
    /// Peer-to-peer listener
    pub p2p_url: String,
    /// Prometheus metrics
    pub metrics_url: String,
}

/// Endpoints of a validator client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorEndpoints {
    /// Keymanager / validator API
    pub api_url: String,
    /// Prometheus metrics
    pub metrics_url: String,
}

/// Extract execution client endpoints
pub fn extract_execution_endpoints(service: &RawService) -> ExecutionEndpoints {
    let mut rpc = None;
    let mut ws = None;
    let mut engine = None;
    let mut p2p = None;
    let mut metrics = None;

    for (name, port) in &service.ports {
        let name = name.to_lowercase();
        if name.contains("engine") {
            first_slot(&mut engine, port);
        } else if name.contains("ws") || name.contains("websocket") {
            first_slot(&mut ws, port);
        } else if name.contains("rpc") {
            first_slot(&mut rpc, port);
        } else if is_p2p(&name) {
            p2p_slot(&mut p2p, port);
        } else if name.contains("metrics") {
            first_slot(&mut metrics, port);
        }
    }

    let rpc_url = match rpc {
        Some(port) => port_url(service, port, "http"),
        None => fallback_http_url(service),
    };

    ExecutionEndpoints {
        rpc_url,
        ws_url: render(service, ws, "ws"),
        engine_url: render(service, engine, "http"),
        p2p_url: render(service, p2p, "tcp"),
        metrics_url: render(service, metrics, "http"),
    }
}

/// Extract consensus client endpoints
pub fn extract_consensus_endpoints(service: &RawService) -> ConsensusEndpoints {
    let mut beacon = None;
    let mut p2p = None;
    let mut metrics = None;

    for (name, port) in &service.ports {
        let name = name.to_lowercase();
        if name.contains("metrics") {
            first_slot(&mut metrics, port);
        } else if name.contains("http") || name.contains("beacon") {
            first_slot(&mut beacon, port);
        } else if is_p2p(&name) {
            p2p_slot(&mut p2p, port);
        }
    }

    let beacon_url = match beacon {
        Some(port) => port_url(service, port, "http"),
        None => fallback_http_url(service),
    };

    ConsensusEndpoints {
        beacon_url,
        p2p_url: render(service, p2p, "tcp"),
        metrics_url: render(service, metrics, "http"),
    }
}

/// Extract validator client endpoints
pub fn extract_validator_endpoints(service: &RawService) -> ValidatorEndpoints {
    let mut api = None;
    let mut metrics = None;

    for (name, port) in &service.ports {
        let name = name.to_lowercase();
        if name.contains("metrics") {
            first_slot(&mut metrics, port);
        } else if name.contains("api") {
            first_slot(&mut api, port);
        }
    }

    ValidatorEndpoints {
        api_url: render(service, api, "http"),
        metrics_url: render(service, metrics, "http"),
    }
}

/// URL for a port: the orchestrator's precomputed URL when present,
/// otherwise `{scheme}://{ip}:{number}` with `localhost` standing in for a
/// missing IP
pub fn port_url(service: &RawService, port: &PortInfo, scheme: &str) -> String {
    if let Some(url) = port.precomputed() {
        return url.to_string();
    }
    let host = if service.ip_address.is_empty() {
        "localhost"
    } else {
        service.ip_address.as_str()
    };
    format!("{}://{}:{}", scheme, host, port.number)
}

/// Split an endpoint URL into host and port
///
/// Without an explicit port, `http`/`ws` default to 80 and `https`/`wss`
/// to 443. Any other scheme must name its port.
pub fn parse_endpoint_url(endpoint: &str) -> Result<(String, u16)> {
    let url = Url::parse(endpoint).map_err(|e| Error::invalid_endpoint(endpoint, e.to_string()))?;

    let host = match url.host_str() {
        Some(host) if !host.is_empty() => host.to_string(),
        _ => return Err(Error::invalid_endpoint(endpoint, "missing host")),
    };

    // `Url::port` elides a scheme's default port, so map those back here
    let port = match url.port() {
        Some(port) => port,
        None => match url.scheme() {
            "http" | "ws" => 80,
            "https" | "wss" => 443,
            scheme => explicit_port(endpoint).ok_or_else(|| {
                Error::invalid_endpoint(endpoint, format!("unknown scheme '{}', no port", scheme))
            })?,
        },
    };

    Ok((host, port))
}

/// Port written in the authority of `endpoint`, even when it is the
/// scheme's default and the parsed URL dropped it (`ftp://host:21`)
fn explicit_port(endpoint: &str) -> Option<u16> {
    let (_, rest) = endpoint.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, hp)| hp);
    if host_port.ends_with(']') {
        return None;
    }
    let (_, port) = host_port.rsplit_once(':')?;
    port.parse().ok()
}

/// Check that an endpoint is non-empty and parseable
pub fn validate_endpoint(endpoint: &str) -> Result<()> {
    if endpoint.trim().is_empty() {
        return Err(Error::EmptyEndpoint);
    }
    parse_endpoint_url(endpoint).map(|_| ())
}

fn is_p2p(lowercase_name: &str) -> bool {
    lowercase_name.contains("discovery") || lowercase_name.contains("p2p")
}

/// Keep the first port seen for a role
fn first_slot<'a>(slot: &mut Option<&'a PortInfo>, port: &'a PortInfo) {
    if slot.is_none() {
        *slot = Some(port);
    }
}

/// Keep the first P2P port, replacing a UDP pick with a later TCP one
fn p2p_slot<'a>(slot: &mut Option<&'a PortInfo>, port: &'a PortInfo) {
    let replace = match *slot {
        None => true,
        Some(current) => !current.is_tcp() && port.is_tcp(),
    };
    if replace {
        *slot = Some(port);
    }
}

fn render(service: &RawService, port: Option<&PortInfo>, scheme: &str) -> String {
    port.map(|port| port_url(service, port, scheme))
        .unwrap_or_default()
}

/// Primary HTTP endpoint when no port carries the expected role name
fn fallback_http_url(service: &RawService) -> String {
    let by_name = service.ports.iter().find(|(name, _)| {
        let name = name.to_lowercase();
        name.contains("http") || name.contains("api")
    });
    if let Some((_, port)) = by_name {
        return port_url(service, port, "http");
    }

    service
        .ports
        .values()
        .find(|port| port.is_tcp())
        .map(|port| port_url(service, port, "http"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geth() -> RawService {
        RawService::new("el-1-geth-lighthouse")
            .with_ip("10.0.0.2")
            .with_port("rpc", PortInfo::tcp(8545))
            .with_port("ws", PortInfo::tcp(8546))
            .with_port("engine-rpc", PortInfo::tcp(8551))
            .with_port("tcp-discovery", PortInfo::tcp(30303))
            .with_port("udp-discovery", PortInfo::udp(30303))
            .with_port("metrics", PortInfo::tcp(9001))
    }

    #[test]
    fn test_execution_roles() {
        let endpoints = extract_execution_endpoints(&geth());
        assert_eq!(endpoints.rpc_url, "http://10.0.0.2:8545");
        assert_eq!(endpoints.ws_url, "ws://10.0.0.2:8546");
        assert_eq!(endpoints.engine_url, "http://10.0.0.2:8551");
        assert_eq!(endpoints.p2p_url, "tcp://10.0.0.2:30303");
        assert_eq!(endpoints.metrics_url, "http://10.0.0.2:9001");
    }

    #[test]
    fn test_precomputed_url_wins() {
        let service = RawService::new("el-1-geth-lighthouse")
            .with_ip("10.0.0.2")
            .with_port("rpc", PortInfo::tcp(8545).with_url("http://10.0.0.1:8545"));
        assert_eq!(
            extract_execution_endpoints(&service).rpc_url,
            "http://10.0.0.1:8545"
        );
    }

    #[test]
    fn test_empty_precomputed_url_is_synthesized() {
        let service = RawService::new("el-1-geth-lighthouse")
            .with_ip("10.0.0.2")
            .with_port("rpc", PortInfo::tcp(8545).with_url(""));
        assert_eq!(
            extract_execution_endpoints(&service).rpc_url,
            "http://10.0.0.2:8545"
        );
    }

    #[test]
    fn test_missing_ip_uses_localhost() {
        let service = RawService::new("el-1-geth-lighthouse").with_port("rpc", PortInfo::tcp(8545));
        assert_eq!(
            extract_execution_endpoints(&service).rpc_url,
            "http://localhost:8545"
        );
    }

    #[test]
    fn test_rpc_fallbacks() {
        let named = RawService::new("el-1-besu")
            .with_ip("10.0.0.3")
            .with_port("http", PortInfo::tcp(8545));
        assert_eq!(extract_execution_endpoints(&named).rpc_url, "http://10.0.0.3:8545");

        let any_tcp = RawService::new("el-1-besu")
            .with_ip("10.0.0.3")
            .with_port("a-udp", PortInfo::udp(30303))
            .with_port("z-custom", PortInfo::tcp(9999));
        assert_eq!(extract_execution_endpoints(&any_tcp).rpc_url, "http://10.0.0.3:9999");

        let nothing = RawService::new("el-1-besu").with_port("udp", PortInfo::udp(30303));
        let endpoints = extract_execution_endpoints(&nothing);
        assert!(endpoints.rpc_url.is_empty());
        assert!(endpoints.engine_url.is_empty());
    }

    #[test]
    fn test_consensus_roles() {
        let service = RawService::new("cl-1-lighthouse-geth")
            .with_ip("10.0.0.4")
            .with_port("http", PortInfo::tcp(4000))
            .with_port("metrics", PortInfo::tcp(5054))
            .with_port("udp-discovery", PortInfo::udp(9000))
            .with_port("tcp-discovery", PortInfo::tcp(9000));
        let endpoints = extract_consensus_endpoints(&service);
        assert_eq!(endpoints.beacon_url, "http://10.0.0.4:4000");
        assert_eq!(endpoints.metrics_url, "http://10.0.0.4:5054");
        assert_eq!(endpoints.p2p_url, "tcp://10.0.0.4:9000");
    }

    #[test]
    fn test_validator_roles() {
        let service = RawService::new("vc-1-geth-lighthouse")
            .with_ip("10.0.0.5")
            .with_port("validator-api", PortInfo::tcp(5056))
            .with_port("validator-metrics", PortInfo::tcp(8080));
        let endpoints = extract_validator_endpoints(&service);
        assert_eq!(endpoints.api_url, "http://10.0.0.5:5056");
        assert_eq!(endpoints.metrics_url, "http://10.0.0.5:8080");
    }

    #[test]
    fn test_parse_endpoint_url() {
        assert_eq!(
            parse_endpoint_url("https://example.com").unwrap(),
            ("example.com".to_string(), 443)
        );
        assert_eq!(
            parse_endpoint_url("ws://example.com").unwrap(),
            ("example.com".to_string(), 80)
        );
        assert_eq!(
            parse_endpoint_url("http://10.0.0.2:8545").unwrap(),
            ("10.0.0.2".to_string(), 8545)
        );
        assert_eq!(
            parse_endpoint_url("tcp://10.0.0.2:30303").unwrap(),
            ("10.0.0.2".to_string(), 30303)
        );
        // Explicit ports equal to a known scheme default still count
        assert_eq!(
            parse_endpoint_url("ftp://example.com:21").unwrap(),
            ("example.com".to_string(), 21)
        );
        assert_eq!(
            parse_endpoint_url("ftp://user@example.com:21/pub").unwrap(),
            ("example.com".to_string(), 21)
        );
        assert!(matches!(
            parse_endpoint_url("ftp://example.com"),
            Err(Error::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            parse_endpoint_url("not a url"),
            Err(Error::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_validate_endpoint() {
        assert!(matches!(validate_endpoint(""), Err(Error::EmptyEndpoint)));
        assert!(matches!(validate_endpoint("   "), Err(Error::EmptyEndpoint)));
        assert!(validate_endpoint("http://localhost:8545").is_ok());
        assert!(matches!(
            validate_endpoint("ftp://example.com"),
            Err(Error::InvalidEndpoint { .. })
        ));
    }
}
