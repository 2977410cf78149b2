//! Network operators (@ipMatch).

use super::traits::{Operator, OperatorResult};
use crate::error::{Error, Result};
use ipnetwork::IpNetwork;
use std::net::IpAddr;

/// IP match operator (@ipMatch).
pub struct IpMatchOperator {
    networks: Vec<IpNetwork>,
}

impl IpMatchOperator {
    /// Create from a space- or comma-separated IP/CIDR list.
    pub fn new(ips: &str) -> Result<Self> {
        let networks = ips
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(parse_network)
            .collect::<Result<Vec<_>>>()?;

        if networks.is_empty() {
            return Err(Error::InvalidIp {
                value: ips.to_string(),
                message: "no addresses given".to_string(),
            });
        }

        Ok(Self { networks })
    }

    /// Check if an IP is in any of the networks.
    fn contains(&self, ip: IpAddr) -> bool {
        self.networks.iter().any(|net| net.contains(ip))
    }
}

/// Parse a bare address (as a host network) or a CIDR block.
fn parse_network(s: &str) -> Result<IpNetwork> {
    let parsed = match s.parse::<IpAddr>() {
        Ok(ip) => Ok(IpNetwork::from(ip)),
        Err(_) => s.parse::<IpNetwork>(),
    };
    parsed.map_err(|e| Error::InvalidIp {
        value: s.to_string(),
        message: e.to_string(),
    })
}

impl Operator for IpMatchOperator {
    fn execute(&self, value: &str) -> OperatorResult {
        match value.trim().parse::<IpAddr>() {
            Ok(ip) if self.contains(ip) => OperatorResult::matched(value),
            _ => OperatorResult::no_match(),
        }
    }

    fn name(&self) -> &'static str {
        "ipMatch"
    }
}
