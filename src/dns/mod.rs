//! Name resolution for the dialer

use crate::{
    error::{AppError, Result},
    logging::Logger,
    types::AddressFamily,
};
use std::net::IpAddr;
use trust_dns_resolver::{
    config::{LookupIpStrategy, ResolverConfig, ResolverOpts},
    system_conf, TokioAsyncResolver,
};

/// Resolver restricted to the run's address family
#[derive(Clone)]
pub struct DnsResolver {
    resolver: TokioAsyncResolver,
    family: AddressFamily,
}

impl DnsResolver {
    /// Build from the system configuration, falling back to the resolver
    /// defaults when it cannot be read
    pub fn new(family: AddressFamily, logger: &Logger) -> Self {
        let (config, mut opts) = match system_conf::read_system_conf() {
            Ok(conf) => conf,
            Err(e) => {
                crate::log_warn!(logger, "Failed to read system DNS config, using defaults: {}", e);
                (ResolverConfig::default(), ResolverOpts::default())
            }
        };
        opts.ip_strategy = lookup_strategy(family);

        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
            family,
        }
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// Resolve `host` to the addresses usable under the family preference,
    /// in resolver order
    pub async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>> {
        let response = self.resolver.lookup_ip(host).await?;
        let addresses = filter_family(response.iter(), self.family);

        if addresses.is_empty() {
            return Err(AppError::dns_resolution(format!(
                "lookup {}: no {} addresses found",
                host,
                self.family.name()
            )));
        }

        Ok(addresses)
    }
}

/// Lookup strategy matching a family preference
pub fn lookup_strategy(family: AddressFamily) -> LookupIpStrategy {
    match family {
        AddressFamily::Auto => LookupIpStrategy::Ipv4thenIpv6,
        AddressFamily::V4Only => LookupIpStrategy::Ipv4Only,
        AddressFamily::V6Only => LookupIpStrategy::Ipv6Only,
    }
}

/// Keep only addresses permitted by `family`, preserving order
pub fn filter_family(addresses: impl IntoIterator<Item = IpAddr>, family: AddressFamily) -> Vec<IpAddr> {
    addresses.into_iter().filter(|ip| family.permits(ip)).collect()
}

/// The host as an IP literal, if it is one (`[::1]` included)
pub fn literal_address(host: &str) -> Option<IpAddr> {
    let trimmed = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    trimmed.parse().ok()
}

/// Check a literal against the family preference
pub fn check_literal(ip: IpAddr, family: AddressFamily) -> Result<IpAddr> {
    if family.permits(&ip) {
        Ok(ip)
    } else {
        Err(AppError::network(format!(
            "dial {}: address {} is not allowed under {}",
            family.name(),
            ip,
            family.name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_address() {
        assert_eq!(literal_address("127.0.0.1"), Some("127.0.0.1".parse().unwrap()));
        assert_eq!(literal_address("[::1]"), Some("::1".parse().unwrap()));
        assert_eq!(literal_address("::1"), Some("::1".parse().unwrap()));
        assert_eq!(literal_address("example.com"), None);
        assert_eq!(literal_address("[example.com]"), None);
    }

    #[test]
    fn test_lookup_strategy() {
        assert_eq!(lookup_strategy(AddressFamily::V4Only), LookupIpStrategy::Ipv4Only);
        assert_eq!(lookup_strategy(AddressFamily::V6Only), LookupIpStrategy::Ipv6Only);
        assert_eq!(lookup_strategy(AddressFamily::Auto), LookupIpStrategy::Ipv4thenIpv6);
    }

    #[test]
    fn test_filter_family_keeps_order() {
        let addresses: Vec<IpAddr> = vec![
            "2001:db8::1".parse().unwrap(),
            "192.0.2.1".parse().unwrap(),
            "192.0.2.2".parse().unwrap(),
        ];

        assert_eq!(filter_family(addresses.clone(), AddressFamily::Auto), addresses);
        assert_eq!(
            filter_family(addresses.clone(), AddressFamily::V4Only),
            vec!["192.0.2.1".parse::<IpAddr>().unwrap(), "192.0.2.2".parse().unwrap()]
        );
        assert_eq!(
            filter_family(addresses, AddressFamily::V6Only),
            vec!["2001:db8::1".parse::<IpAddr>().unwrap()]
        );
    }

    #[test]
    fn test_check_literal_family() {
        let v4: IpAddr = "127.0.0.1".parse().unwrap();
        assert!(check_literal(v4, AddressFamily::V4Only).is_ok());
        assert!(matches!(
            check_literal(v4, AddressFamily::V6Only),
            Err(AppError::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_resolver_builds_without_network() {
        let resolver = DnsResolver::new(AddressFamily::V4Only, &Logger::new("TEST"));
        assert_eq!(resolver.family(), AddressFamily::V4Only);
    }
}
