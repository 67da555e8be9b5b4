//! Looking up host addresses.

use std::net::{IpAddr, SocketAddr};

use tracing::trace;

use super::{parse_name, query_data, LookupError};
use crate::rdata::{Aaaa, A};
use crate::resolv::resolver::Resolve;

/// Looks up the first IPv4 address of `host`.
///
/// If `host` is an IP address, it is returned without asking the resolver.
pub async fn lookup_a<R: Resolve + ?Sized>(
    resolver: &R,
    host: &str,
    port: u16,
) -> Result<Option<SocketAddr>, LookupError> {
    if let Some(addr) = literal(host, port) {
        return Ok(Some(addr));
    }
    let name = parse_name(host)?;
    let records = query_data::<_, A>(resolver, &name).await?;
    Ok(records
        .first()
        .map(|a| SocketAddr::new(a.addr().into(), port)))
}

/// Looks up the first IPv6 address of `host`.
///
/// If `host` is an IP address, it is returned without asking the resolver.
pub async fn lookup_aaaa<R: Resolve + ?Sized>(
    resolver: &R,
    host: &str,
    port: u16,
) -> Result<Option<SocketAddr>, LookupError> {
    if let Some(addr) = literal(host, port) {
        return Ok(Some(addr));
    }
    let name = parse_name(host)?;
    let records = query_data::<_, Aaaa>(resolver, &name).await?;
    Ok(records
        .first()
        .map(|aaaa| SocketAddr::new(aaaa.addr().into(), port)))
}

/// Looks up all addresses of `host`.
///
/// Both A and AAAA records are queried. The IPv6 addresses come first if
/// `prefer_ipv6` is set, otherwise the IPv4 addresses do. If `host` is an
/// IP address, only that address is returned.
pub async fn lookup_addrs<R: Resolve + ?Sized>(
    resolver: &R,
    host: &str,
    port: u16,
    prefer_ipv6: bool,
) -> Result<Vec<SocketAddr>, LookupError> {
    if let Some(addr) = literal(host, port) {
        return Ok(vec![addr]);
    }
    let name = parse_name(host)?;
    let v4 = query_data::<_, A>(resolver, &name)
        .await?
        .into_iter()
        .map(|a| SocketAddr::new(a.addr().into(), port));
    let v6 = query_data::<_, Aaaa>(resolver, &name)
        .await?
        .into_iter()
        .map(|aaaa| SocketAddr::new(aaaa.addr().into(), port));
    let res: Vec<_> = if prefer_ipv6 {
        v6.chain(v4).collect()
    } else {
        v4.chain(v6).collect()
    };
    trace!(%name, addrs = ?res, "address lookup done");
    Ok(res)
}

fn literal(host: &str, port: u16) -> Option<SocketAddr> {
    host.parse::<IpAddr>()
        .ok()
        .map(|addr| SocketAddr::new(addr, port))
}

//============ Testing ======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::resolv::error::Error;
    use crate::resolv::lookup::test::StaticResolver;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn resolver() -> StaticResolver {
        StaticResolver::default()
            .with(A::new(Ipv4Addr::new(192, 0, 2, 10)))
            .with(A::new(Ipv4Addr::new(192, 0, 2, 11)))
            .with(Aaaa::new("2001:db8::10".parse::<Ipv6Addr>().unwrap()))
    }

    #[tokio::test(flavor = "current_thread")]
    async fn single_addresses() {
        let resolver = resolver();
        assert_eq!(
            lookup_a(&resolver, "sip.example.com", 5060).await.unwrap(),
            Some("192.0.2.10:5060".parse().unwrap())
        );
        assert_eq!(
            lookup_aaaa(&resolver, "sip.example.com", 5060)
                .await
                .unwrap(),
            Some("[2001:db8::10]:5060".parse().unwrap())
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn all_addresses() {
        let resolver = resolver();
        let v4_first = lookup_addrs(&resolver, "sip.example.com", 5061, false)
            .await
            .unwrap();
        assert_eq!(v4_first.len(), 3);
        assert!(v4_first[0].is_ipv4());
        let v6_first = lookup_addrs(&resolver, "sip.example.com", 5061, true)
            .await
            .unwrap();
        assert!(v6_first[0].is_ipv6());
        assert!(v6_first[1..].iter().all(SocketAddr::is_ipv4));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn literals_skip_resolver() {
        let resolver = StaticResolver {
            fail: Some(Error::NoServers),
            ..Default::default()
        };
        assert_eq!(
            lookup_a(&resolver, "192.0.2.1", 53).await.unwrap(),
            Some("192.0.2.1:53".parse().unwrap())
        );
        assert_eq!(
            lookup_addrs(&resolver, "2001:db8::1", 53, false)
                .await
                .unwrap(),
            vec!["[2001:db8::1]:53".parse().unwrap()]
        );
        assert!(matches!(
            lookup_a(&resolver, "example.com", 53).await,
            Err(LookupError::Resolve(Error::NoServers))
        ));
    }
}
