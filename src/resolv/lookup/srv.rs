//! Looking up SRV records.

use rand::Rng;
use tracing::trace;

use super::{parse_name, query_data, LookupError};
use crate::rdata::Srv;
use crate::resolv::resolver::Resolve;

//------------ lookup_srv ----------------------------------------------------

/// Looks up the servers for `service` over `proto` at `domain`.
///
/// The service and protocol labels are prefixed with an underscore unless
/// they already have one, i.e., `lookup_srv(r, "sip", "udp",
/// "example.com")` queries `_sip._udp.example.com`.
///
/// The records are returned in the order they should be tried, as
/// described in RFC 2782: by priority, lowest first, and within the same
/// priority in a random order weighted by their weight. If there are no
/// records, the returned vec is empty.
pub async fn lookup_srv<R: Resolve + ?Sized>(
    resolver: &R,
    service: &str,
    proto: &str,
    domain: &str,
) -> Result<Vec<Srv>, LookupError> {
    let name = parse_name(&format!(
        "{}.{}.{}",
        underscored(service),
        underscored(proto),
        domain
    ))?;
    let mut records = query_data::<_, Srv>(resolver, &name).await?;
    reorder(&mut records, &mut rand::thread_rng());
    trace!(%name, count = records.len(), "SRV lookup done");
    Ok(records)
}

fn underscored(label: &str) -> String {
    if label.starts_with('_') {
        label.into()
    } else {
        format!("_{}", label)
    }
}

/// Reorders records as per RFC 2782 usage rules.
fn reorder<G: Rng>(records: &mut [Srv], rng: &mut G) {
    // Zero weights go first within a priority as required by RFC 2782.
    records.sort_by_key(|srv| (srv.priority(), srv.weight()));

    let mut start = 0;
    while start < records.len() {
        let priority = records[start].priority();
        let end = records[start..]
            .iter()
            .position(|srv| srv.priority() != priority)
            .map_or(records.len(), |len| start + len);
        reorder_by_weight(&mut records[start..end], rng);
        start = end;
    }
}

/// Reorders records of the same priority based on their weight.
fn reorder_by_weight<G: Rng>(records: &mut [Srv], rng: &mut G) {
    let mut weight_sum: u32 =
        records.iter().map(|srv| u32::from(srv.weight())).sum();
    for i in 0..records.len() {
        let pick = rng.gen_range(0..=weight_sum);
        let mut sum = 0;
        for j in i..records.len() {
            sum += u32::from(records[j].weight());
            if sum >= pick {
                weight_sum -= u32::from(records[j].weight());
                records.swap(i, j);
                break;
            }
        }
    }
}

//============ Testing ======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::Dname;
    use crate::resolv::lookup::test::StaticResolver;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::str::FromStr;

    fn srv(priority: u16, weight: u16, target: &str) -> Srv {
        Srv::new(priority, weight, 5060, Dname::from_str(target).unwrap())
    }

    #[test]
    fn priorities_are_kept() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let mut records = vec![
                srv(20, 10, "c.example.com"),
                srv(10, 50, "a.example.com"),
                srv(30, 0, "d.example.com"),
                srv(10, 50, "b.example.com"),
            ];
            reorder(&mut records, &mut rng);
            let priorities: Vec<_> =
                records.iter().map(Srv::priority).collect();
            assert_eq!(priorities, [10, 10, 20, 30]);
        }
    }

    #[test]
    fn weights_are_respected() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut heavy_first = 0;
        for _ in 0..1000 {
            let mut records = vec![
                srv(10, 1, "light.example.com"),
                srv(10, 99, "heavy.example.com"),
            ];
            reorder(&mut records, &mut rng);
            if records[0].target().to_string() == "heavy.example.com" {
                heavy_first += 1;
            }
        }
        assert!(heavy_first > 900, "heavy first {} times", heavy_first);
    }

    #[test]
    fn all_records_survive() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut records = vec![
            srv(10, 0, "a.example.com"),
            srv(10, 0, "b.example.com"),
            srv(10, 5, "c.example.com"),
        ];
        reorder(&mut records, &mut rng);
        let mut targets: Vec<_> =
            records.iter().map(|srv| srv.target().to_string()).collect();
        targets.sort();
        assert_eq!(
            targets,
            ["a.example.com", "b.example.com", "c.example.com"]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn lookup() {
        let resolver = StaticResolver::default()
            .with(srv(20, 0, "backup.example.com"))
            .with(srv(10, 0, "sip.example.com"));
        let records = lookup_srv(&resolver, "sip", "_udp", "example.com")
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].target().to_string(), "sip.example.com");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn bad_name() {
        let resolver = StaticResolver::default();
        let err = lookup_srv(&resolver, "sip", "udp", "exa mple..com")
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::Name(_)));
    }
}
