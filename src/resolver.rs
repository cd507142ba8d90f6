//! Resolver configuration and the live resolver registry.
//!
//! The registry is copy-on-write: writers build a new list under the write
//! lock and swap it in, readers clone the current `Arc` under the read lock.
//! A snapshot therefore never changes underneath an in-flight check, and a
//! reader holds the lock only for a pointer copy.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use hickory_proto::rr::RecordType;
use rustc_hash::FxHashSet;

/// A DNS resolver plus the rules for interpreting its answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolver {
    /// Server address: `ip`, `ip:port`, `[v6]`, `[v6]:port` or `host[:port]`.
    pub address: String,
    /// Substring that marks a response as a block page or block annotation.
    pub keyword: String,
    /// Record type queried against this resolver.
    pub record_type: RecordType,
}

impl Resolver {
    pub fn new(
        address: impl Into<String>,
        keyword: impl Into<String>,
        record_type: RecordType,
    ) -> Self {
        Self {
            address: address.into(),
            keyword: keyword.into(),
            record_type,
        }
    }
}

impl fmt::Display for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {:?})", self.address, self.record_type, self.keyword)
    }
}

/// Parses `ADDRESS[,KEYWORD[,TYPE]]`.
///
/// A missing keyword becomes empty and a missing type becomes `A`.
impl FromStr for Resolver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ',');
        let address = parts.next().unwrap_or_default().trim();
        if address.is_empty() {
            return Err(format!("missing resolver address in {s:?}"));
        }
        let keyword = parts.next().unwrap_or_default().trim();
        let record_type = parse_record_type(parts.next().unwrap_or("A"));

        Ok(Self::new(address, keyword, record_type))
    }
}

/// Map a configured record type name to a [`RecordType`].
///
/// Unknown names fall back to `A`.
pub fn parse_record_type(name: &str) -> RecordType {
    match name.trim().to_ascii_uppercase().as_str() {
        "A" => RecordType::A,
        "AAAA" => RecordType::AAAA,
        "CNAME" => RecordType::CNAME,
        "MX" => RecordType::MX,
        "NS" => RecordType::NS,
        "TXT" => RecordType::TXT,
        "SOA" => RecordType::SOA,
        "SRV" => RecordType::SRV,
        "ANY" => RecordType::ANY,
        _ => RecordType::A,
    }
}

/// Ordered, concurrency-safe list of resolvers keyed by address.
#[derive(Debug, Default)]
pub struct ResolverRegistry {
    resolvers: RwLock<Arc<[Resolver]>>,
}

impl ResolverRegistry {
    pub fn new(resolvers: Vec<Resolver>) -> Self {
        Self {
            resolvers: RwLock::new(resolvers.into()),
        }
    }

    /// Independent view of the current list for read-only iteration.
    pub fn snapshot(&self) -> Arc<[Resolver]> {
        let guard = self.resolvers.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Replace entries sharing an address, append the rest, in argument order.
    pub fn upsert(&self, resolvers: impl IntoIterator<Item = Resolver>) {
        let incoming: Vec<Resolver> = resolvers.into_iter().collect();
        if incoming.is_empty() {
            return;
        }

        let mut guard = self.resolvers.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.to_vec();
        for resolver in incoming {
            match next.iter_mut().find(|r| r.address == resolver.address) {
                Some(existing) => *existing = resolver,
                None => next.push(resolver),
            }
        }
        *guard = next.into();
    }

    /// Remove every entry whose address is listed.
    pub fn delete<S: AsRef<str>>(&self, addresses: impl IntoIterator<Item = S>) {
        let doomed: FxHashSet<String> = addresses
            .into_iter()
            .map(|a| a.as_ref().to_string())
            .collect();
        if doomed.is_empty() {
            return;
        }

        let mut guard = self.resolvers.write().unwrap_or_else(PoisonError::into_inner);
        if !guard.iter().any(|r| doomed.contains(&r.address)) {
            return;
        }
        let next: Vec<Resolver> = guard
            .iter()
            .filter(|r| !doomed.contains(&r.address))
            .cloned()
            .collect();
        *guard = next.into();
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn resolver(address: &str, keyword: &str) -> Resolver {
        Resolver::new(address, keyword, RecordType::A)
    }

    #[test]
    fn parse_record_type_known_and_fallback() {
        assert_eq!(parse_record_type("aaaa"), RecordType::AAAA);
        assert_eq!(parse_record_type(" TXT "), RecordType::TXT);
        assert_eq!(parse_record_type("any"), RecordType::ANY);
        assert_eq!(parse_record_type("bogus"), RecordType::A);
        assert_eq!(parse_record_type(""), RecordType::A);
    }

    #[test]
    fn resolver_from_str() {
        let r: Resolver = "8.8.8.8:53,blockpage,txt".parse().unwrap();
        assert_eq!(r, Resolver::new("8.8.8.8:53", "blockpage", RecordType::TXT));

        let r: Resolver = "[::1]".parse().unwrap();
        assert_eq!(r, Resolver::new("[::1]", "", RecordType::A));

        assert!(" ,kw".parse::<Resolver>().is_err());
    }

    #[test]
    fn upsert_replaces_by_address_and_appends() {
        let registry = ResolverRegistry::new(vec![resolver("1.1.1.1", "a")]);

        registry.upsert([resolver("8.8.8.8", "b")]);
        registry.upsert([resolver("1.1.1.1", "replaced")]);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0], resolver("1.1.1.1", "replaced"));
        assert_eq!(snapshot[1], resolver("8.8.8.8", "b"));
    }

    #[test]
    fn upsert_within_one_call_applies_in_order() {
        let registry = ResolverRegistry::default();

        registry.upsert([resolver("1.1.1.1", "first"), resolver("1.1.1.1", "second")]);

        assert_eq!(&*registry.snapshot(), &[resolver("1.1.1.1", "second")]);
    }

    #[test]
    fn empty_calls_are_noops() {
        let registry = ResolverRegistry::new(vec![resolver("1.1.1.1", "a")]);
        let before = registry.snapshot();

        registry.upsert(Vec::new());
        registry.delete(Vec::<String>::new());

        assert!(Arc::ptr_eq(&before, &registry.snapshot()));
    }

    #[test]
    fn delete_removes_matching_addresses() {
        let registry = ResolverRegistry::new(vec![
            resolver("1.1.1.1", "a"),
            resolver("8.8.8.8", "b"),
            resolver("9.9.9.9", "c"),
        ]);

        registry.delete(["1.1.1.1", "9.9.9.9", "255.255.255.255"]);

        assert_eq!(&*registry.snapshot(), &[resolver("8.8.8.8", "b")]);
    }

    #[test]
    fn snapshot_is_unaffected_by_later_writes() {
        let registry = ResolverRegistry::new(vec![resolver("1.1.1.1", "a")]);
        let snapshot = registry.snapshot();

        registry.upsert([resolver("1.1.1.1", "b"), resolver("8.8.8.8", "c")]);
        registry.delete(["1.1.1.1"]);

        assert_eq!(&*snapshot, &[resolver("1.1.1.1", "a")]);
        assert_eq!(&*registry.snapshot(), &[resolver("8.8.8.8", "c")]);
    }

    #[test]
    fn concurrent_upserts_lose_nothing() {
        let registry = Arc::new(ResolverRegistry::default());

        let handles: Vec<_> = (0..50)
            .map(|n| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    registry.upsert([resolver(&format!("10.0.0.{n}"), "kw")]);
                    let _ = registry.snapshot();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 50);
    }

    #[test]
    fn concurrent_deletes_remove_everything() {
        let registry = Arc::new(ResolverRegistry::new(
            (0..50).map(|n| resolver(&format!("10.0.0.{n}"), "kw")).collect(),
        ));

        let handles: Vec<_> = (0..50)
            .map(|n| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.delete([format!("10.0.0.{n}")]))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(registry.is_empty());
    }
}
