//! Type introspection and property-map caching
//!
//! A [`PropertyMap`] pairs readable source members with writable destination
//! members of the same name. Building one walks both descriptors, so maps are
//! cached per (source type, destination type, case sensitivity) and shared
//! across threads. Type names are type identities: two descriptors with the
//! same name share cache entries.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use objmap_ir::{MemberDescriptor, TypeDescriptor, TypeRef};
use tracing::{debug, trace};

/// One source member feeding one destination member
#[derive(Debug, Clone)]
pub struct MemberPair {
    pub source_index: usize,
    pub source_name: String,
    pub destination_index: usize,
    pub destination_name: String,
    pub destination_type: TypeRef,
}

/// Matched member pairs for a source/destination type pair
#[derive(Debug)]
pub struct PropertyMap {
    source_type: String,
    destination_type: String,
    pairs: Vec<MemberPair>,
}

impl PropertyMap {
    /// Match members of `source` against members of `destination`
    ///
    /// Pairs follow source member order and every destination member is
    /// claimed at most once, so an earlier source member claims its match
    /// first. When matching ignores case, each source member takes an
    /// unclaimed exact-case match before falling back to a case-folded one.
    #[must_use]
    pub fn build(source: &TypeDescriptor, destination: &TypeDescriptor, case_sensitive: bool) -> Self {
        let source_members = source.as_object().map_or(&[][..], |desc| desc.members());
        let destination_members = destination
            .as_object()
            .map_or(&[][..], |desc| desc.members());

        let mut claimed = HashSet::new();
        let mut pairs = Vec::new();

        for (source_index, source_member) in source_members.iter().enumerate() {
            if !source_member.is_source() {
                continue;
            }

            let candidates = || {
                destination_members
                    .iter()
                    .enumerate()
                    .filter(|(index, member)| member.is_destination() && !claimed.contains(index))
            };

            let exact = candidates().find(|(_, member)| member.name == source_member.name);
            let found = if exact.is_some() || case_sensitive {
                exact
            } else {
                candidates().find(|(_, member)| names_match_ignore_case(member, source_member))
            };

            if let Some((destination_index, destination_member)) = found {
                claimed.insert(destination_index);
                pairs.push(MemberPair {
                    source_index,
                    source_name: source_member.name.clone(),
                    destination_index,
                    destination_name: destination_member.name.clone(),
                    destination_type: destination_member.ty.clone(),
                });
            }
        }

        Self {
            source_type: source.name().to_string(),
            destination_type: destination.name().to_string(),
            pairs,
        }
    }

    #[must_use]
    pub fn source_type(&self) -> &str {
        &self.source_type
    }

    #[must_use]
    pub fn destination_type(&self) -> &str {
        &self.destination_type
    }

    #[must_use]
    pub fn pairs(&self) -> &[MemberPair] {
        &self.pairs
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

fn names_match_ignore_case(a: &MemberDescriptor, b: &MemberDescriptor) -> bool {
    a.name.to_lowercase() == b.name.to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    source: String,
    destination: String,
    case_sensitive: bool,
}

/// Thread-safe cache of property maps
///
/// Entries are immutable once inserted. Two threads racing on the same key
/// may both build a map, but only one is kept and both observe it.
#[derive(Debug, Default)]
pub struct TypeMapCache {
    maps: DashMap<CacheKey, Arc<PropertyMap>>,
}

impl TypeMapCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Property map for a type pair, built on first use
    pub fn property_map(
        &self,
        source: &TypeRef,
        destination: &TypeRef,
        case_sensitive: bool,
    ) -> Arc<PropertyMap> {
        let key = CacheKey {
            source: source.name().to_string(),
            destination: destination.name().to_string(),
            case_sensitive,
        };

        if let Some(cached) = self.maps.get(&key) {
            debug!("Cache hit for property map: {} -> {}", key.source, key.destination);
            return Arc::clone(cached.value());
        }

        trace!("Cache miss for property map: {} -> {}", key.source, key.destination);
        let map = Arc::new(PropertyMap::build(source, destination, case_sensitive));
        debug!(
            source = %key.source,
            destination = %key.destination,
            pairs = map.len(),
            "Built property map"
        );
        Arc::clone(self.maps.entry(key).or_insert(map).value())
    }

    /// Number of cached type pairs
    #[must_use]
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Drop every cached map
    pub fn clear(&self) {
        self.maps.clear();
    }
}
