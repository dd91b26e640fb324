//! Registered scopes and the policy that narrows requested scopes to them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    #[serde(rename = "openid")]
    OpenId,
    #[serde(rename = "profile")]
    Profile,
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "offline_access")]
    OfflineAccess,
}

impl Scope {
    pub const ALL: [Scope; 4] = [
        Scope::OpenId,
        Scope::Profile,
        Scope::Email,
        Scope::OfflineAccess,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::OpenId => "openid",
            Scope::Profile => "profile",
            Scope::Email => "email",
            Scope::OfflineAccess => "offline_access",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scope::ALL
            .into_iter()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| format!("Unknown scope: {s}"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSet(BTreeSet<Scope>);

impl ScopeSet {
    /// Parse a space-delimited scope string. Names outside the registered
    /// vocabulary are dropped, since they can never survive intersection.
    pub fn parse_lossy(raw: &str) -> Self {
        raw.split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect()
    }

    pub fn intersect(&self, other: &ScopeSet) -> ScopeSet {
        ScopeSet(self.0.intersection(&other.0).copied().collect())
    }

    pub fn contains(&self, scope: Scope) -> bool {
        self.0.contains(&scope)
    }

    pub fn is_subset(&self, other: &ScopeSet) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Scope> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Scope> for ScopeSet {
    fn from_iter<T: IntoIterator<Item = Scope>>(iter: T) -> Self {
        ScopeSet(iter.into_iter().collect())
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for scope in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(scope.as_str())?;
            first = false;
        }
        Ok(())
    }
}

/// Decides which scopes a grant ends up with.
#[derive(Debug, Clone)]
pub struct ScopePolicy {
    permitted: ScopeSet,
    defaults: ScopeSet,
}

impl ScopePolicy {
    /// `defaults` is clipped to `permitted`.
    pub fn new(permitted: ScopeSet, defaults: ScopeSet) -> Self {
        let defaults = defaults.intersect(&permitted);
        Self {
            permitted,
            defaults,
        }
    }

    pub fn permitted(&self) -> &ScopeSet {
        &self.permitted
    }

    /// Scopes for a fresh grant: the request (or the defaults when nothing was
    /// requested) intersected with the permitted set. An empty result is valid.
    pub fn grant(&self, requested: Option<&str>) -> ScopeSet {
        match requested {
            Some(raw) => ScopeSet::parse_lossy(raw).intersect(&self.permitted),
            None => self.defaults.clone(),
        }
    }

    /// Scopes for a refresh: never wider than what the presented token carried.
    pub fn narrow(&self, requested: Option<&str>, original: &ScopeSet) -> ScopeSet {
        let ceiling = original.intersect(&self.permitted);
        match requested {
            Some(raw) => ScopeSet::parse_lossy(raw).intersect(&ceiling),
            None => ceiling,
        }
    }
}

impl Default for ScopePolicy {
    fn default() -> Self {
        Self::new(
            Scope::ALL.into_iter().collect(),
            [Scope::OpenId, Scope::Profile, Scope::OfflineAccess]
                .into_iter()
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_drops_unknown_names_and_duplicates() {
        let set = ScopeSet::parse_lossy("openid  admin openid email");
        assert_eq!(set.len(), 2);
        assert!(set.contains(Scope::OpenId));
        assert!(set.contains(Scope::Email));
    }

    #[test]
    fn display_is_space_delimited_and_stable() {
        let set = ScopeSet::parse_lossy("offline_access openid profile");
        assert_eq!(set.to_string(), "openid profile offline_access");
        assert_eq!(ScopeSet::default().to_string(), "");
    }

    #[test]
    fn grant_uses_defaults_when_nothing_requested() {
        let policy = ScopePolicy::default();
        assert_eq!(
            policy.grant(None).to_string(),
            "openid profile offline_access"
        );
    }

    #[test]
    fn grant_intersects_with_permitted() {
        let policy = ScopePolicy::new(
            [Scope::OpenId, Scope::Profile].into_iter().collect(),
            ScopeSet::default(),
        );
        assert_eq!(policy.grant(Some("openid email")).to_string(), "openid");
        assert!(policy.grant(Some("email bogus")).is_empty());
    }

    #[test]
    fn narrow_never_widens() {
        let policy = ScopePolicy::default();
        let original = ScopeSet::parse_lossy("openid offline_access");

        assert_eq!(
            policy.narrow(Some("openid email"), &original).to_string(),
            "openid"
        );
        assert_eq!(policy.narrow(None, &original), original);
    }

    #[test]
    fn defaults_are_clipped_to_permitted() {
        let policy = ScopePolicy::new(
            [Scope::OpenId].into_iter().collect(),
            Scope::ALL.into_iter().collect(),
        );
        assert_eq!(policy.grant(None).to_string(), "openid");
    }

    #[test]
    fn scope_names_round_trip_through_serde() {
        let json = serde_json::to_string(&Scope::OfflineAccess).unwrap();
        assert_eq!(json, "\"offline_access\"");
        let back: Scope = serde_json::from_str("\"openid\"").unwrap();
        assert_eq!(back, Scope::OpenId);
    }
}
