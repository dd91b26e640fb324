//! Claims building and claim-destination routing.
//!
//! Every claim is tagged with the tokens it may be copied into. Only the
//! claim types listed in [`DESTINATION_TABLE`] reach the identity token;
//! everything else stays in the access token.

use crate::principal::Principal;
use std::collections::BTreeMap;
use std::fmt;

pub mod claim_types {
    pub const SUBJECT: &str = "sub";
    pub const NAME: &str = "name";
    pub const EMAIL: &str = "email";
    pub const ROLE: &str = "role";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Destination {
    AccessToken,
    IdentityToken,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::AccessToken => f.write_str("access_token"),
            Destination::IdentityToken => f.write_str("id_token"),
        }
    }
}

/// Non-empty set of destinations. Only the constants below can be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DestinationSet {
    access_token: bool,
    identity_token: bool,
}

impl DestinationSet {
    pub const ACCESS_TOKEN: Self = Self {
        access_token: true,
        identity_token: false,
    };
    pub const BOTH: Self = Self {
        access_token: true,
        identity_token: true,
    };

    pub fn contains(&self, destination: Destination) -> bool {
        match destination {
            Destination::AccessToken => self.access_token,
            Destination::IdentityToken => self.identity_token,
        }
    }

    pub fn iter(self) -> impl Iterator<Item = Destination> {
        [Destination::AccessToken, Destination::IdentityToken]
            .into_iter()
            .filter(move |d| self.contains(*d))
    }
}

/// Claim types elevated beyond the access-token-only default.
pub const DESTINATION_TABLE: &[(&str, DestinationSet)] = &[
    (claim_types::SUBJECT, DestinationSet::BOTH),
    (claim_types::NAME, DestinationSet::BOTH),
];

pub fn destinations_for(claim_type: &str) -> DestinationSet {
    DESTINATION_TABLE
        .iter()
        .find(|(t, _)| *t == claim_type)
        .map(|(_, d)| *d)
        .unwrap_or(DestinationSet::ACCESS_TOKEN)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    claim_type: String,
    value: String,
    destinations: DestinationSet,
}

impl Claim {
    fn new(claim_type: &str, value: &str) -> Self {
        Self {
            claim_type: claim_type.to_string(),
            value: value.to_string(),
            destinations: destinations_for(claim_type),
        }
    }

    pub fn claim_type(&self) -> &str {
        &self.claim_type
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn destinations(&self) -> DestinationSet {
        self.destinations
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ClaimsBuilder;

impl ClaimsBuilder {
    /// Subject first, then name, then the remaining claims in claim-type order.
    ///
    /// `sub` and `name` entries in the principal's claim map are ignored; those
    /// two always come from the principal itself.
    pub fn build(&self, principal: &Principal) -> Vec<Claim> {
        let mut claims = Vec::with_capacity(2 + principal.claims().len());
        claims.push(Claim::new(
            claim_types::SUBJECT,
            principal.subject().as_str(),
        ));
        if let Some(name) = principal.name() {
            claims.push(Claim::new(claim_types::NAME, name));
        }
        claims.extend(
            principal
                .claims()
                .iter()
                .filter(|(t, _)| !matches!(t.as_str(), claim_types::SUBJECT | claim_types::NAME))
                .map(|(t, v)| Claim::new(t, v)),
        );
        claims
    }
}

/// The claims bound for `destination`, keyed by claim type.
pub fn project(claims: &[Claim], destination: Destination) -> BTreeMap<String, String> {
    claims
        .iter()
        .filter(|c| c.destinations.contains(destination))
        .map(|c| (c.claim_type.clone(), c.value.clone()))
        .collect()
}
