//! The authenticated identity handed between the validators, the claims
//! builder and the token issuer.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrincipalError {
    #[error("The subject identifier is missing or empty")]
    MissingSubject,
}

/// Stable, non-empty identifier of a principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Result<Self, PrincipalError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(PrincipalError::MissingSubject);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<uuid::Uuid> for SubjectId {
    fn from(id: uuid::Uuid) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    subject: SubjectId,
    name: Option<String>,
    claims: BTreeMap<String, String>,
}

impl Principal {
    pub fn new(subject: SubjectId, name: Option<String>) -> Self {
        Self {
            subject,
            name: name.filter(|n| !n.is_empty()),
            claims: BTreeMap::new(),
        }
    }

    /// Attach an additional claim. Empty values are dropped.
    pub fn with_claim(mut self, claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.claims.insert(claim_type.into(), value);
        }
        self
    }

    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Claims beyond subject and name, ordered by claim type.
    pub fn claims(&self) -> &BTreeMap<String, String> {
        &self.claims
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_must_not_be_blank() {
        assert_eq!(SubjectId::new(""), Err(PrincipalError::MissingSubject));
        assert_eq!(SubjectId::new("   "), Err(PrincipalError::MissingSubject));
        assert_eq!(SubjectId::new("user-1").unwrap().as_str(), "user-1");
    }

    #[test]
    fn empty_name_and_claim_values_are_dropped() {
        let principal = Principal::new(SubjectId::new("u").unwrap(), Some(String::new()))
            .with_claim("email", "")
            .with_claim("role", "Admin");

        assert_eq!(principal.name(), None);
        assert_eq!(principal.claims().len(), 1);
        assert_eq!(principal.claims().get("role").map(String::as_str), Some("Admin"));
    }
}
