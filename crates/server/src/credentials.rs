//! Username/password checks for the password grant.

use crate::error::CredentialError;
use crate::principal::Principal;
use crate::store::IdentityStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct CredentialValidator {
    identities: Arc<dyn IdentityStore>,
}

impl CredentialValidator {
    pub fn new(identities: Arc<dyn IdentityStore>) -> Self {
        Self { identities }
    }

    /// Resolve `username` and check `password` against it.
    ///
    /// Unknown usernames and wrong passwords both return
    /// [`CredentialError::InvalidCredentials`]. An unknown username still pays
    /// for one password verification.
    #[tracing::instrument(skip(self, password))]
    pub async fn validate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Principal, CredentialError> {
        match self.identities.authenticate(username, password).await? {
            Some(principal) => Ok(principal),
            None => {
                tracing::debug!("Credentials rejected");
                Err(CredentialError::InvalidCredentials)
            }
        }
    }
}
