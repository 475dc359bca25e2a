//! Identity resolver backed by the connection's query string.

use async_trait::async_trait;

use crate::domain::{DisplayName, IdentityError, IdentityResolver};

/// Trusts the `username` supplied by the client after validating it.
///
/// Suitable behind a gateway that has already authenticated the caller.
#[derive(Debug, Default, Clone)]
pub struct QueryIdentityResolver;

#[async_trait]
impl IdentityResolver for QueryIdentityResolver {
    async fn resolve(&self, claimed: Option<String>) -> Result<DisplayName, IdentityError> {
        let name = claimed.ok_or(IdentityError::Missing)?;
        Ok(DisplayName::new(name)?)
    }
}
