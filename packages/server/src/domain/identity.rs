//! Identity collaborator.

use async_trait::async_trait;

use super::{error::IdentityError, value_object::DisplayName};

/// Resolves the display name of an incoming connection.
///
/// `claimed` is whatever identity the transport carried (query parameter,
/// header, token). Failing here rejects the connection before it joins.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, claimed: Option<String>) -> Result<DisplayName, IdentityError>;
}
