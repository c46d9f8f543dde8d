//! Identity provider seam
//!
//! Authentication happens elsewhere; the vault only needs to know which
//! account the current session belongs to.

use tamra_core::AccountId;

pub trait IdentityProvider {
    fn current_account_id(&self) -> Option<AccountId>;
}

/// Fixed identity, as used by the CLI and tests
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<AccountId>);

impl StaticIdentity {
    pub fn signed_in(id: impl Into<AccountId>) -> Self {
        Self(Some(id.into()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_account_id(&self) -> Option<AccountId> {
        self.0.clone()
    }
}
