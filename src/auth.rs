use async_trait::async_trait;

use crate::engine::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Provider,
    Client,
}

/// A fully resolved caller. The engine never sees raw credentials; it only
/// runs with an identity the embedding service has already authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub role: Role,
}

impl Identity {
    pub fn provider(id: impl Into<String>) -> Self {
        Self { id: id.into(), role: Role::Provider }
    }

    pub fn client(id: impl Into<String>) -> Self {
        Self { id: id.into(), role: Role::Client }
    }
}

/// Authorization gate invoked at the top of every role-restricted operation.
pub fn require_role(identity: &Identity, role: Role) -> Result<(), EngineError> {
    if identity.role != role {
        return Err(EngineError::Forbidden);
    }
    Ok(())
}

/// Credential → identity resolution, implemented by the embedding service
/// (token verification, user lookup). `None` means "no caller": the engine
/// is never invoked with a partially resolved identity.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, credential: &str) -> Option<Identity>;
}
