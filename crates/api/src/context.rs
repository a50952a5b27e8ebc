use opsforge_core::UserId;

/// Acting-user context for a request.
///
/// This is immutable and must be present for all engine routes; the identity
/// collaborator authenticated the id before it reached us.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ActorContext {
    actor: UserId,
}

impl ActorContext {
    pub fn new(actor: UserId) -> Self {
        Self { actor }
    }

    pub fn actor(&self) -> UserId {
        self.actor
    }
}
