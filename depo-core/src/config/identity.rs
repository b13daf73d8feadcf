//! Identity gateway configuration.

/// Shared secret used to verify `Depo-Signature` user assertions.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub secret: Box<[u8]>,
}

impl IdentityConfig {
    pub fn new(secret: impl Into<Box<[u8]>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn secret_bytes(&self) -> &[u8] {
        &self.secret
    }
}
