use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use switchyard_core::SwitchyardError;

/// A parsed `provider/account/model` reference.
///
/// Only the first two `/` separate segments; the model id keeps any further
/// slashes (`openrouter/main/meta-llama/llama-3-70b`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelReference {
    /// Provider id, e.g. `anthropic`.
    pub provider: String,
    /// Account id within the provider, e.g. `main`.
    pub account: String,
    /// Model id passed to the backend.
    pub model: String,
}

impl ModelReference {
    /// Builds a reference from its parts.
    pub fn new(
        provider: impl Into<String>,
        account: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            account: account.into(),
            model: model.into(),
        }
    }

    /// Circuit and registry key: `provider/account`.
    pub fn account_key(&self) -> String {
        crate::account::account_key(&self.provider, &self.account)
    }
}

impl FromStr for ModelReference {
    type Err = SwitchyardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(provider), Some(account), Some(model))
                if !provider.is_empty() && !account.is_empty() && !model.is_empty() =>
            {
                Ok(Self::new(provider, account, model))
            }
            _ => Err(SwitchyardError::MalformedReference(s.to_string())),
        }
    }
}

impl fmt::Display for ModelReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.provider, self.account, self.model)
    }
}
