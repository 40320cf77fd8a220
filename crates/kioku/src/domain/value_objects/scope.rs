//! Scope - Tenant partition of the memory store

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Owner / agent / run identifiers that partition memories and vectors.
///
/// A search must carry at least one of them so it can never cross a tenant
/// boundary by accident.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl Scope {
    pub fn owner(owner_id: i64) -> Self {
        Self {
            owner_id: Some(owner_id),
            ..Default::default()
        }
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_run(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// True when no scope key is set. Empty strings do not count.
    pub fn is_unscoped(&self) -> bool {
        self.owner_id.is_none()
            && self.agent_id.as_deref().map_or(true, str::is_empty)
            && self.run_id.as_deref().map_or(true, str::is_empty)
    }

    pub fn require(&self) -> Result<(), DomainError> {
        if self.is_unscoped() {
            return Err(DomainError::ScopeRequired);
        }
        Ok(())
    }
}
