//! Tokens and token groups per tenant.

use std::collections::HashMap;
use std::ops::Deref;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tallybar_core::{TenantId, Token, TokenGroups};

use super::TenantScoped;
use crate::error::StoreError;
use crate::kv::SharedKeyValueStore;
use crate::persisted::PersistedStore;

const KEY: &str = "tokens";
const FIELDS: &[&str] = &["tokens", "groups"];

/// Persisted token state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenState {
    /// API keys per tenant.
    pub tokens: HashMap<TenantId, Vec<Token>>,
    /// Pricing groups per tenant.
    pub groups: HashMap<TenantId, TokenGroups>,
}

/// Store of tenant tokens.
#[derive(Debug, Clone)]
pub struct TokenStore {
    inner: PersistedStore<TokenState>,
}

impl Deref for TokenStore {
    type Target = PersistedStore<TokenState>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl TokenStore {
    /// Creates the store over `kv`.
    pub fn new(kv: SharedKeyValueStore) -> Self {
        Self {
            inner: PersistedStore::new(kv, KEY, FIELDS, TokenState::default()),
        }
    }

    /// Tokens of one tenant.
    pub fn tokens(&self, tenant_id: &TenantId) -> Vec<Token> {
        self.read(|s| s.tokens.get(tenant_id).cloned().unwrap_or_default())
    }

    /// Token groups of one tenant.
    pub fn groups(&self, tenant_id: &TenantId) -> TokenGroups {
        self.read(|s| s.groups.get(tenant_id).cloned().unwrap_or_default())
    }

    /// Replaces the tokens of one tenant.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn set_tokens(&self, tenant_id: &TenantId, tokens: Vec<Token>) -> Result<(), StoreError> {
        self.mutate(&["tokens"], |s| {
            s.tokens.insert(tenant_id.clone(), tokens);
        })
        .await
    }

    /// Replaces the token groups of one tenant.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn set_groups(&self, tenant_id: &TenantId, groups: TokenGroups) -> Result<(), StoreError> {
        self.mutate(&["groups"], |s| {
            s.groups.insert(tenant_id.clone(), groups);
        })
        .await
    }
}

#[async_trait]
impl TenantScoped for TokenStore {
    fn scope_name(&self) -> &'static str {
        KEY
    }

    async fn remove_tenant(&self, tenant_id: &TenantId) -> Result<bool, StoreError> {
        let present = self.read(|s| s.tokens.contains_key(tenant_id) || s.groups.contains_key(tenant_id));
        if !present {
            return Ok(false);
        }
        self.mutate(FIELDS, |s| {
            let tokens = s.tokens.remove(tenant_id).is_some();
            let groups = s.groups.remove(tenant_id).is_some();
            tokens || groups
        })
        .await
    }
}
