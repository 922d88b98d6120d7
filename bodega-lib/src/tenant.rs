//! Tenant (business) profiles.
//!
//! Lookups can fail transiently; the pipeline never surfaces that to the
//! customer and falls back to a safe default profile instead.

use ahash::AHashMap;
use std::sync::RwLock;
use tracing::warn;

use crate::error::{GateError, Result};

#[derive(Debug, Clone)]
pub struct TenantProfile {
    pub tenant_id: String,
    pub display_name: String,
    pub greeting: String,
}

impl TenantProfile {
    /// Safe default used when the directory cannot answer.
    pub fn fallback(tenant_id: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            display_name: "our store".to_string(),
            greeting: "Welcome! Send \"menu\" to see what you can do.".to_string(),
        }
    }
}

pub trait TenantDirectory: Send + Sync {
    fn lookup(&self, tenant_id: &str) -> Result<TenantProfile>;

    /// Lookup with the fallback applied. Directory failures are logged and
    /// invisible to the customer.
    fn lookup_or_default(&self, tenant_id: &str) -> TenantProfile {
        match self.lookup(tenant_id) {
            Ok(profile) => profile,
            Err(e) => {
                warn!(tenant = %tenant_id, error = %e, "tenant lookup failed, using fallback");
                TenantProfile::fallback(tenant_id)
            }
        }
    }
}

#[derive(Default)]
pub struct InMemoryTenantDirectory {
    tenants: RwLock<AHashMap<String, TenantProfile>>,
}

impl InMemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: TenantProfile) {
        if let Ok(mut tenants) = self.tenants.write() {
            tenants.insert(profile.tenant_id.clone(), profile);
        }
    }
}

impl TenantDirectory for InMemoryTenantDirectory {
    fn lookup(&self, tenant_id: &str) -> Result<TenantProfile> {
        let tenants = self
            .tenants
            .read()
            .map_err(|_| GateError::TenantNotFound(tenant_id.to_string()))?;
        tenants
            .get(tenant_id)
            .cloned()
            .ok_or_else(|| GateError::TenantNotFound(tenant_id.to_string()))
    }
}
