use ahash::AHashMap;
use serde::Serialize;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::step::SessionStep;
use crate::config::SessionConfig;
use crate::error::{GateError, Result};

/// Composite key: one live session per (customer, tenant) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub customer_id: String,
    pub tenant_id: String,
}

impl SessionKey {
    pub fn new(customer_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self { customer_id: customer_id.into(), tenant_id: tenant_id.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLine {
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price_cents: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContactInfo {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discount {
    pub code: String,
    pub percent: u8,
}

/// One conversational session.
#[derive(Debug, Clone)]
pub struct Session {
    pub step: SessionStep,
    pub cart: Vec<CartLine>,
    pub contact: ContactInfo,
    pub discount: Option<Discount>,
    pub created_at: Instant,
    pub last_activity: Instant,
}

impl Session {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            step: SessionStep::INITIAL,
            cart: Vec::new(),
            contact: ContactInfo::default(),
            discount: None,
            created_at: now,
            last_activity: now,
        }
    }

    /// Move to the next step, rejecting transitions outside the table.
    pub fn advance(&mut self, next: SessionStep) -> Result<()> {
        if !self.step.can_transition(next) {
            return Err(GateError::InvalidTransition { from: self.step, to: next });
        }
        self.step = next;
        Ok(())
    }

    pub fn cart_total_cents(&self) -> u64 {
        let subtotal: u64 = self
            .cart
            .iter()
            .map(|line| line.unit_price_cents * u64::from(line.quantity))
            .sum();
        match &self.discount {
            Some(d) => subtotal - subtotal * u64::from(d.percent.min(100)) / 100,
            None => subtotal,
        }
    }

    fn is_live(&self, now: Instant, idle: Duration, absolute: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) < idle
            && now.saturating_duration_since(self.created_at) < absolute
    }

    /// Rough per-session footprint, used for the stats snapshot.
    fn estimated_bytes(&self) -> usize {
        let cart: usize = self
            .cart
            .iter()
            .map(|l| l.sku.len() + l.name.len() + 16)
            .sum();
        let contact = self.contact.name.as_deref().map_or(0, str::len)
            + self.contact.phone.as_deref().map_or(0, str::len)
            + self.contact.address.as_deref().map_or(0, str::len);
        std::mem::size_of::<Session>() + cart + contact
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub active_sessions: usize,
    pub estimated_bytes: usize,
}

/// In-memory session store with lazy expiry, proactive sweeps and
/// memory-pressure eviction.
pub struct SessionStore {
    config: SessionConfig,
    sessions: RwLock<AHashMap<SessionKey, Session>>,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self { config, sessions: RwLock::new(AHashMap::new()) }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.config.idle_timeout()
    }

    /// Memory thresholds for the pipeline's pressure check.
    pub fn memory_config(&self) -> &SessionConfig {
        &self.config
    }

    /// Fetch a live session, refreshing its activity stamp. An expired
    /// session is evicted here and `None` is returned.
    pub fn get(&self, key: &SessionKey) -> Option<Session> {
        let now = Instant::now();
        let mut sessions = match self.sessions.write() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("session store lock poisoned");
                return None;
            }
        };
        let live = sessions.get(key).is_some_and(|s| {
            s.is_live(now, self.config.idle_timeout(), self.config.absolute_timeout())
        });
        if !live {
            if sessions.remove(key).is_some() {
                debug!(
                    customer = %key.customer_id,
                    tenant = %key.tenant_id,
                    "expired session evicted on access"
                );
            }
            return None;
        }
        let session = sessions.get_mut(key)?;
        session.last_activity = now;
        Some(session.clone())
    }

    /// Create a fresh session at the initial step, replacing any stale one.
    /// When the store is full, the stalest session is evicted first.
    pub fn create(&self, key: SessionKey) -> Session {
        let now = Instant::now();
        let session = Session::new(now);
        if let Ok(mut sessions) = self.sessions.write() {
            if sessions.len() >= self.config.max_sessions && !sessions.contains_key(&key) {
                if let Some(stalest) = sessions
                    .iter()
                    .min_by_key(|(_, s)| s.last_activity)
                    .map(|(k, _)| k.clone())
                {
                    sessions.remove(&stalest);
                    debug!("session store full, evicted stalest session");
                }
            }
            sessions.insert(key, session.clone());
        }
        session
    }

    pub fn get_or_create(&self, key: &SessionKey) -> Session {
        match self.get(key) {
            Some(session) => session,
            None => self.create(key.clone()),
        }
    }

    /// Write back a session mutated by the business handler.
    pub fn update(&self, key: &SessionKey, mut session: Session) {
        session.last_activity = Instant::now();
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.insert(key.clone(), session);
        }
    }

    /// Remove a session (terminal action). Returns true if one existed.
    pub fn delete(&self, key: &SessionKey) -> bool {
        match self.sessions.write() {
            Ok(mut sessions) => sessions.remove(key).is_some(),
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Proactive sweep removing every expired session. Returns the number
    /// evicted.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let idle = self.config.idle_timeout();
        let absolute = self.config.absolute_timeout();
        let Ok(mut sessions) = self.sessions.write() else {
            return 0;
        };
        let before = sessions.len();
        sessions.retain(|_, s| s.is_live(now, idle, absolute));
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, remaining = sessions.len(), "session sweep");
        }
        evicted
    }

    /// Memory-pressure path: evict sessions idle beyond `min_idle` even if
    /// still inside the normal timeout. Returns the number evicted.
    pub fn evict_idle(&self, min_idle: Duration) -> usize {
        let now = Instant::now();
        let Ok(mut sessions) = self.sessions.write() else {
            return 0;
        };
        let before = sessions.len();
        sessions.retain(|_, s| now.saturating_duration_since(s.last_activity) < min_idle);
        before - sessions.len()
    }

    pub fn stats(&self) -> SessionStats {
        match self.sessions.read() {
            Ok(sessions) => SessionStats {
                active_sessions: sessions.len(),
                estimated_bytes: sessions.values().map(Session::estimated_bytes).sum(),
            },
            Err(_) => SessionStats { active_sessions: 0, estimated_bytes: 0 },
        }
    }

    pub fn clear(&self) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.clear();
        }
    }

    pub fn shutdown(&self) {
        let stats = self.stats();
        info!(
            active_sessions = stats.active_sessions,
            estimated_bytes = stats.estimated_bytes,
            "session store shutting down"
        );
        self.clear();
    }
}
