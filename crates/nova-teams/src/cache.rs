//! The tenant → team lookup table.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{debug, error, info};

use nova_client::{ClientResult, CloudClient};
use nova_core::{Tenant, TenantId};

/// One immutable generation of the mapping.
#[derive(Debug, Default)]
pub struct TeamTable {
    generation: u64,
    teams: HashMap<TenantId, String>,
}

impl TeamTable {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    /// Team for a tenant, or `""` when it has none.
    pub fn team(&self, tenant_id: &str) -> &str {
        self.teams.get(tenant_id).map(String::as_str).unwrap_or("")
    }
}

/// Map every tenant with a qualifying tag to its team. Tenants without
/// one are left out, so a tenant that lost its tag disappears from the
/// next generation instead of lingering.
fn team_map(tenants: &[Tenant], suffix: &str) -> HashMap<TenantId, String> {
    tenants
        .iter()
        .filter_map(|t| team_from_tags(&t.tags, suffix).map(|team| (t.id.clone(), team.to_string())))
        .collect()
}

/// The first tag carrying `suffix`, in tag order.
///
/// Tenants are expected to carry at most one team tag; when several
/// qualify the first listed wins.
pub fn team_from_tags<'a>(tags: &'a [String], suffix: &str) -> Option<&'a str> {
    tags.iter()
        .map(String::as_str)
        .find(|tag| tag.ends_with(suffix))
}

/// What a call to [`TeamCache::refresh`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new generation was installed.
    Refreshed {
        generation: u64,
        tenants: usize,
        teams: usize,
    },
    /// Another refresh was already running; nothing changed.
    Skipped,
}

struct Inner {
    suffix: String,
    table: RwLock<Arc<TeamTable>>,
    refreshing: AtomicBool,
}

/// Shared tenant → team mapping.
///
/// Cloning is cheap and every clone sees the same table. Created empty;
/// the first successful refresh populates it.
#[derive(Clone)]
pub struct TeamCache {
    inner: Arc<Inner>,
}

impl TeamCache {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                suffix: suffix.into(),
                table: RwLock::new(Arc::new(TeamTable::default())),
                refreshing: AtomicBool::new(false),
            }),
        }
    }

    pub fn suffix(&self) -> &str {
        &self.inner.suffix
    }

    /// Team name for a tenant; `""` if the tenant has no team.
    pub fn lookup_team(&self, tenant_id: &str) -> String {
        self.snapshot().team(tenant_id).to_string()
    }

    /// The current generation. Holding it keeps that generation alive
    /// while later refreshes install new ones.
    pub fn snapshot(&self) -> Arc<TeamTable> {
        let table = match self.inner.table.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(&table)
    }

    pub fn generation(&self) -> u64 {
        self.snapshot().generation()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Install a table built from `tenants` as the next generation.
    ///
    /// The table is built before the write lock is taken; the lock only
    /// covers the swap.
    pub fn replace(&self, tenants: &[Tenant]) -> Arc<TeamTable> {
        let teams = team_map(tenants, &self.inner.suffix);
        let mut slot = match self.inner.table.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let next = Arc::new(TeamTable {
            generation: slot.generation() + 1,
            teams,
        });
        *slot = Arc::clone(&next);
        next
    }

    /// Run one refresh cycle against the identity service.
    ///
    /// The listing happens without any lock held. On failure the current
    /// generation stays in place and the error is returned after being
    /// logged. A call made while another is in flight returns
    /// [`RefreshOutcome::Skipped`] immediately.
    pub async fn refresh(&self, client: &dyn CloudClient) -> ClientResult<RefreshOutcome> {
        let Some(_guard) = RefreshGuard::acquire(&self.inner.refreshing) else {
            debug!("team refresh already in flight, skipping");
            return Ok(RefreshOutcome::Skipped);
        };

        info!("updating tenant team map");
        let tenants = match client.list_tenants().await {
            Ok(tenants) => tenants,
            Err(e) => {
                error!(error = %e, generation = self.generation(), "could not list tenants, keeping previous team map");
                return Err(e);
            }
        };

        let table = self.replace(&tenants);
        info!(
            generation = table.generation(),
            tenants = tenants.len(),
            teams = table.len(),
            "tenant team map updated"
        );
        Ok(RefreshOutcome::Refreshed {
            generation: table.generation(),
            tenants: tenants.len(),
            teams: table.len(),
        })
    }
}

/// Clears the in-flight flag on drop, including when the refresh
/// future is cancelled mid-listing.
struct RefreshGuard<'a>(&'a AtomicBool);

impl<'a> RefreshGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
