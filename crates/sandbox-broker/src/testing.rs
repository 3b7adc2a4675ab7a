//! Test fixtures: an instrumented cluster client over an in-memory store.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use sandbox_state::*;

/// Per-operation call counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calls {
    pub list: usize,
    pub patch: usize,
    pub delete: usize,
    pub get_scale: usize,
    pub update_scale: usize,
}

impl Calls {
    pub fn total(&self) -> usize {
        self.list + self.patch + self.delete + self.get_scale + self.update_scale
    }
}

#[derive(Default)]
struct Counters {
    list: AtomicUsize,
    patch: AtomicUsize,
    delete: AtomicUsize,
    get_scale: AtomicUsize,
    update_scale: AtomicUsize,
    fail_lists: AtomicBool,
    bump_pool_after_get_scale: AtomicBool,
    yield_after_list: AtomicBool,
}

/// Wraps a `StateStore`, counting calls and injecting faults on demand.
#[derive(Clone)]
pub struct TestClient {
    store: StateStore,
    counters: Arc<Counters>,
}

impl TestClient {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn calls(&self) -> Calls {
        let c = &self.counters;
        Calls {
            list: c.list.load(Ordering::SeqCst),
            patch: c.patch.load(Ordering::SeqCst),
            delete: c.delete.load(Ordering::SeqCst),
            get_scale: c.get_scale.load(Ordering::SeqCst),
            update_scale: c.update_scale.load(Ordering::SeqCst),
        }
    }

    /// Make every listing fail with a read error.
    pub fn fail_lists(&self, fail: bool) {
        self.counters.fail_lists.store(fail, Ordering::SeqCst);
    }

    /// Rewrite the pool right after each scale read, so the write conflicts.
    pub fn bump_pool_after_get_scale(&self, bump: bool) {
        self.counters.bump_pool_after_get_scale.store(bump, Ordering::SeqCst);
    }

    /// Yield to the scheduler between a listing and the caller's next step,
    /// so concurrent allocations all list before any of them claims.
    pub fn yield_after_list(&self, yield_now: bool) {
        self.counters.yield_after_list.store(yield_now, Ordering::SeqCst);
    }
}

impl ClusterClient for TestClient {
    fn list_instances<'a>(
        &'a self,
        selector: &'a InstanceSelector,
    ) -> ClusterFuture<'a, Vec<SandboxInstance>> {
        Box::pin(async move {
            self.counters.list.fetch_add(1, Ordering::SeqCst);
            if self.counters.fail_lists.load(Ordering::SeqCst) {
                return Err(StateError::Read("injected list failure".to_string()));
            }
            let listed = self.store.list_instances(selector)?;
            if self.counters.yield_after_list.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
            }
            Ok(listed)
        })
    }

    fn patch_claim<'a>(
        &'a self,
        name: &'a str,
        expected_version: u64,
        claim: ClaimState,
    ) -> ClusterFuture<'a, SandboxInstance> {
        self.counters.patch.fetch_add(1, Ordering::SeqCst);
        ClusterClient::patch_claim(&self.store, name, expected_version, claim)
    }

    fn delete_instance<'a>(&'a self, name: &'a str) -> ClusterFuture<'a, ()> {
        self.counters.delete.fetch_add(1, Ordering::SeqCst);
        ClusterClient::delete_instance(&self.store, name)
    }

    fn get_scale<'a>(&'a self, pool: &'a str) -> ClusterFuture<'a, PoolScale> {
        Box::pin(async move {
            self.counters.get_scale.fetch_add(1, Ordering::SeqCst);
            let scale = ClusterClient::get_scale(&self.store, pool).await?;
            if self.counters.bump_pool_after_get_scale.load(Ordering::SeqCst)
                && let Some(p) = self.store.get_pool(pool)?
            {
                self.store.put_pool(&p)?;
            }
            Ok(scale)
        })
    }

    fn update_scale<'a>(&'a self, pool: &'a str, scale: PoolScale) -> ClusterFuture<'a, PoolScale> {
        self.counters.update_scale.fetch_add(1, Ordering::SeqCst);
        ClusterClient::update_scale(&self.store, pool, scale)
    }
}

/// Mark an instance Running + Ready with an address derived from its name.
pub fn make_ready(mut inst: SandboxInstance) -> SandboxInstance {
    let host = inst
        .name
        .rsplit('-')
        .next()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(0);
    inst.phase = InstancePhase::Running;
    inst.conditions.push(InstanceCondition {
        kind: ConditionKind::Ready,
        status: true,
    });
    inst.address = Some(format!("10.0.0.{host}"));
    inst
}

pub fn names(instances: &[SandboxInstance]) -> Vec<String> {
    instances.iter().map(|i| i.name.clone()).collect()
}

/// An in-memory store with `pg-sandbox` (2 replicas) and `mysql-sandbox`
/// (1 replica) pools and no instances.
pub struct Fixture {
    pub store: StateStore,
    pub client: TestClient,
}

impl Fixture {
    pub fn new() -> Self {
        let store = StateStore::open_in_memory().unwrap();
        store.ensure_pool("pg-sandbox", Dialect::Postgres, 2).unwrap();
        store.ensure_pool("mysql-sandbox", Dialect::Mysql, 1).unwrap();
        let client = TestClient::new(store.clone());
        Self { store, client }
    }

    fn pool_for(&self, dialect: Dialect) -> DialectPool {
        let name = match dialect {
            Dialect::Postgres => "pg-sandbox",
            Dialect::Mysql => "mysql-sandbox",
        };
        self.store.get_pool(name).unwrap().unwrap()
    }

    /// A free, running, ready instance.
    pub fn running(&self, dialect: Dialect) -> SandboxInstance {
        let inst = self.store.create_instance(&self.pool_for(dialect)).unwrap();
        self.store.put_instance(&make_ready(inst)).unwrap()
    }

    /// A free, running instance whose Ready condition is false.
    pub fn running_not_ready(&self, dialect: Dialect) -> SandboxInstance {
        let mut inst = self.store.create_instance(&self.pool_for(dialect)).unwrap();
        inst.phase = InstancePhase::Running;
        inst.conditions.push(InstanceCondition {
            kind: ConditionKind::Ready,
            status: false,
        });
        inst.address = Some("10.0.0.250".to_string());
        self.store.put_instance(&inst).unwrap()
    }

    /// A free, pending instance.
    pub fn pending(&self, dialect: Dialect) -> SandboxInstance {
        self.store.create_instance(&self.pool_for(dialect)).unwrap()
    }

    /// Claim an instance behind the broker's back.
    pub fn claim(&self, inst: &SandboxInstance) -> SandboxInstance {
        let current = self.get(&inst.name);
        self.store
            .patch_claim(&current.name, current.resource_version, ClaimState::Claimed)
            .unwrap()
    }

    pub fn get(&self, name: &str) -> SandboxInstance {
        self.store.get_instance(name).unwrap().unwrap()
    }

    pub fn replicas(&self, pool: &str) -> u32 {
        self.store.get_pool(pool).unwrap().unwrap().replicas
    }
}
