#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use cinegate_core::{
    StoreError, StoreResult,
    clock::{Clock, ManualClock},
    database::{
        infrastructure::memory::InMemoryAccountStore,
        ports::{AccountMutation, AccountStore, CreditOutcome},
    },
    domain::entitlements::{AccessEngine, PlanRegistry},
};
use cinegate_model::{AccountId, InviteId, Plan, ViewerAccount};

/// 2024-05-10 09:00 UTC, mid-morning on an ordinary day.
pub fn morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap()
}

pub fn midnight_after_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 11, 0, 0, 0).unwrap()
}

pub struct Harness {
    pub store: Arc<InMemoryAccountStore>,
    pub clock: Arc<ManualClock>,
    pub engine: AccessEngine<InMemoryAccountStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_registry(PlanRegistry::default())
    }

    pub fn with_registry(registry: PlanRegistry) -> Self {
        let store = Arc::new(InMemoryAccountStore::new());
        let clock = Arc::new(ManualClock::new(morning()));
        let engine =
            AccessEngine::new(store.clone(), Arc::new(registry), clock.clone());
        Self {
            store,
            clock,
            engine,
        }
    }

    pub async fn account(
        &self,
        email: &str,
        plan: Plan,
        bonus: u32,
    ) -> ViewerAccount {
        let mut account = ViewerAccount::register(email, self.clock.now());
        account.plan = plan;
        account.bonus_views_available = bonus;
        self.store.insert_account(account).await.unwrap()
    }

    pub async fn reload(&self, id: AccountId) -> ViewerAccount {
        self.store.get_account(id).await.unwrap().unwrap()
    }
}

/// Failure injected by [`FaultyAccountStore`] into counter updates.
#[derive(Debug)]
pub enum Fault {
    Unavailable,
    Hang,
    /// Report a conflict this many times, then behave.
    Conflicts(AtomicU32),
}

/// In-memory store whose atomic updates misbehave on demand. Reads and
/// inserts pass through.
pub struct FaultyAccountStore {
    pub inner: InMemoryAccountStore,
    pub fault: Fault,
    pub update_calls: AtomicU32,
}

impl FaultyAccountStore {
    pub fn new(fault: Fault) -> Self {
        Self {
            inner: InMemoryAccountStore::new(),
            fault,
            update_calls: AtomicU32::new(0),
        }
    }

    pub fn conflicts(times: u32) -> Self {
        Self::new(Fault::Conflicts(AtomicU32::new(times)))
    }

    pub fn calls(&self) -> u32 {
        self.update_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountStore for FaultyAccountStore {
    async fn insert_account(
        &self,
        account: ViewerAccount,
    ) -> StoreResult<ViewerAccount> {
        self.inner.insert_account(account).await
    }

    async fn get_account(
        &self,
        id: AccountId,
    ) -> StoreResult<Option<ViewerAccount>> {
        self.inner.get_account(id).await
    }

    async fn find_by_email(
        &self,
        email: &str,
    ) -> StoreResult<Option<ViewerAccount>> {
        self.inner.find_by_email(email).await
    }

    async fn atomic_update_account(
        &self,
        id: AccountId,
        update: AccountMutation<'_>,
    ) -> StoreResult<ViewerAccount> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        match &self.fault {
            Fault::Unavailable => {
                Err(StoreError::Unavailable("connection refused".into()))
            }
            Fault::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                self.inner.atomic_update_account(id, update).await
            }
            Fault::Conflicts(left) => {
                let remaining = left.load(Ordering::SeqCst);
                if remaining > 0 {
                    left.store(remaining - 1, Ordering::SeqCst);
                    return Err(StoreError::Conflict(id.to_string()));
                }
                self.inner.atomic_update_account(id, update).await
            }
        }
    }

    async fn credit_bonus_once(
        &self,
        id: AccountId,
        key: InviteId,
        amount: u32,
    ) -> StoreResult<CreditOutcome> {
        self.inner.credit_bonus_once(id, key, amount).await
    }
}

pub fn faulty_engine(
    fault: Fault,
) -> (Arc<FaultyAccountStore>, AccessEngine<FaultyAccountStore>) {
    faulty_engine_with(FaultyAccountStore::new(fault))
}

pub fn faulty_engine_with(
    store: FaultyAccountStore,
) -> (Arc<FaultyAccountStore>, AccessEngine<FaultyAccountStore>) {
    let store = Arc::new(store);
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(morning()));
    let registry = Arc::new(PlanRegistry::default());
    let engine = AccessEngine::new(store.clone(), registry, clock);
    (store, engine)
}

impl FaultyAccountStore {
    pub async fn insert_account_at(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> ViewerAccount {
        self.inner
            .insert_account(ViewerAccount::register(email, now))
            .await
            .unwrap()
    }

    pub async fn inner_account(&self, id: AccountId) -> ViewerAccount {
        self.inner.get_account(id).await.unwrap().unwrap()
    }
}

/// Overwrite stored fields of an account, bypassing the engine.
pub async fn edit<S>(
    store: &S,
    id: AccountId,
    mut change: impl FnMut(&mut ViewerAccount) + Send,
) -> ViewerAccount
where
    S: AccountStore + ?Sized,
{
    store
        .atomic_update_account(id, &mut |account| {
            change(account);
            true
        })
        .await
        .unwrap()
}
