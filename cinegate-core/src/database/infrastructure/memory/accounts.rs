use std::collections::HashSet;

use async_trait::async_trait;
use cinegate_model::{AccountId, InviteId, ViewerAccount};
use dashmap::{DashMap, mapref::entry::Entry};

use crate::database::ports::accounts::{
    AccountMutation, AccountStore, CreditOutcome,
};
use crate::error::{StoreError, StoreResult};

/// Account row plus the dedup keys of every credit applied to it.
#[derive(Debug, Clone)]
struct AccountSlot {
    account: ViewerAccount,
    applied_credits: HashSet<InviteId>,
}

/// Process-local account store.
///
/// Each account lives in its own `DashMap` entry; holding the entry's write
/// guard is the per-account lock, so the read-modify-write in
/// [`AccountStore::atomic_update_account`] never interleaves with another
/// update of the same account.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: DashMap<AccountId, AccountSlot>,
    emails: DashMap<String, AccountId>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn not_found(id: AccountId) -> StoreError {
        StoreError::NotFound {
            entity: "account",
            id: id.to_string(),
        }
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn insert_account(
        &self,
        account: ViewerAccount,
    ) -> StoreResult<ViewerAccount> {
        match self.emails.entry(account.email.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate {
                entity: "account",
                detail: format!(
                    "email {} is already registered",
                    account.email
                ),
            }),
            Entry::Vacant(slot) => {
                if self.accounts.contains_key(&account.id) {
                    return Err(StoreError::Duplicate {
                        entity: "account",
                        detail: format!("id {} already exists", account.id),
                    });
                }
                self.accounts.insert(
                    account.id,
                    AccountSlot {
                        account: account.clone(),
                        applied_credits: HashSet::new(),
                    },
                );
                slot.insert(account.id);
                Ok(account)
            }
        }
    }

    async fn get_account(
        &self,
        id: AccountId,
    ) -> StoreResult<Option<ViewerAccount>> {
        Ok(self.accounts.get(&id).map(|slot| slot.account.clone()))
    }

    async fn find_by_email(
        &self,
        email: &str,
    ) -> StoreResult<Option<ViewerAccount>> {
        let Some(id) = self.emails.get(email).map(|entry| *entry.value())
        else {
            return Ok(None);
        };
        self.get_account(id).await
    }

    async fn atomic_update_account(
        &self,
        id: AccountId,
        update: AccountMutation<'_>,
    ) -> StoreResult<ViewerAccount> {
        let mut slot =
            self.accounts.get_mut(&id).ok_or_else(|| Self::not_found(id))?;

        let mut draft = slot.account.clone();
        if update(&mut draft) {
            // Identity and email are owned by registration, not by updates.
            draft.id = slot.account.id;
            draft.email = slot.account.email.clone();
            slot.account = draft;
        }
        Ok(slot.account.clone())
    }

    async fn credit_bonus_once(
        &self,
        id: AccountId,
        key: InviteId,
        amount: u32,
    ) -> StoreResult<CreditOutcome> {
        let mut slot =
            self.accounts.get_mut(&id).ok_or_else(|| Self::not_found(id))?;

        if !slot.applied_credits.insert(key) {
            return Ok(CreditOutcome::AlreadyApplied);
        }
        let balance = slot.account.bonus_views_available.saturating_add(amount);
        slot.account.bonus_views_available = balance;
        Ok(CreditOutcome::Applied { balance })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn account(email: &str) -> ViewerAccount {
        ViewerAccount::register(
            email,
            Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn email_uniqueness_is_enforced() {
        let store = InMemoryAccountStore::new();
        store.insert_account(account("a@example.com")).await.unwrap();

        let err = store
            .insert_account(account("a@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn clean_update_commits_nothing() {
        let store = InMemoryAccountStore::new();
        let stored =
            store.insert_account(account("a@example.com")).await.unwrap();

        let after = store
            .atomic_update_account(stored.id, &mut |draft| {
                draft.daily_views_consumed = 99;
                false
            })
            .await
            .unwrap();
        assert_eq!(after.daily_views_consumed, 0);
    }

    #[tokio::test]
    async fn credits_apply_once_per_key() {
        let store = InMemoryAccountStore::new();
        let stored =
            store.insert_account(account("a@example.com")).await.unwrap();
        let key = InviteId::new();

        let first = store.credit_bonus_once(stored.id, key, 2).await.unwrap();
        let second = store.credit_bonus_once(stored.id, key, 2).await.unwrap();

        assert_eq!(first, CreditOutcome::Applied { balance: 2 });
        assert_eq!(second, CreditOutcome::AlreadyApplied);
        let reloaded = store.get_account(stored.id).await.unwrap().unwrap();
        assert_eq!(reloaded.bonus_views_available, 2);
    }

    #[tokio::test]
    async fn updating_unknown_account_is_not_found() {
        let store = InMemoryAccountStore::new();
        let err = store
            .atomic_update_account(AccountId::new(), &mut |_| true)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
