//! Postgres store behaviour. Needs `DATABASE_URL` pointing at a server where
//! `#[sqlx::test]` may create scratch databases:
//!
//! `cargo test -p cinegate-core --features postgres-tests \
//!     --test postgres_stores`
#![cfg(feature = "postgres-tests")]

use std::sync::Arc;

use anyhow::Result;
use chrono::Duration;
use cinegate_core::{
    StoreError,
    clock::{Clock, ManualClock},
    database::{
        infrastructure::postgres::{PostgresAccountStore, PostgresInviteStore},
        ports::{AccountStore, CreditOutcome, InviteStore},
    },
    domain::{
        entitlements::{AccessEngine, PlanRegistry},
        referrals::InviteService,
    },
};
use cinegate_model::{
    Asset, DenyReason, InviteStatus, ResolutionTier, ViewerAccount,
    WatchRequest,
};
use sqlx::PgPool;

#[path = "support/mod.rs"]
mod support;

#[sqlx::test(migrator = "cinegate_core::MIGRATOR")]
async fn duplicate_email_is_reported(pool: PgPool) -> Result<()> {
    let store = PostgresAccountStore::new(pool);
    store
        .insert_account(ViewerAccount::register(
            "dup@example.com",
            support::morning(),
        ))
        .await?;

    let err = store
        .insert_account(ViewerAccount::register(
            "dup@example.com",
            support::morning(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Duplicate { .. }), "{err:?}");
    Ok(())
}

#[sqlx::test(migrator = "cinegate_core::MIGRATOR")]
async fn keyed_credit_applies_once(pool: PgPool) -> Result<()> {
    let store = PostgresAccountStore::new(pool);
    let account = store
        .insert_account(ViewerAccount::register(
            "host@example.com",
            support::morning(),
        ))
        .await?;
    let invite = cinegate_model::InviteId::new();

    let first = store.credit_bonus_once(account.id, invite, 2).await?;
    let second = store.credit_bonus_once(account.id, invite, 2).await?;

    assert_eq!(first, CreditOutcome::Applied { balance: 2 });
    assert_eq!(second, CreditOutcome::AlreadyApplied);
    let stored = store.get_account(account.id).await?.expect("account exists");
    assert_eq!(stored.bonus_views_available, 2);
    Ok(())
}

#[sqlx::test(migrator = "cinegate_core::MIGRATOR")]
async fn parallel_decisions_respect_the_allowance(pool: PgPool) -> Result<()> {
    let store = Arc::new(PostgresAccountStore::new(pool));
    let clock = Arc::new(ManualClock::new(support::morning()));
    let viewer = store
        .insert_account(ViewerAccount::register(
            "racer@example.com",
            support::morning(),
        ))
        .await?;
    let engine = Arc::new(AccessEngine::new(
        store.clone(),
        Arc::new(PlanRegistry::default()),
        clock,
    ));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            let request = WatchRequest::for_viewer(
                viewer.clone(),
                Asset::new("metropolis", false),
                ResolutionTier::P480,
            );
            tokio::spawn(async move { engine.decide(&request).await })
        })
        .collect();

    let mut allowed = 0;
    let mut exhausted = 0;
    for handle in handles {
        let decision = handle.await?;
        if decision.allowed {
            allowed += 1;
        } else if decision.denied_because(DenyReason::DailyQuotaExceeded) {
            exhausted += 1;
        }
    }

    // Row locks serialize the updates; late arrivals see a spent counter.
    assert_eq!(allowed, 5);
    assert_eq!(exhausted, 3);
    let stored = store.get_account(viewer.id).await?.expect("account exists");
    assert_eq!(stored.daily_views_consumed, 5);
    Ok(())
}

#[sqlx::test(migrator = "cinegate_core::MIGRATOR")]
async fn invite_lifecycle_round_trips(pool: PgPool) -> Result<()> {
    let accounts = Arc::new(PostgresAccountStore::new(pool.clone()));
    let invites = Arc::new(PostgresInviteStore::new(pool));
    let clock = Arc::new(ManualClock::new(support::morning()));
    let service =
        InviteService::new(accounts.clone(), invites.clone(), clock.clone());

    let host = accounts
        .insert_account(ViewerAccount::register(
            "host@example.com",
            support::morning(),
        ))
        .await?;
    let invite = service.create_invite(host.id, "friend@example.com").await?;
    let again = service.create_invite(host.id, "friend@example.com").await;
    assert!(again.is_err());

    let by_code = invites
        .find_by_code(&invite.code)
        .await?
        .expect("code resolves");
    assert_eq!(by_code.id, invite.id);

    let accepted = service.accept_invite(invite.id).await?;
    assert_eq!(accepted.invite.status, InviteStatus::Accepted);
    assert!(accepted.credit.was_applied());
    let replay = service.accept_invite(invite.id).await?;
    assert_eq!(replay.credit, CreditOutcome::AlreadyApplied);

    let stale = service.create_invite(host.id, "late@example.com").await?;
    clock.advance(Duration::days(8));
    assert_eq!(service.expire_stale_invites(clock.now()).await?, 1);
    let stale = invites.get_invite(stale.id).await?.expect("invite exists");
    assert_eq!(stale.status, InviteStatus::Expired);

    let stored = accounts.get_account(host.id).await?.expect("account exists");
    assert_eq!(stored.bonus_views_available, 2);
    Ok(())
}
