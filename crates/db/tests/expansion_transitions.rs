//! Integration tests for the expansion status machine and auto-resolution
//! storage operations.
//!
//! Exercises `ExpansionRepo` and `VoteRepo` against a real database:
//! - guarded transitions let exactly one racing caller through
//! - adopt inserts one tile and drops the lease; adopt/reject race
//! - fail-and-release drops the lease
//! - votes only land on `DONE` expansions and upsert per user
//! - stale-candidate listing and group settlement

use chrono::{Duration, Utc};
use jigsaw_core::expansion::{ExpansionStatus, Prompt, VoteValue};
use jigsaw_core::grid::{Cell, Direction};
use jigsaw_core::lease::DEFAULT_LEASE_SECONDS;
use jigsaw_core::room::InitialTileStatus;
use jigsaw_core::types::EntityId;
use jigsaw_db::is_unique_violation;
use jigsaw_db::models::expansion::{CreateExpansion, Expansion, GroupSettlement};
use jigsaw_db::models::room::CreateRoom;
use jigsaw_db::models::tile::Tile;
use jigsaw_db::repositories::{
    CellLockRepo, ExpansionRepo, RoomRepo, TileRepo, UserRepo, VoteRepo,
};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Fixture {
    room_id: EntityId,
    owner: EntityId,
    other: EntityId,
    origin: Tile,
}

async fn fixture(pool: &PgPool) -> Fixture {
    let owner = UserRepo::create(pool, "Owner").await.unwrap();
    let other = UserRepo::create(pool, "Other").await.unwrap();
    let room = RoomRepo::create(
        pool,
        owner.id,
        &CreateRoom {
            name: "Expansion room".to_string(),
            style_preset: None,
            initial_prompt: None,
        },
    )
    .await
    .unwrap();
    RoomRepo::transition_initial_status(
        pool,
        room.id,
        &[InitialTileStatus::Pending],
        InitialTileStatus::Generating,
    )
    .await
    .unwrap()
    .unwrap();
    let origin = RoomRepo::complete_initial_tile(pool, room.id, owner.id, "/generated/origin.png")
        .await
        .unwrap()
        .unwrap();
    Fixture {
        room_id: room.id,
        owner: owner.id,
        other: other.id,
        origin,
    }
}

/// Lock the cell east of the origin and queue an expansion into it.
async fn queued(pool: &PgPool, f: &Fixture, user: EntityId) -> Expansion {
    CellLockRepo::acquire(pool, f.room_id, Cell::new(1, 0), user, Utc::now(), DEFAULT_LEASE_SECONDS)
        .await
        .unwrap();
    ExpansionRepo::create(
        pool,
        f.room_id,
        user,
        &CreateExpansion {
            from_tile_id: f.origin.id,
            target_x: 1,
            target_y: 0,
            direction: Direction::East,
            prompt: Prompt::new("a forest"),
        },
    )
    .await
    .unwrap()
}

async fn done(pool: &PgPool, f: &Fixture, user: EntityId, image: &str) -> Expansion {
    let e = queued(pool, f, user).await;
    ExpansionRepo::transition(pool, e.id, ExpansionStatus::Queued, ExpansionStatus::Running)
        .await
        .unwrap()
        .unwrap();
    ExpansionRepo::complete(pool, e.id, image).await.unwrap().unwrap()
}

async fn status_of(pool: &PgPool, id: EntityId) -> ExpansionStatus {
    ExpansionRepo::find_by_id(pool, id)
        .await
        .unwrap()
        .unwrap()
        .status()
        .unwrap()
}

async fn lock_exists(pool: &PgPool, f: &Fixture) -> bool {
    CellLockRepo::find_for_cell(pool, f.room_id, Cell::new(1, 0))
        .await
        .unwrap()
        .is_some()
}

// ---------------------------------------------------------------------------
// Guarded transitions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn new_expansion_is_queued_with_prompt(pool: PgPool) {
    let f = fixture(&pool).await;
    let e = queued(&pool, &f, f.owner).await;

    assert_eq!(e.status().unwrap(), ExpansionStatus::Queued);
    assert_eq!(e.direction().unwrap(), Direction::East);
    assert_eq!(e.target(), Cell::new(1, 0));
    assert_eq!(e.prompt.0, Prompt::new("a forest"));
    assert!(e.result_image_url.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_run_claims_exactly_once(pool: PgPool) {
    let f = fixture(&pool).await;
    let e = queued(&pool, &f, f.owner).await;

    let (first, second) = tokio::join!(
        ExpansionRepo::transition(&pool, e.id, ExpansionStatus::Queued, ExpansionStatus::Running),
        ExpansionRepo::transition(&pool, e.id, ExpansionStatus::Queued, ExpansionStatus::Running),
    );
    let winners = [first.unwrap(), second.unwrap()]
        .into_iter()
        .flatten()
        .count();

    assert_eq!(winners, 1);
    assert_eq!(status_of(&pool, e.id).await, ExpansionStatus::Running);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn complete_requires_running(pool: PgPool) {
    let f = fixture(&pool).await;
    let e = queued(&pool, &f, f.owner).await;

    assert!(ExpansionRepo::complete(&pool, e.id, "/generated/x.png")
        .await
        .unwrap()
        .is_none());
    assert_eq!(status_of(&pool, e.id).await, ExpansionStatus::Queued);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn failure_marks_failed_and_drops_the_lease(pool: PgPool) {
    let f = fixture(&pool).await;
    let e = queued(&pool, &f, f.owner).await;
    let running =
        ExpansionRepo::transition(&pool, e.id, ExpansionStatus::Queued, ExpansionStatus::Running)
            .await
            .unwrap()
            .unwrap();

    let failed = ExpansionRepo::fail_and_release(&pool, &running).await.unwrap();

    assert_eq!(failed.unwrap().status().unwrap(), ExpansionStatus::Failed);
    assert!(!lock_exists(&pool, &f).await);
    assert!(TileRepo::find_at(&pool, f.room_id, Cell::new(1, 0))
        .await
        .unwrap()
        .is_none());
}

// ---------------------------------------------------------------------------
// Adopt / reject
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn adopt_places_one_tile_and_drops_the_lease(pool: PgPool) {
    let f = fixture(&pool).await;
    let e = done(&pool, &f, f.owner, "/generated/east.png").await;

    let (tile, adopted) = ExpansionRepo::adopt(&pool, &e, "/generated/east.png")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(tile.cell(), Cell::new(1, 0));
    assert_eq!(tile.image_url, "/generated/east.png");
    assert_eq!(tile.created_by_user_id, f.owner);
    assert_eq!(adopted.status().unwrap(), ExpansionStatus::Adopted);
    assert!(!lock_exists(&pool, &f).await);

    // A second adopt misses the guard.
    assert!(ExpansionRepo::adopt(&pool, &e, "/generated/east.png")
        .await
        .unwrap()
        .is_none());
    assert_eq!(TileRepo::list_by_room(&pool, f.room_id).await.unwrap().len(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn adopt_reject_race_has_one_winner(pool: PgPool) {
    let f = fixture(&pool).await;
    let e = done(&pool, &f, f.owner, "/generated/east.png").await;

    let (adopt, reject) = tokio::join!(
        ExpansionRepo::adopt(&pool, &e, "/generated/east.png"),
        ExpansionRepo::reject(&pool, &e),
    );
    let adopted = adopt.unwrap().is_some();
    let rejected = reject.unwrap().is_some();

    assert!(adopted ^ rejected, "adopted={adopted} rejected={rejected}");
    let tile = TileRepo::find_at(&pool, f.room_id, Cell::new(1, 0)).await.unwrap();
    assert_eq!(tile.is_some(), adopted);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn adopt_into_occupied_cell_rolls_back(pool: PgPool) {
    let f = fixture(&pool).await;
    let first = done(&pool, &f, f.owner, "/generated/first.png").await;
    let second = done(&pool, &f, f.owner, "/generated/second.png").await;

    ExpansionRepo::adopt(&pool, &first, "/generated/first.png")
        .await
        .unwrap()
        .unwrap();
    let err = ExpansionRepo::adopt(&pool, &second, "/generated/second.png")
        .await
        .unwrap_err();

    assert!(is_unique_violation(&err, "uq_tiles_room_cell"));
    assert_eq!(status_of(&pool, second.id).await, ExpansionStatus::Done);
}

// ---------------------------------------------------------------------------
// Votes
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn votes_require_done(pool: PgPool) {
    let f = fixture(&pool).await;
    let e = queued(&pool, &f, f.owner).await;

    let vote = VoteRepo::cast(&pool, e.id, f.other, VoteValue::Adopt).await.unwrap();
    assert!(vote.is_none());
    assert!(VoteRepo::list_by_expansion(&pool, e.id).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn revote_updates_in_place(pool: PgPool) {
    let f = fixture(&pool).await;
    let e = done(&pool, &f, f.owner, "/generated/east.png").await;

    VoteRepo::cast(&pool, e.id, f.other, VoteValue::Adopt).await.unwrap().unwrap();
    let changed = VoteRepo::cast(&pool, e.id, f.other, VoteValue::Reject)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(changed.vote, "reject");
    let votes = VoteRepo::list_by_expansion(&pool, e.id).await.unwrap();
    assert_eq!(votes.len(), 1);
    assert_eq!(status_of(&pool, e.id).await, ExpansionStatus::Done);
}

// ---------------------------------------------------------------------------
// Auto-resolution storage
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn stale_candidates_carry_vote_counts(pool: PgPool) {
    let f = fixture(&pool).await;
    let x = done(&pool, &f, f.owner, "/generated/x.png").await;
    let y = done(&pool, &f, f.other, "/generated/y.png").await;
    VoteRepo::cast(&pool, x.id, f.owner, VoteValue::Adopt).await.unwrap();
    VoteRepo::cast(&pool, x.id, f.other, VoteValue::Adopt).await.unwrap();
    VoteRepo::cast(&pool, y.id, f.other, VoteValue::Reject).await.unwrap();

    // Nothing is stale at the current instant.
    let now = Utc::now();
    assert!(!ExpansionRepo::has_stale_done(&pool, f.room_id, now - Duration::minutes(5))
        .await
        .unwrap());

    let cutoff = now + Duration::minutes(1);
    assert!(ExpansionRepo::has_stale_done(&pool, f.room_id, cutoff).await.unwrap());
    let candidates = ExpansionRepo::list_stale_candidates(&pool, f.room_id, cutoff)
        .await
        .unwrap();

    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].id, x.id);
    assert_eq!((candidates[0].adopt_votes, candidates[0].reject_votes), (2, 0));
    assert_eq!(candidates[1].id, y.id);
    assert_eq!((candidates[1].adopt_votes, candidates[1].reject_votes), (0, 1));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn settle_group_adopts_winner_and_rejects_the_rest(pool: PgPool) {
    let f = fixture(&pool).await;
    let x = done(&pool, &f, f.owner, "/generated/x.png").await;
    let y = done(&pool, &f, f.other, "/generated/y.png").await;
    let cutoff = Utc::now() + Duration::minutes(1);
    let candidates = ExpansionRepo::list_stale_candidates(&pool, f.room_id, cutoff)
        .await
        .unwrap();

    let settled = ExpansionRepo::settle_group(
        &pool,
        f.room_id,
        Cell::new(1, 0),
        Some(&candidates[0]),
        &[y.id],
    )
    .await
    .unwrap();

    assert_eq!(
        settled,
        GroupSettlement::Settled {
            adopted: Some(x.id),
            rejected: vec![y.id],
        }
    );
    assert_eq!(status_of(&pool, x.id).await, ExpansionStatus::Adopted);
    assert_eq!(status_of(&pool, y.id).await, ExpansionStatus::Rejected);
    let tile = TileRepo::find_at(&pool, f.room_id, Cell::new(1, 0))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tile.image_url, "/generated/x.png");
    assert!(!lock_exists(&pool, &f).await);

    // The winner already moved: a replay misses the guard and writes nothing.
    let replay = ExpansionRepo::settle_group(
        &pool,
        f.room_id,
        Cell::new(1, 0),
        Some(&candidates[0]),
        &[],
    )
    .await
    .unwrap();
    assert_eq!(replay, GroupSettlement::WinnerUnavailable);
    assert!(ExpansionRepo::list_stale_candidates(&pool, f.room_id, cutoff)
        .await
        .unwrap()
        .is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn force_reject_only_touches_done_rows(pool: PgPool) {
    let f = fixture(&pool).await;
    let d = done(&pool, &f, f.owner, "/generated/d.png").await;
    let q = queued(&pool, &f, f.owner).await;

    let rejected = ExpansionRepo::force_reject(&pool, f.room_id, Cell::new(1, 0), &[d.id, q.id])
        .await
        .unwrap();

    assert_eq!(rejected, vec![d.id]);
    assert_eq!(status_of(&pool, d.id).await, ExpansionStatus::Rejected);
    assert_eq!(status_of(&pool, q.id).await, ExpansionStatus::Queued);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn open_listing_hides_settled_expansions(pool: PgPool) {
    let f = fixture(&pool).await;
    let kept = queued(&pool, &f, f.owner).await;
    let gone = done(&pool, &f, f.owner, "/generated/g.png").await;
    ExpansionRepo::reject(&pool, &gone).await.unwrap().unwrap();

    let open = ExpansionRepo::list_open_by_room(&pool, f.room_id).await.unwrap();
    assert_eq!(open.iter().map(|e| e.id).collect::<Vec<_>>(), vec![kept.id]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn replayed_settlement_keeps_a_newer_lease(pool: PgPool) {
    let f = fixture(&pool).await;
    let e = done(&pool, &f, f.owner, "/generated/e.png").await;
    let cell = Cell::new(1, 0);

    let first = ExpansionRepo::settle_group(&pool, f.room_id, cell, None, &[e.id])
        .await
        .unwrap();
    assert_eq!(
        first,
        GroupSettlement::Settled {
            adopted: None,
            rejected: vec![e.id],
        }
    );
    assert!(!lock_exists(&pool, &f).await);

    // Someone else claims the freed cell before a second pass commits the
    // same plan.
    CellLockRepo::acquire(&pool, f.room_id, cell, f.other, Utc::now(), DEFAULT_LEASE_SECONDS)
        .await
        .unwrap();

    let replay = ExpansionRepo::settle_group(&pool, f.room_id, cell, None, &[e.id])
        .await
        .unwrap();
    assert_eq!(replay, GroupSettlement::AlreadySettled);
    assert!(lock_exists(&pool, &f).await);

    let forced = ExpansionRepo::force_reject(&pool, f.room_id, cell, &[e.id])
        .await
        .unwrap();
    assert!(forced.is_empty());

    let lock = CellLockRepo::find_for_cell(&pool, f.room_id, cell)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lock.holder_user_id, f.other);
    assert_eq!(status_of(&pool, e.id).await, ExpansionStatus::Rejected);
}
