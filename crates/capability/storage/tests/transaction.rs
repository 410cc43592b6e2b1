use geektext_storage::{
    ErrorKind, InMemoryDatabase, LeaseState, Pool, PoolOptions, StorageError, TransactionOp,
    params,
};
use std::sync::Arc;
use std::time::Duration;

fn wishlist_pool(max_connections: usize) -> (Arc<InMemoryDatabase>, Pool) {
    let db = InMemoryDatabase::new();
    db.create_table("wishlists").expect("create wishlists");
    db.create_table("wishlist_items").expect("create wishlist_items");
    let pool = Pool::new(
        db.connector(),
        PoolOptions::new().max_connections(max_connections),
    );
    (db, pool)
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

async fn count(pool: &Pool, table: &str) -> usize {
    pool.execute(&format!("SELECT * FROM {table}"), &[])
        .await
        .expect("count rows")
        .rows
        .len()
}

#[tokio::test]
async fn committed_transaction_is_durable() {
    let (_db, pool) = wishlist_pool(2);

    let mut conn = pool.acquire().await.expect("lease");
    conn.begin().await.expect("begin");
    assert_eq!(conn.state(), LeaseState::InTransaction);
    conn.run(
        "INSERT INTO wishlists (user_id, name) VALUES (?, ?)",
        &params![7_i64, "summer reading"],
    )
    .await
    .expect("wishlist");
    for book_id in [11_i64, 12, 13] {
        conn.run(
            "INSERT INTO wishlist_items (wishlist_id, book_id) VALUES (?, ?)",
            &params![1_i64, book_id],
        )
        .await
        .expect("item");
    }
    conn.commit().await.expect("commit");
    assert_eq!(conn.state(), LeaseState::Idle);
    conn.release().await.expect("release");

    assert_eq!(count(&pool, "wishlists").await, 1);
    assert_eq!(count(&pool, "wishlist_items").await, 3);
}

#[tokio::test]
async fn uncommitted_writes_are_invisible_to_other_connections() {
    let (_db, pool) = wishlist_pool(2);

    let mut conn = pool.acquire().await.expect("lease");
    conn.begin().await.expect("begin");
    conn.run(
        "INSERT INTO wishlists (user_id, name) VALUES (?, ?)",
        &params![1_i64, "gifts"],
    )
    .await
    .expect("insert");

    // 事务内可见，事务外不可见
    let inside = conn
        .run("SELECT * FROM wishlists", &[])
        .await
        .expect("select inside");
    assert_eq!(inside.rows.len(), 1);
    assert_eq!(count(&pool, "wishlists").await, 0);

    conn.commit().await.expect("commit");
    conn.release().await.expect("release");
    assert_eq!(count(&pool, "wishlists").await, 1);
}

#[tokio::test]
async fn release_without_commit_rolls_back() {
    let (db, pool) = wishlist_pool(1);

    let mut conn = pool.acquire().await.expect("lease");
    conn.begin().await.expect("begin");
    conn.run(
        "INSERT INTO wishlists (user_id, name) VALUES (?, ?)",
        &params![3_i64, "row A"],
    )
    .await
    .expect("insert");
    conn.release().await.expect("release rolls back");

    assert_eq!(count(&pool, "wishlists").await, 0);
    // 回滚后的连接被复用，没有新建连接
    assert_eq!(db.stats().opened, 1);
    assert_eq!(pool.stats().idle, 1);
}

async fn add_wishlist_then_fail(pool: &Pool) -> Result<(), StorageError> {
    let mut conn = pool.acquire().await?;
    conn.begin().await?;
    conn.run(
        "INSERT INTO wishlists (user_id, name) VALUES (?, ?)",
        &params![5_i64, "row A"],
    )
    .await?;
    // 表不存在：调用方在这里提前返回，没有 rollback 也没有 release
    conn.run(
        "INSERT INTO wishlist_tags (wishlist_id) VALUES (?)",
        &params![1_i64],
    )
    .await?;
    conn.commit().await?;
    conn.release().await
}

#[tokio::test]
async fn dropped_lease_inside_transaction_is_rolled_back() {
    let (db, pool) = wishlist_pool(2);

    let err = add_wishlist_then_fail(&pool).await.expect_err("second insert fails");
    assert_eq!(err.kind(), ErrorKind::Query);

    wait_for(|| {
        let stats = pool.stats();
        stats.available == 2 && stats.idle == 1
    })
    .await;

    assert_eq!(count(&pool, "wishlists").await, 0);
    assert_eq!(db.row_count("wishlists"), Some(0));
    assert_eq!(db.stats().opened, 1);
}

#[tokio::test]
async fn dropped_idle_lease_returns_to_pool() {
    let (_db, pool) = wishlist_pool(1);
    {
        let mut conn = pool.acquire().await.expect("lease");
        conn.run("SELECT * FROM wishlists", &[]).await.expect("select");
    }
    let stats = pool.stats();
    assert_eq!(stats.available, 1);
    assert_eq!(stats.idle, 1);
}

#[tokio::test]
async fn misuse_is_rejected_without_changing_state() {
    let (_db, pool) = wishlist_pool(1);
    let mut conn = pool.acquire().await.expect("lease");

    let err = conn.commit().await.expect_err("commit without begin");
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert!(conn.rollback().await.is_err());
    assert_eq!(conn.state(), LeaseState::Idle);

    conn.begin().await.expect("begin");
    let err = conn.begin().await.expect_err("nested begin");
    assert!(matches!(
        err,
        StorageError::InvalidState {
            state: "in transaction",
            ..
        }
    ));
    assert!(conn.in_transaction());

    conn.rollback().await.expect("rollback");
    assert_eq!(conn.state(), LeaseState::Idle);
    conn.release().await.expect("release");
}

#[tokio::test]
async fn failed_commit_discards_connection_but_keeps_capacity() {
    let (db, pool) = wishlist_pool(2);
    db.set_fail_commits(true);

    let mut conn = pool.acquire().await.expect("lease");
    conn.begin().await.expect("begin");
    conn.run(
        "INSERT INTO wishlists (user_id, name) VALUES (?, ?)",
        &params![9_i64, "doomed"],
    )
    .await
    .expect("insert");
    let err = conn.commit().await.expect_err("commit refused");
    assert!(matches!(
        err,
        StorageError::Transaction {
            op: TransactionOp::Commit,
            ..
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Transaction);
    conn.release().await.expect("release");

    assert_eq!(db.row_count("wishlists"), Some(0));
    assert_eq!(db.stats().open(), 0);
    let stats = pool.stats();
    assert_eq!(stats.size, 0);
    assert_eq!(stats.available, 2);

    db.set_fail_commits(false);
    assert_eq!(count(&pool, "wishlists").await, 0);
}

#[tokio::test]
async fn autocommit_statements_outside_transaction_are_visible() {
    let (_db, pool) = wishlist_pool(2);
    let mut conn = pool.acquire().await.expect("lease");
    conn.run(
        "INSERT INTO wishlists (user_id, name) VALUES (?, ?)",
        &params![2_i64, "later"],
    )
    .await
    .expect("insert");
    assert_eq!(count(&pool, "wishlists").await, 1);
    conn.release().await.expect("release");
}

#[tokio::test]
async fn cancelled_begin_does_not_leave_a_transaction_behind() {
    let (db, pool) = wishlist_pool(1);
    db.set_statement_delay(Duration::from_millis(50));

    let mut conn = pool.acquire().await.expect("lease");
    let cancelled = tokio::time::timeout(Duration::from_millis(10), conn.begin()).await;
    assert!(cancelled.is_err());
    assert_eq!(db.stats().open_transactions, 1);
    drop(conn);

    // 状态未知的连接被关闭，服务端事务随之结束
    assert_eq!(db.stats().open_transactions, 0);
    assert_eq!(db.stats().open(), 0);

    let next = pool.acquire().await.expect("next lease");
    assert_eq!(next.state(), LeaseState::Idle);
    assert_eq!(db.stats().opened, 2);
    next.release().await.expect("release");
    assert_eq!(db.stats().open_transactions, 0);
}

#[tokio::test]
async fn failed_auto_rollback_on_release_discards_connection() {
    let (db, pool) = wishlist_pool(2);

    let mut conn = pool.acquire().await.expect("lease");
    conn.begin().await.expect("begin");
    conn.run(
        "INSERT INTO wishlists (user_id, name) VALUES (?, ?)",
        &params![4_i64, "abandoned"],
    )
    .await
    .expect("insert");
    db.set_fail_rollbacks(true);

    let err = conn.release().await.expect_err("rollback refused");
    assert!(matches!(
        err,
        StorageError::Transaction {
            op: TransactionOp::Rollback,
            ..
        }
    ));
    assert_eq!(db.stats().open(), 0);
    assert_eq!(db.stats().open_transactions, 0);
    let stats = pool.stats();
    assert_eq!(stats.size, 0);
    assert_eq!(stats.available, 2);

    db.set_fail_rollbacks(false);
    assert_eq!(count(&pool, "wishlists").await, 0);
}

#[tokio::test]
async fn failed_rollback_after_drop_discards_connection() {
    let (db, pool) = wishlist_pool(2);
    db.set_fail_rollbacks(true);

    let err = add_wishlist_then_fail(&pool)
        .await
        .expect_err("second insert fails");
    assert_eq!(err.kind(), ErrorKind::Query);

    wait_for(|| {
        let stats = pool.stats();
        stats.available == 2 && stats.size == 0
    })
    .await;
    assert_eq!(db.stats().open(), 0);
    assert_eq!(db.stats().open_transactions, 0);
    assert_eq!(db.row_count("wishlists"), Some(0));
}
