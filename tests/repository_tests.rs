mod common;

use ledger_engine::models::{Account, AccountStatus, AuditLog, Currency, EntryType, LedgerEntry, Money, Transaction, TransactionStatus, TransactionType};
use ledger_engine::repositories::{AccountRepository, AuditRepository, LedgerRepository, TransactionRepository};
use rust_decimal_macros::dec;
use uuid::Uuid;

#[tokio::test]
async fn test_account_repository_crud() {
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let repo = AccountRepository::new(pool.clone());
    let user_id = Uuid::new_v4();

    let account = Account::new(user_id, Currency::USD, Some(Money::new(dec!(1000), Currency::USD).unwrap())).unwrap();
    let created = repo.create(&account).await.expect("create should succeed");
    assert_eq!(created.user_id, user_id);
    assert_eq!(created.status, AccountStatus::Active);
    assert_eq!(created.balance, dec!(1000));
    assert_eq!(created.version, 0);

    let found = repo.find_by_id(created.id).await.expect("find_by_id should succeed").expect("account should exist");
    assert_eq!(found.id, created.id);

    let listed = repo.list_by_user(user_id, Some(Currency::USD)).await.expect("list_by_user should succeed");
    assert!(listed.iter().any(|a| a.id == created.id));

    let listed_wrong_currency = repo.list_by_user(user_id, Some(Currency::EUR)).await.expect("list_by_user should succeed");
    assert!(listed_wrong_currency.is_empty());

    let suspended = repo
        .update_status(created.id, AccountStatus::Suspended)
        .await
        .expect("update_status should succeed")
        .expect("account should exist");
    assert_eq!(suspended.status, AccountStatus::Suspended);

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_account_repository_find_for_update_locks_row() {
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let repo = AccountRepository::new(pool.clone());
    let account = Account::new(Uuid::new_v4(), Currency::USD, Some(Money::new(dec!(500), Currency::USD).unwrap())).unwrap();
    let created = repo.create(&account).await.expect("create should succeed");

    let mut tx = pool.begin().await.expect("begin should succeed");
    let locked = repo
        .find_for_update(&mut tx, created.id)
        .await
        .expect("find_for_update should succeed")
        .expect("account should exist");
    assert_eq!(locked.id, created.id);

    let updated = repo
        .update_balance(&mut tx, created.id, dec!(400), locked.version)
        .await
        .expect("update_balance should succeed");
    assert_eq!(updated.balance, dec!(400));
    assert_eq!(updated.version, locked.version + 1);
    tx.commit().await.expect("commit should succeed");

    let after = repo.find_by_id(created.id).await.expect("find_by_id should succeed").expect("account should exist");
    assert_eq!(after.balance, dec!(400));

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_account_repository_update_balance_rejects_stale_version() {
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let repo = AccountRepository::new(pool.clone());
    let account = Account::new(Uuid::new_v4(), Currency::USD, Some(Money::new(dec!(500), Currency::USD).unwrap())).unwrap();
    let created = repo.create(&account).await.expect("create should succeed");

    let mut tx = pool.begin().await.expect("begin should succeed");
    let result = repo.update_balance(&mut tx, created.id, dec!(400), created.version + 1).await;
    assert!(matches!(result, Err(ledger_engine::error::AppError::ConcurrentModification(_))));

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_audit_repository_records_account_and_transaction_rows() {
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let account_repo = AccountRepository::new(pool.clone());
    let audit_repo = AuditRepository::new(pool.clone());

    let account = Account::new(Uuid::new_v4(), Currency::USD, None).unwrap();
    let created = account_repo.create(&account).await.expect("create should succeed");

    let mut tx = pool.begin().await.expect("begin should succeed");
    let log = AuditLog::new(None, Some(created.id), "ACCOUNT_CREATED", None, Some(dec!(0)), None);
    audit_repo.create(&mut tx, &log).await.expect("create should succeed");
    tx.commit().await.expect("commit should succeed");

    let entries = audit_repo.find_by_account(created.id, 10).await.expect("find_by_account should succeed");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "ACCOUNT_CREATED");

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_ledger_repository_journal_is_balanced() {
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let account_repo = AccountRepository::new(pool.clone());
    let tx_repo = TransactionRepository::new(pool.clone());
    let ledger_repo = LedgerRepository::new(pool.clone());

    let source = account_repo
        .create(&Account::new(Uuid::new_v4(), Currency::USD, Some(Money::new(dec!(1000), Currency::USD).unwrap())).unwrap())
        .await
        .expect("create should succeed");
    let dest = account_repo
        .create(&Account::new(Uuid::new_v4(), Currency::USD, None).unwrap())
        .await
        .expect("create should succeed");

    let transaction = Transaction::new_transfer(
        source.id,
        dest.id,
        dec!(100),
        Currency::USD,
        format!("idem-{}", Uuid::new_v4()),
        None,
        None,
    );
    let mut tx = pool.begin().await.expect("begin should succeed");
    let created = tx_repo.create_pending(&mut tx, &transaction).await.expect("create_pending should succeed");

    let debit = LedgerEntry::debit(created.id, source.id, dec!(100), Currency::USD);
    let credit = LedgerEntry::credit(created.id, dest.id, dec!(100), Currency::USD);
    let (debit_row, credit_row) = ledger_repo.create_pair(&mut tx, &debit, &credit).await.expect("create_pair should succeed");
    assert_eq!(debit_row.entry_type, EntryType::Debit);
    assert_eq!(credit_row.entry_type, EntryType::Credit);

    tx_repo.complete(&mut tx, created.id).await.expect("complete should succeed");
    tx.commit().await.expect("commit should succeed");

    let entries = ledger_repo.find_by_transaction(created.id).await.expect("find_by_transaction should succeed");
    assert_eq!(entries.len(), 2);

    let balanced = ledger_repo.verify_transaction_balance(created.id).await.expect("verify_transaction_balance should succeed");
    assert!(balanced);

    let by_account = ledger_repo.find_by_account(source.id, 10, 0).await.expect("find_by_account should succeed");
    assert_eq!(by_account.len(), 1);
    assert_eq!(by_account[0].entry_type, EntryType::Debit);

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_transaction_repository_create_find_and_complete() {
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let account_repo = AccountRepository::new(pool.clone());
    let tx_repo = TransactionRepository::new(pool.clone());

    let source = account_repo
        .create(&Account::new(Uuid::new_v4(), Currency::USD, Some(Money::new(dec!(1000), Currency::USD).unwrap())).unwrap())
        .await
        .expect("create should succeed");
    let dest = account_repo
        .create(&Account::new(Uuid::new_v4(), Currency::USD, None).unwrap())
        .await
        .expect("create should succeed");

    let idempotency_key = format!("idem-{}", Uuid::new_v4());
    let transaction = Transaction::new_transfer(source.id, dest.id, dec!(100), Currency::USD, idempotency_key.clone(), None, None);

    let mut tx = pool.begin().await.expect("begin should succeed");
    let created = tx_repo.create_pending(&mut tx, &transaction).await.expect("create_pending should succeed");
    assert_eq!(created.status, TransactionStatus::Pending);
    tx.commit().await.expect("commit should succeed");

    let found = tx_repo.find_by_id(created.id).await.expect("find_by_id should succeed").expect("transaction should exist");
    assert_eq!(found.id, created.id);

    let found_by_key = tx_repo
        .find_by_idempotency_key(&idempotency_key)
        .await
        .expect("find_by_idempotency_key should succeed")
        .expect("transaction should exist");
    assert_eq!(found_by_key.id, created.id);

    let mut tx2 = pool.begin().await.expect("begin should succeed");
    let completed = tx_repo.complete(&mut tx2, created.id).await.expect("complete should succeed");
    tx2.commit().await.expect("commit should succeed");
    assert_eq!(completed.status, TransactionStatus::Completed);
    assert!(completed.completed_at.is_some());

    let (page, total) = tx_repo
        .find_by_account(source.id, None, None, 10, 0)
        .await
        .expect("find_by_account should succeed");
    assert_eq!(page.len(), 1);
    assert_eq!(total, 1);

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_transaction_repository_duplicate_idempotency_key_maps_to_duplicate_transaction() {
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let account_repo = AccountRepository::new(pool.clone());
    let tx_repo = TransactionRepository::new(pool.clone());

    let source = account_repo.create(&Account::new(Uuid::new_v4(), Currency::USD, None).unwrap()).await.expect("create should succeed");
    let dest = account_repo.create(&Account::new(Uuid::new_v4(), Currency::USD, None).unwrap()).await.expect("create should succeed");

    let idempotency_key = format!("idem-{}", Uuid::new_v4());
    let first = Transaction::new_transfer(source.id, dest.id, dec!(100), Currency::USD, idempotency_key.clone(), None, None);

    let mut tx = pool.begin().await.expect("begin should succeed");
    let created = tx_repo.create_pending(&mut tx, &first).await.expect("create_pending should succeed");
    tx.commit().await.expect("commit should succeed");

    let second = Transaction::new_transfer(source.id, dest.id, dec!(200), Currency::USD, idempotency_key.clone(), None, None);
    let mut tx2 = pool.begin().await.expect("begin should succeed");
    let result = tx_repo.create_pending(&mut tx2, &second).await;

    match result {
        Err(ledger_engine::error::AppError::DuplicateTransaction { original_transaction_id }) => {
            assert_eq!(original_transaction_id, created.id);
        }
        other => panic!("expected DuplicateTransaction, got {other:?}"),
    }

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_transaction_repository_retag_and_mark_reversed() {
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let account_repo = AccountRepository::new(pool.clone());
    let tx_repo = TransactionRepository::new(pool.clone());

    let source = account_repo.create(&Account::new(Uuid::new_v4(), Currency::USD, None).unwrap()).await.expect("create should succeed");
    let dest = account_repo.create(&Account::new(Uuid::new_v4(), Currency::USD, None).unwrap()).await.expect("create should succeed");

    let transaction = Transaction::new_transfer(source.id, dest.id, dec!(50), Currency::USD, format!("idem-{}", Uuid::new_v4()), None, None);
    let mut tx = pool.begin().await.expect("begin should succeed");
    let created = tx_repo.create_pending(&mut tx, &transaction).await.expect("create_pending should succeed");
    tx_repo.complete(&mut tx, created.id).await.expect("complete should succeed");
    tx.commit().await.expect("commit should succeed");

    let retagged = tx_repo.retag_type(created.id, TransactionType::Reversal).await.expect("retag_type should succeed");
    assert_eq!(retagged.transaction_type, TransactionType::Reversal);

    let mut tx2 = pool.begin().await.expect("begin should succeed");
    let reversed = tx_repo.mark_reversed(&mut tx2, created.id).await.expect("mark_reversed should succeed");
    tx2.commit().await.expect("commit should succeed");
    assert_eq!(reversed.status, TransactionStatus::Reversed);

    let mut tx3 = pool.begin().await.expect("begin should succeed");
    let result = tx_repo.mark_reversed(&mut tx3, created.id).await;
    assert!(matches!(result, Err(ledger_engine::error::AppError::Validation(_))));

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_transaction_repository_count_by_status() {
    let pool = common::setup_test_db().await;
    common::cleanup_test_data(&pool).await;

    let account_repo = AccountRepository::new(pool.clone());
    let tx_repo = TransactionRepository::new(pool.clone());

    let source = account_repo.create(&Account::new(Uuid::new_v4(), Currency::USD, None).unwrap()).await.expect("create should succeed");
    let dest = account_repo.create(&Account::new(Uuid::new_v4(), Currency::USD, None).unwrap()).await.expect("create should succeed");

    for _ in 0..3 {
        let transaction = Transaction::new_transfer(source.id, dest.id, dec!(10), Currency::USD, format!("idem-{}", Uuid::new_v4()), None, None);
        let mut tx = pool.begin().await.expect("begin should succeed");
        tx_repo.create_pending(&mut tx, &transaction).await.expect("create_pending should succeed");
        tx.commit().await.expect("commit should succeed");
    }

    let pending_count = tx_repo.count_by_status(TransactionStatus::Pending).await.expect("count_by_status should succeed");
    assert_eq!(pending_count, 3);

    let completed_count = tx_repo.count_by_status(TransactionStatus::Completed).await.expect("count_by_status should succeed");
    assert_eq!(completed_count, 0);

    common::cleanup_test_data(&pool).await;
}
