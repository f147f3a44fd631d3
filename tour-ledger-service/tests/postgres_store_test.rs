//! PostgreSQL store integration tests.
//!
//! Run with: TEST_DATABASE_URL=postgres://... cargo test -p tour-ledger-service -- --ignored

mod common;

use chrono::NaiveDate;
use common::{agent, finance};
use rust_decimal::Decimal;
use serial_test::serial;
use service_core::error::AppError;
use std::sync::Arc;
use tour_ledger_service::ledger::{
    reconciler, AttachmentLedgerBinder, AttachmentLedgerUnbinder, AttachmentRemoval,
    AttachmentUpload, ConfirmationCodeAllocator, SalaryProfiles, ScheduleReconciler,
};
use tour_ledger_service::models::{AttachmentType, Frequency, Period, SalaryProfileInput};
use tour_ledger_service::services::{LedgerStore, LocalBlobStore, PgLedgerStore};
use uuid::Uuid;

async fn connect() -> Arc<PgLedgerStore> {
    common::init_tracing();

    let database_url = std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set to run database tests");
    let store = PgLedgerStore::new(&database_url, 2, 1)
        .await
        .expect("Failed to connect to test database");
    store
        .run_migrations()
        .await
        .expect("Failed to run migrations");
    Arc::new(store)
}

async fn insert_booking(store: &PgLedgerStore) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO bookings (id, document) VALUES ($1, $2)")
        .bind(id)
        .bind(serde_json::json!({ "guest": "Integration party" }))
        .execute(store.pool())
        .await
        .expect("Failed to insert booking");
    id
}

async fn blobs() -> Arc<LocalBlobStore> {
    let dir = std::env::temp_dir().join(format!("tour-ledger-test-{}", Uuid::new_v4()));
    Arc::new(LocalBlobStore::new(dir).await.unwrap())
}

#[tokio::test]
#[ignore] // Requires database
#[serial]
async fn bind_and_unbind_round_trip_through_postgres() {
    let store = connect().await;
    let blobs = blobs().await;
    let booking_id = insert_booking(&store).await;

    let binder = AttachmentLedgerBinder::new(
        store.clone(),
        blobs.clone(),
        "GEL",
        common::ledger_config().allowed_currencies,
    );
    let bound = binder
        .bind(
            &agent(),
            AttachmentUpload {
                booking_id,
                file_name: "mestia-lodge.pdf".to_string(),
                custom_name: None,
                data: b"%PDF-1.7".to_vec(),
                attachment_type: AttachmentType::Invoice,
                amount: Some(Decimal::new(42050, 2)),
                original_currency: None,
                original_amount: None,
                context: Some("hotel".to_string()),
            },
        )
        .await
        .unwrap();

    let index = store.get_invoice_amounts(booking_id).await.unwrap().unwrap();
    assert_eq!(
        index.get(bound.attachment.id).map(|e| e.amount),
        Some(Decimal::new(42050, 2))
    );
    let guest: (serde_json::Value,) =
        sqlx::query_as("SELECT document -> 'guest' FROM bookings WHERE id = $1")
            .bind(booking_id)
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert_eq!(guest.0, "Integration party");

    let unbinder = AttachmentLedgerUnbinder::new(store.clone(), blobs.clone());
    let report = unbinder
        .unbind(
            &agent(),
            AttachmentRemoval {
                attachment_id: bound.attachment.id,
                booking_id,
                file_path: bound.attachment.file_path.clone(),
                attachment_type: AttachmentType::Invoice,
                file_name: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(report.expenses_deleted, 1);
    assert_eq!(report.transactions_deleted, 1);
    assert!(report.index_entry_removed);
    assert!(report.blob_removed);
    assert!(store.list_attachments(booking_id).await.unwrap().is_empty());
    assert!(store
        .get_invoice_amounts(booking_id)
        .await
        .unwrap()
        .unwrap()
        .is_empty());
}

#[tokio::test]
#[ignore] // Requires database
#[serial]
async fn salary_occurrence_index_skips_duplicate_inserts() {
    let store = connect().await;
    let profiles = SalaryProfiles::new(
        store.clone(),
        common::ledger_config().allowed_currencies,
        common::salary_config().manager_roles,
    );
    let profile = profiles
        .upsert(
            &finance(),
            SalaryProfileInput {
                name: format!("Guide {}", Uuid::new_v4()),
                amount: Decimal::from(1200),
                currency: "GEL".to_string(),
                frequency: Frequency::Monthly,
                due_day: Some(31),
                due_weekday: None,
            },
        )
        .await
        .unwrap();
    let february = Period::parse_month("2027-02").unwrap();

    let inserts = reconciler::plan(february, &[profile.clone()], &[]).inserts;
    let first = store.insert_transactions(&inserts).await.unwrap();
    let second = store.insert_transactions(&inserts).await.unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(first[0].date, NaiveDate::from_ymd_opt(2027, 2, 28).unwrap());
    assert!(second.is_empty());

    let report = ScheduleReconciler::new(store.clone())
        .reconcile(february, &[profile])
        .await
        .unwrap();
    assert_eq!(report.inserted, 0);
    assert_eq!(report.unchanged, 1);
}

#[tokio::test]
#[ignore] // Requires database
#[serial]
async fn confirmation_codes_are_unique_below_z() {
    let store = connect().await;
    let first = insert_booking(&store).await;
    let second = insert_booking(&store).await;
    // Random code so repeated runs against one database never collide.
    let code = format!("A{}", &Uuid::new_v4().simple().to_string()[..8]);

    store
        .assign_confirmation_code(first, "991299", &code)
        .await
        .unwrap();
    let err = store
        .assign_confirmation_code(second, "991299", &code)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    store
        .assign_confirmation_code(first, "991299", "Z991299")
        .await
        .unwrap();
    store
        .assign_confirmation_code(second, "991299", "Z991299")
        .await
        .unwrap();

    let allocator = ConfirmationCodeAllocator::new(store.clone());
    let arrival = NaiveDate::from_ymd_opt(2099, 12, 30).unwrap();
    let third = insert_booking(&store).await;
    let assigned = allocator.assign(third, arrival).await.unwrap();
    assert!(assigned.ends_with("301299"));
}
