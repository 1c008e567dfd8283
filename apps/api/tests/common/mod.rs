//! Shared fixtures for the integration tests.
//!
//! Every test gets its own database (in memory, or a scratch file when the
//! test needs a real connection pool), a recording notification publisher
//! and the default QR link builder.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use meridian_api::services::notification_service::{NotificationPublisher, PublishError};
use meridian_api::services::qr_service::{QrError, QrGenerator};
use meridian_api::{ApiConfig, AppState};
use meridian_core::webhook::signature_header_value;
use meridian_core::{
    Address, CartItem, DiscountType, LedgerDraft, LedgerMetadata, Money, Notification, Product,
    ProductId, PromoCode, PromoCodeId, TransactionType, UserId, Wallet,
};
use meridian_db::{ledger, Database, DbConfig};

pub const WEBHOOK_SECRET: &str = "test-webhook-secret";
pub const JWT_SECRET: &str = "test-jwt-secret";
pub const PIN: &str = "123456";
pub const SHIPPING_FEE: i64 = 30_000;

// =============================================================================
// Collaborators
// =============================================================================

/// Keeps every published notification; optionally fails every publish.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingPublisher {
    pub fn failing() -> Self {
        RecordingPublisher {
            published: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.published
            .lock()
            .map(|list| list.iter().map(|n| n.event.clone()).collect())
            .unwrap_or_default()
    }

    pub fn find(&self, event: &str) -> Option<Notification> {
        self.published
            .lock()
            .ok()
            .and_then(|list| list.iter().find(|n| n.event == event).cloned())
    }
}

#[async_trait]
impl NotificationPublisher for RecordingPublisher {
    async fn publish(&self, notification: Notification) -> Result<(), PublishError> {
        if self.fail {
            return Err(PublishError::Rejected("publisher offline".to_string()));
        }
        self.published.lock().unwrap().push(notification);
        Ok(())
    }
}

pub struct UnavailableQr;

#[async_trait]
impl QrGenerator for UnavailableQr {
    async fn generate(&self, _amount: i64, _note: &str) -> Result<String, QrError> {
        Err(QrError::Unavailable("503 from provider".to_string()))
    }
}

// =============================================================================
// App
// =============================================================================

pub struct TestApp {
    pub state: Arc<AppState>,
    pub notifier: Arc<RecordingPublisher>,
    store: Option<PathBuf>,
}

impl TestApp {
    pub fn db(&self) -> &Database {
        &self.state.db
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(path) = &self.store {
            for suffix in ["", "-wal", "-shm"] {
                let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
            }
        }
    }
}

pub fn test_config() -> ApiConfig {
    ApiConfig::from_lookup(|key| match key {
        "WEBHOOK_SECRET" => Some(WEBHOOK_SECRET.to_string()),
        "JWT_SECRET" => Some(JWT_SECRET.to_string()),
        "SHIPPING_FEE" => Some(SHIPPING_FEE.to_string()),
        "QR_BANK_CODE" => Some("MB".to_string()),
        "QR_ACCOUNT_NUMBER" => Some("0123456789".to_string()),
        _ => None,
    })
    .unwrap()
}

async fn build(notifier: Arc<RecordingPublisher>, qr: Option<Arc<dyn QrGenerator>>) -> TestApp {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    assemble(db, notifier, qr, None)
}

fn assemble(
    db: Database,
    notifier: Arc<RecordingPublisher>,
    qr: Option<Arc<dyn QrGenerator>>,
    store: Option<PathBuf>,
) -> TestApp {
    let mut state = AppState::new(db, test_config())
        .unwrap()
        .with_notifier(notifier.clone());
    if let Some(qr) = qr {
        state = state.with_qr(qr);
    }
    TestApp {
        state: Arc::new(state),
        notifier,
        store,
    }
}

pub async fn test_app() -> TestApp {
    build(Arc::new(RecordingPublisher::default()), None).await
}

/// A file-backed store in the temp dir with a real `max_connections` pool.
/// The files are removed when the app is dropped.
pub async fn test_app_on_disk(max_connections: u32) -> TestApp {
    let path = std::env::temp_dir().join(format!("meridian-it-{}.db", uuid::Uuid::new_v4()));
    let db = Database::new(DbConfig::new(path.clone()).max_connections(max_connections))
        .await
        .unwrap();
    assemble(db, Arc::new(RecordingPublisher::default()), None, Some(path))
}

pub async fn test_app_with_failing_notifier() -> TestApp {
    build(Arc::new(RecordingPublisher::failing()), None).await
}

pub async fn test_app_without_qr() -> TestApp {
    build(Arc::new(RecordingPublisher::default()), Some(Arc::new(UnavailableQr))).await
}

// =============================================================================
// Seeding
// =============================================================================

pub async fn seed_product(
    db: &Database,
    sku: &str,
    price: i64,
    sale_price: Option<i64>,
    stock: i64,
) -> Product {
    let now = Utc::now();
    let product = Product {
        id: ProductId::generate(),
        sku: sku.to_string(),
        name: format!("Product {}", sku),
        image_url: Some(format!("https://cdn.meridian.local/{}.jpg", sku)),
        price,
        sale_price,
        stock,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    db.products().insert(&product).await.unwrap();
    product
}

pub async fn add_to_cart(db: &Database, user: &str, product: &Product, quantity: i64) -> CartItem {
    db.carts()
        .add(&UserId::from(user), &product.id, quantity)
        .await
        .unwrap()
}

pub async fn seed_address(db: &Database, user: &str) -> Address {
    db.addresses()
        .insert(Address {
            id: String::new(),
            user_id: UserId::from(user),
            full_name: "Nguyen Van A".to_string(),
            phone: "0901234567".to_string(),
            street: "12 Ly Thuong Kiet".to_string(),
            ward: "Ward 7".to_string(),
            district: "District 10".to_string(),
            city: "Ho Chi Minh City".to_string(),
        })
        .await
        .unwrap()
}

/// A wallet funded through the ledger so balance and ledger agree.
pub async fn seed_wallet(db: &Database, user: &str, balance: i64, pin: Option<&str>) -> Wallet {
    let wallet = db.wallets().create(&UserId::from(user)).await.unwrap();
    if let Some(pin) = pin {
        db.wallets().set_pin(&wallet.id, pin).await.unwrap();
    }
    if balance > 0 {
        let mut tx = db.begin().await.unwrap();
        ledger::credit(
            &mut tx,
            &wallet.id,
            Money::from_vnd(balance),
            LedgerDraft {
                transaction_type: TransactionType::Topup,
                description: "Opening balance".to_string(),
                metadata: LedgerMetadata::default(),
            },
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
    }
    db.wallets().get(&wallet.id).await.unwrap().unwrap()
}

pub async fn seed_promo(db: &Database, code: &str, percent: i64, max_bonus: Option<i64>) -> PromoCode {
    let promo = PromoCode {
        id: PromoCodeId::generate(),
        code: code.to_string(),
        discount_type: DiscountType::Percentage,
        discount_value: percent,
        max_bonus,
        min_amount: 100_000,
        usage_limit: Some(100),
        usage_count: 0,
        is_active: true,
        starts_at: None,
        expires_at: None,
    };
    db.promos().insert(&promo).await.unwrap();
    promo
}

// =============================================================================
// Webhook deliveries
// =============================================================================

pub fn transfer_payload(request_code: &str, amount: i64, tid: &str) -> Value {
    json!({
        "error": 0,
        "data": {
            "description": format!("CUSTOMER TRANSFER {} FT24001", request_code),
            "amount": amount,
            "tid": tid,
            "transactionDate": "2024-05-01 10:15:00"
        }
    })
}

/// Raw body and a valid signature header for `payload`.
pub fn signed(payload: &Value) -> (String, Vec<u8>) {
    let header = signature_header_value(WEBHOOK_SECRET.as_bytes(), "1714558500", payload).unwrap();
    (header, serde_json::to_vec(payload).unwrap())
}
