mod common;

use chrono::{Duration, Utc};
use serde_json::json;

use common::*;
use meridian_api::services::lifecycle_service::LifecycleService;
use meridian_api::services::order_service::{OrderService, PlaceOrderInput};
use meridian_api::services::topup_service::{CreateTopUpInput, TopUpService};
use meridian_api::services::webhook_service::{WebhookOutcome, WebhookService, AMOUNT_MISMATCH_REASON};
use meridian_api::ServiceError;
use meridian_core::promo::PromoRejection;
use meridian_core::webhook::IgnoreReason;
use meridian_core::{
    Caller, CoreError, PaymentMethod, TopUpRequest, TopUpRequestId, TopUpStatus, TransactionType,
    UserId,
};

async fn create_topup(app: &TestApp, user: &str, amount: i64, promo: Option<&str>) -> TopUpRequest {
    TopUpService::new(app.state.clone())
        .create(
            &Caller::customer(user),
            CreateTopUpInput {
                amount,
                promo_code: promo.map(str::to_string),
            },
        )
        .await
        .unwrap()
        .request
}

async fn deliver(app: &TestApp, payload: &serde_json::Value) -> WebhookOutcome {
    let (header, body) = signed(payload);
    WebhookService::new(app.state.clone())
        .handle(Some(&header), &body)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_matching_transfer_credits_base_plus_bonus() {
    let app = test_app().await;
    let db = app.db();
    let promo = seed_promo(db, "WELCOME10", 10, Some(50_000)).await;
    let request = create_topup(&app, "alice", 200_000, Some("  welcome10 ")).await;

    assert_eq!(request.status, TopUpStatus::Pending);
    assert_eq!(request.bonus_amount, 20_000);
    assert_eq!(request.total_amount, 220_000);
    assert_eq!(request.promo_code_id.as_ref(), Some(&promo.id));
    assert!(request.request_code.starts_with("NAP"));
    assert!(request.qr_image_url.contains(&request.request_code));
    assert!(request.qr_image_url.contains("amount=200000"));

    let outcome = deliver(&app, &transfer_payload(&request.request_code, 200_000, "FT001")).await;
    assert_eq!(
        outcome,
        WebhookOutcome::Completed {
            request_code: request.request_code.clone(),
            credited: 220_000,
            balance_after: 220_000,
        }
    );

    let wallet = db.wallets().get_by_user(&UserId::from("alice")).await.unwrap().unwrap();
    assert_eq!(wallet.balance, 220_000);

    let settled = db.topups().get_by_code(&request.request_code).await.unwrap().unwrap();
    assert_eq!(settled.status, TopUpStatus::Completed);
    assert_eq!(settled.bank_transaction_id.as_deref(), Some("FT001"));
    assert_eq!(settled.received_amount, Some(200_000));
    assert!(settled.completed_at.is_some());

    let history = db.wallets().list_transactions(&wallet.id, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].transaction_type, TransactionType::Topup);
    assert_eq!(settled.wallet_transaction_id.as_deref(), Some(history[0].id.as_str()));
    assert_eq!(history[0].metadata.request_code.as_deref(), Some(request.request_code.as_str()));

    let promo_after = db.promos().get(&promo.id).await.unwrap().unwrap();
    assert_eq!(promo_after.usage_count, 1);
    assert!(db.promos().has_user_used(&promo.id, &UserId::from("alice")).await.unwrap());

    let note = app.notifier.find("wallet.topup_completed").unwrap();
    assert_eq!(note.data["newBalance"], 220_000);
}

#[tokio::test]
async fn test_replayed_delivery_credits_once() {
    let app = test_app().await;
    let db = app.db();
    let request = create_topup(&app, "alice", 50_000, None).await;
    let payload = transfer_payload(&request.request_code, 50_000, "FT002");

    let first = deliver(&app, &payload).await;
    assert!(matches!(first, WebhookOutcome::Completed { credited: 50_000, .. }));

    let second = deliver(&app, &payload).await;
    assert_eq!(
        second,
        WebhookOutcome::NoPendingRequest {
            request_code: request.request_code.clone()
        }
    );

    let wallet = db.wallets().get_by_user(&UserId::from("alice")).await.unwrap().unwrap();
    assert_eq!(wallet.balance, 50_000);
    assert_eq!(db.wallets().list_transactions(&wallet.id, 10).await.unwrap().len(), 1);
    assert_eq!(app.notifier.events(), vec!["wallet.topup_completed"]);
}

#[tokio::test]
async fn test_wrong_amount_fails_request_and_leaves_wallet_alone() {
    let app = test_app().await;
    let db = app.db();
    let request = create_topup(&app, "alice", 50_000, None).await;

    let outcome = deliver(&app, &transfer_payload(&request.request_code, 40_000, "FT003")).await;
    assert_eq!(
        outcome,
        WebhookOutcome::AmountMismatch {
            request_code: request.request_code.clone(),
            expected: 50_000,
            received: 40_000,
        }
    );

    let failed = db.topups().get_by_code(&request.request_code).await.unwrap().unwrap();
    assert_eq!(failed.status, TopUpStatus::Failed);
    assert_eq!(failed.failure_reason.as_deref(), Some(AMOUNT_MISMATCH_REASON));
    assert_eq!(failed.received_amount, Some(40_000));
    assert_eq!(failed.bank_transaction_id.as_deref(), Some("FT003"));
    assert!(failed.wallet_transaction_id.is_none());

    assert!(db.wallets().get_by_user(&UserId::from("alice")).await.unwrap().is_none());

    let note = app.notifier.find("wallet.topup_failed").unwrap();
    assert_eq!(note.data["expectedAmount"], 50_000);
    assert_eq!(note.data["receivedAmount"], 40_000);

    // A correct transfer after the failure does not revive the request
    let retry = deliver(&app, &transfer_payload(&request.request_code, 50_000, "FT004")).await;
    assert!(matches!(retry, WebhookOutcome::NoPendingRequest { .. }));
}

#[tokio::test]
async fn test_bad_signatures_write_nothing() {
    let app = test_app().await;
    let db = app.db();
    let request = create_topup(&app, "alice", 50_000, None).await;
    let service = WebhookService::new(app.state.clone());

    let payload = transfer_payload(&request.request_code, 50_000, "FT005");
    let (header, _) = signed(&payload);

    // Body altered after signing
    let tampered = serde_json::to_vec(&transfer_payload(&request.request_code, 5_000_000, "FT005")).unwrap();
    let err = service.handle(Some(&header), &tampered).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidSignature(_)));

    let body = serde_json::to_vec(&payload).unwrap();
    assert!(service.handle(None, &body).await.is_err());
    assert!(service.handle(Some("t=1,v1=zz"), &body).await.is_err());
    assert!(service.handle(Some(&header), b"not json").await.is_err());

    let forged = meridian_core::webhook::signature_header_value(b"someone-else", "1714558500", &payload).unwrap();
    assert!(service.handle(Some(&forged), &body).await.is_err());

    let untouched = db.topups().get_by_code(&request.request_code).await.unwrap().unwrap();
    assert_eq!(untouched.status, TopUpStatus::Pending);
    assert!(db.wallets().get_by_user(&UserId::from("alice")).await.unwrap().is_none());
    assert!(app.notifier.events().is_empty());
}

#[tokio::test]
async fn test_signature_ignores_key_order() {
    let app = test_app().await;
    let request = create_topup(&app, "alice", 50_000, None).await;
    let payload = transfer_payload(&request.request_code, 50_000, "FT006");
    let (header, _) = signed(&payload);

    // Same document, different key order on the wire
    let reordered = format!(
        r#"{{"data":{{"transactionDate":"2024-05-01 10:15:00","tid":"FT006","amount":50000,"description":"CUSTOMER TRANSFER {} FT24001"}},"error":0}}"#,
        request.request_code
    );
    let outcome = WebhookService::new(app.state.clone())
        .handle(Some(&header), reordered.as_bytes())
        .await
        .unwrap();
    assert!(matches!(outcome, WebhookOutcome::Completed { .. }));
}

#[tokio::test]
async fn test_unrelated_deliveries_are_acknowledged() {
    let app = test_app().await;

    let provider_error = deliver(&app, &json!({ "error": 1, "data": null })).await;
    assert_eq!(provider_error, WebhookOutcome::Ignored(IgnoreReason::ProviderError(1)));

    let no_code = deliver(
        &app,
        &json!({ "error": 0, "data": { "description": "salary may", "amount": 1000, "tid": "X" } }),
    )
    .await;
    assert_eq!(no_code, WebhookOutcome::Ignored(IgnoreReason::NoRequestCode));

    let unknown = deliver(&app, &transfer_payload("NAP000000ZZZ", 50_000, "FT007")).await;
    assert!(matches!(unknown, WebhookOutcome::NoPendingRequest { .. }));

    let bad_amount = deliver(
        &app,
        &json!({ "error": 0, "data": { "description": "NAP123456ABC", "amount": "lots", "tid": "X" } }),
    )
    .await;
    assert!(matches!(bad_amount, WebhookOutcome::Malformed(_)));
}

#[tokio::test]
async fn test_expired_request_still_reconciles() {
    let app = test_app().await;
    let db = app.db();
    let now = Utc::now();
    let stale = TopUpRequest {
        id: TopUpRequestId::generate(),
        user_id: UserId::from("alice"),
        request_code: "NAP424242QRS".to_string(),
        status: TopUpStatus::Pending,
        base_amount: 75_000,
        bonus_amount: 0,
        total_amount: 75_000,
        payment_method: "bank_transfer".to_string(),
        qr_image_url: "https://img.vietqr.io/image/x.png".to_string(),
        bank_transaction_id: None,
        promo_code_id: None,
        wallet_transaction_id: None,
        received_amount: None,
        failure_reason: None,
        expires_at: now - Duration::minutes(5),
        completed_at: None,
        created_at: now - Duration::minutes(20),
        updated_at: now - Duration::minutes(20),
    };
    db.topups().insert(&stale).await.unwrap();

    let topups = TopUpService::new(app.state.clone());
    let view = topups.status(&Caller::customer("alice"), "nap424242qrs").await.unwrap();
    assert_eq!(view.display_status, "EXPIRED");

    let outcome = deliver(&app, &transfer_payload("NAP424242QRS", 75_000, "FT008")).await;
    assert!(matches!(outcome, WebhookOutcome::Completed { credited: 75_000, .. }));

    let view = topups.status(&Caller::customer("alice"), "NAP424242QRS").await.unwrap();
    assert_eq!(view.display_status, "COMPLETED");
}

#[tokio::test]
async fn test_promo_rejections() {
    let app = test_app().await;
    let db = app.db();
    seed_promo(db, "WELCOME10", 10, Some(50_000)).await;
    let topups = TopUpService::new(app.state.clone());
    let alice = Caller::customer("alice");

    let rejection = |err: ServiceError| match err {
        ServiceError::Business(CoreError::PromoRejected(reason)) => reason,
        other => panic!("unexpected error: {:?}", other),
    };

    let err = topups
        .create(&alice, CreateTopUpInput { amount: 200_000, promo_code: Some("NOPE".to_string()) })
        .await
        .unwrap_err();
    assert_eq!(rejection(err), PromoRejection::UnknownCode);

    let err = topups
        .create(&alice, CreateTopUpInput { amount: 50_000, promo_code: Some("WELCOME10".to_string()) })
        .await
        .unwrap_err();
    assert_eq!(rejection(err), PromoRejection::BelowMinimum { min_amount: 100_000 });

    let first = create_topup(&app, "alice", 200_000, Some("WELCOME10")).await;
    deliver(&app, &transfer_payload(&first.request_code, 200_000, "FT009")).await;

    let err = topups
        .create(&alice, CreateTopUpInput { amount: 300_000, promo_code: Some("WELCOME10".to_string()) })
        .await
        .unwrap_err();
    assert_eq!(rejection(err), PromoRejection::AlreadyUsed);

    // Without the promo the same user can still top up
    assert!(topups
        .create(&alice, CreateTopUpInput { amount: 300_000, promo_code: None })
        .await
        .is_ok());
}

#[tokio::test]
async fn test_second_pending_request_with_redeemed_promo_gets_base_only() {
    let app = test_app().await;
    let db = app.db();
    let promo = seed_promo(db, "WELCOME10", 10, Some(50_000)).await;
    let first = create_topup(&app, "alice", 200_000, Some("WELCOME10")).await;
    let second = create_topup(&app, "alice", 100_000, Some("WELCOME10")).await;

    deliver(&app, &transfer_payload(&first.request_code, 200_000, "FT010")).await;
    let outcome = deliver(&app, &transfer_payload(&second.request_code, 100_000, "FT011")).await;
    assert!(matches!(outcome, WebhookOutcome::Completed { credited: 100_000, .. }));

    let wallet = db.wallets().get_by_user(&UserId::from("alice")).await.unwrap().unwrap();
    assert_eq!(wallet.balance, 320_000);
    assert_eq!(db.promos().get(&promo.id).await.unwrap().unwrap().usage_count, 1);
}

#[tokio::test]
async fn test_topup_validation_and_qr_failure() {
    let app = test_app().await;
    let topups = TopUpService::new(app.state.clone());
    let alice = Caller::customer("alice");

    let too_small = topups
        .create(&alice, CreateTopUpInput { amount: 9_999, promo_code: None })
        .await
        .unwrap_err();
    assert!(matches!(too_small, ServiceError::Business(CoreError::Validation(_))));

    let too_big = topups
        .create(&alice, CreateTopUpInput { amount: 50_000_001, promo_code: None })
        .await
        .unwrap_err();
    assert!(matches!(too_big, ServiceError::Business(CoreError::Validation(_))));

    let broken = test_app_without_qr().await;
    let err = TopUpService::new(broken.state.clone())
        .create(&alice, CreateTopUpInput { amount: 50_000, promo_code: None })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Business(CoreError::ExternalService { .. })));
    assert!(broken
        .db()
        .topups()
        .list_for_user(&UserId::from("alice"), 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_topup_status_visibility() {
    let app = test_app().await;
    let request = create_topup(&app, "alice", 50_000, None).await;
    let topups = TopUpService::new(app.state.clone());

    let view = topups.status(&Caller::customer("alice"), &request.request_code).await.unwrap();
    assert_eq!(view.display_status, "PENDING");
    assert!(topups.status(&Caller::admin("ops"), &request.request_code).await.is_ok());

    let err = topups
        .status(&Caller::customer("mallory"), &request.request_code)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Business(CoreError::Forbidden { .. })));

    let listed = topups.list(&Caller::customer("alice")).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_ledger_sum_tracks_balance_across_operations() {
    let app = test_app().await;
    let db = app.db();
    let bob = Caller::customer("bob");

    let request = create_topup(&app, "bob", 500_000, None).await;
    deliver(&app, &transfer_payload(&request.request_code, 500_000, "FT012")).await;
    let wallet = db.wallets().get_by_user(&bob.user_id).await.unwrap().unwrap();
    db.wallets().set_pin(&wallet.id, PIN).await.unwrap();

    let tee = seed_product(db, "TEE", 120_000, Some(100_000), 10).await;
    let address = seed_address(db, "bob").await;
    let orders = OrderService::new(app.state.clone());
    let mut placed = Vec::new();
    for _ in 0..2 {
        let line = add_to_cart(db, "bob", &tee, 1).await;
        let order = orders
            .place_order(
                &bob,
                PlaceOrderInput {
                    selected_cart_item_ids: vec![line.id],
                    shipping_address_id: address.id.clone(),
                    payment_method: PaymentMethod::WalletPay,
                    pin: Some(PIN.to_string()),
                },
            )
            .await
            .unwrap();
        placed.push(order);
    }

    LifecycleService::new(app.state.clone())
        .cancel_order(&bob, &placed[0].id, "Wrong size", false)
        .await
        .unwrap();

    let wallet = db.wallets().get(&wallet.id).await.unwrap().unwrap();
    // 500 000 − 2 × 130 000 + 130 000
    assert_eq!(wallet.balance, 370_000);
    assert_eq!(db.wallets().ledger_sum(&wallet.id).await.unwrap(), wallet.balance);
    assert_eq!(db.wallets().list_transactions(&wallet.id, 10).await.unwrap().len(), 4);
}
