mod common;

use common::*;
use meridian_api::services::lifecycle_service::{AdvanceStatusInput, LifecycleService};
use meridian_api::services::order_service::{OrderService, PlaceOrderInput};
use meridian_api::ServiceError;
use meridian_core::{
    Caller, CoreError, Order, OrderStatus, PaymentMethod, PaymentStatus, TransactionType, UserId,
};

fn advance(status: &str) -> AdvanceStatusInput {
    AdvanceStatusInput {
        status: status.to_string(),
        tracking_number: None,
    }
}

/// Places a two-line order for `user` and returns it.
async fn place(app: &TestApp, user: &str, method: PaymentMethod) -> Order {
    let db = app.db();
    let tee = seed_product(db, &format!("TEE-{}", user), 100_000, None, 10).await;
    let cap = seed_product(db, &format!("CAP-{}", user), 50_000, Some(40_000), 10).await;
    let lines = vec![
        add_to_cart(db, user, &tee, 2).await.id,
        add_to_cart(db, user, &cap, 3).await.id,
    ];
    let address = seed_address(db, user).await;

    OrderService::new(app.state.clone())
        .place_order(
            &Caller::customer(user),
            PlaceOrderInput {
                selected_cart_item_ids: lines,
                shipping_address_id: address.id,
                payment_method: method,
                pin: Some(PIN.to_string()),
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_cancel_paid_wallet_order_in_processing_refunds_and_restocks() {
    let app = test_app().await;
    let db = app.db();
    let wallet = seed_wallet(db, "bob", 1_000_000, Some(PIN)).await;
    let order = place(&app, "bob", PaymentMethod::WalletPay).await;
    // 2 × 100 000 + 3 × 40 000 + 30 000
    assert_eq!(order.totals.grand_total, 350_000);

    let lifecycle = LifecycleService::new(app.state.clone());
    let admin = Caller::admin("ops");
    lifecycle
        .advance_status(&admin, &order.id, advance("processing"))
        .await
        .unwrap();

    let cancelled = lifecycle
        .cancel_order(&Caller::customer("bob"), &order.id, "Changed my mind", false)
        .await
        .unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.payment.status, PaymentStatus::Refunded);
    let cancellation = cancelled.cancellation.unwrap();
    assert_eq!(cancellation.reason, "Changed my mind");
    assert_eq!(cancellation.cancelled_by, UserId::from("bob"));

    let after = db.wallets().get(&wallet.id).await.unwrap().unwrap();
    assert_eq!(after.balance, 1_000_000);

    let history = db.wallets().list_transactions(&wallet.id, 10).await.unwrap();
    let refunds: Vec<_> = history
        .iter()
        .filter(|e| e.transaction_type == TransactionType::Refund)
        .collect();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].amount, 350_000);
    assert_eq!(refunds[0].metadata.order_id.as_ref(), Some(&order.id));

    for item in &order.items {
        assert_eq!(db.products().stock_of(&item.product_id).await.unwrap(), Some(10));
    }

    assert_eq!(db.wallets().ledger_sum(&wallet.id).await.unwrap(), after.balance);
    assert!(app.notifier.find("order.cancelled").is_some());
    let refunded = app.notifier.find("wallet.refunded").unwrap();
    assert_eq!(refunded.data["amount"], 350_000);
}

#[tokio::test]
async fn test_cancel_cod_order_restocks_without_ledger() {
    let app = test_app().await;
    let db = app.db();
    let order = place(&app, "alice", PaymentMethod::Cod).await;

    let cancelled = LifecycleService::new(app.state.clone())
        .cancel_order(&Caller::customer("alice"), &order.id, "Ordered twice", false)
        .await
        .unwrap();

    assert_eq!(cancelled.payment.status, PaymentStatus::Pending);
    assert!(db.wallets().get_by_user(&UserId::from("alice")).await.unwrap().is_none());
    for item in &order.items {
        assert_eq!(db.products().stock_of(&item.product_id).await.unwrap(), Some(10));
    }
    assert!(app.notifier.find("wallet.refunded").is_none());
}

#[tokio::test]
async fn test_cancel_is_refused_once_shipped() {
    let app = test_app().await;
    let db = app.db();
    let order = place(&app, "alice", PaymentMethod::Cod).await;
    let lifecycle = LifecycleService::new(app.state.clone());
    let admin = Caller::admin("ops");

    lifecycle.advance_status(&admin, &order.id, advance("processing")).await.unwrap();
    lifecycle.advance_status(&admin, &order.id, advance("shipped")).await.unwrap();

    let err = lifecycle
        .cancel_order(&Caller::customer("alice"), &order.id, "Too slow", false)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Business(CoreError::InvalidState { .. })));

    let stored = db.orders().get(&order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Shipped);
    assert!(stored.cancellation.is_none());
    for item in &order.items {
        assert_eq!(
            db.products().stock_of(&item.product_id).await.unwrap(),
            Some(10 - item.quantity)
        );
    }
}

#[tokio::test]
async fn test_cancel_authorization_and_reason() {
    let app = test_app().await;
    let order = place(&app, "alice", PaymentMethod::Cod).await;
    let lifecycle = LifecycleService::new(app.state.clone());

    let err = lifecycle
        .cancel_order(&Caller::customer("mallory"), &order.id, "Because", false)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Business(CoreError::Forbidden { .. })));

    // The admin route is closed to customers, even for their own orders
    let err = lifecycle
        .cancel_order(&Caller::customer("alice"), &order.id, "Because", true)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Business(CoreError::Forbidden { .. })));

    let err = lifecycle
        .cancel_order(&Caller::customer("alice"), &order.id, "   ", false)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Business(CoreError::Validation(_))));

    let cancelled = lifecycle
        .cancel_order(&Caller::admin("ops"), &order.id, "Fraud check failed", true)
        .await
        .unwrap();
    assert_eq!(
        cancelled.cancellation.unwrap().cancelled_by,
        UserId::from("ops")
    );
    let note = app.notifier.find("order.cancelled").unwrap();
    assert_eq!(note.recipient, UserId::from("alice"));
    assert_eq!(note.actor, Some(UserId::from("ops")));
}

#[tokio::test]
async fn test_second_cancel_is_a_conflict_and_refunds_once() {
    let app = test_app().await;
    let db = app.db();
    let wallet = seed_wallet(db, "bob", 1_000_000, Some(PIN)).await;
    let order = place(&app, "bob", PaymentMethod::WalletPay).await;
    let lifecycle = LifecycleService::new(app.state.clone());
    let bob = Caller::customer("bob");

    lifecycle.cancel_order(&bob, &order.id, "First", false).await.unwrap();
    let err = lifecycle
        .cancel_order(&bob, &order.id, "Second", false)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Business(CoreError::InvalidState { .. })));

    assert_eq!(db.wallets().get(&wallet.id).await.unwrap().unwrap().balance, 1_000_000);
    for item in &order.items {
        assert_eq!(db.products().stock_of(&item.product_id).await.unwrap(), Some(10));
    }
}

#[tokio::test]
async fn test_forward_chain_with_tracking_and_cod_collection() {
    let app = test_app().await;
    let order = place(&app, "alice", PaymentMethod::Cod).await;
    let lifecycle = LifecycleService::new(app.state.clone());
    let admin = Caller::admin("ops");

    lifecycle.advance_status(&admin, &order.id, advance("processing")).await.unwrap();
    let shipped = lifecycle
        .advance_status(
            &admin,
            &order.id,
            AdvanceStatusInput {
                status: "shipped".to_string(),
                tracking_number: Some("VN123456789".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(shipped.shipping.tracking_number.as_deref(), Some("VN123456789"));
    assert_eq!(shipped.payment.status, PaymentStatus::Pending);

    let delivered = lifecycle
        .advance_status(&admin, &order.id, advance("delivered"))
        .await
        .unwrap();
    assert_eq!(delivered.payment.status, PaymentStatus::Paid);
    assert_eq!(delivered.shipping.tracking_number.as_deref(), Some("VN123456789"));

    let completed = lifecycle
        .advance_status(&admin, &order.id, advance("completed"))
        .await
        .unwrap();
    assert_eq!(completed.status, OrderStatus::Completed);
}

#[tokio::test]
async fn test_status_moves_are_admin_only_and_single_step() {
    let app = test_app().await;
    let order = place(&app, "alice", PaymentMethod::Cod).await;
    let lifecycle = LifecycleService::new(app.state.clone());

    let err = lifecycle
        .advance_status(&Caller::customer("alice"), &order.id, advance("processing"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Business(CoreError::Forbidden { .. })));

    let admin = Caller::admin("ops");
    let err = lifecycle
        .advance_status(&admin, &order.id, advance("delivered"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Business(CoreError::InvalidState { .. })));

    let err = lifecycle
        .advance_status(&admin, &order.id, advance("returned"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Business(CoreError::InvalidState { .. })));

    let err = lifecycle
        .advance_status(&admin, &order.id, advance("teleported"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Business(CoreError::Validation(_))));

    let err = lifecycle
        .advance_status(&admin, &meridian_core::OrderId::from("missing"), advance("processing"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Business(CoreError::NotFound { .. })));
}
