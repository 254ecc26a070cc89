//! Return-request intake: the delivery precondition, the return
//! window, and item validation against the original order lines.

mod common;

use assert_matches::assert_matches;
use common::{admin, customer, TestApp};
use rust_decimal_macros::dec;
use storefront_orders::{
    services::{OrderDetails, RequestReturnRequest, ReturnItemInput},
    OrderStatus, ReturnResolution, ReturnStatus, ServiceError,
};
use uuid::Uuid;

async fn delivered_order(app: &TestApp, buyer: &storefront_orders::ActorContext) -> OrderDetails {
    let saree = app
        .seed_product("Banarasi Georgette Saree", dec!(3999.00), 5)
        .await;
    let order_id = app.place_order(buyer, &saree, 2).await.order.id;
    app.advance(
        &admin(),
        order_id,
        &[
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ],
    )
    .await
}

fn return_all(details: &OrderDetails, resolution: ReturnResolution) -> RequestReturnRequest {
    RequestReturnRequest {
        items: details
            .items
            .iter()
            .map(|item| ReturnItemInput {
                order_item_id: item.id,
                quantity: item.quantity,
                reason: Some("colour mismatch".to_string()),
            })
            .collect(),
        resolution,
        reason: Some("colour differs from the listing photos".to_string()),
    }
}

#[tokio::test]
async fn return_within_the_window_is_recorded() {
    let app = TestApp::new().await;
    let buyer = customer();
    let details = delivered_order(&app, &buyer).await;
    app.backdate_delivery(details.order.id, 3).await;

    let view = app
        .service
        .request_return(
            &buyer,
            details.order.id,
            return_all(&details, ReturnResolution::Refund),
        )
        .await
        .unwrap();

    assert_eq!(view.request.status, ReturnStatus::Requested);
    assert_eq!(view.request.resolution, ReturnResolution::Refund);
    assert_eq!(view.request.order_id, details.order.id);
    assert_eq!(view.items.len(), details.items.len());
    assert_eq!(view.items[0].quantity, 2);

    // Recording the intent does not mutate the order itself.
    let after = app.service.get_order(&buyer, details.order.id).await.unwrap();
    assert_eq!(after.order.status, OrderStatus::Delivered);
    assert_eq!(after.history.len(), details.history.len());
}

#[tokio::test]
async fn return_outside_the_window_is_rejected() {
    let app = TestApp::new().await;
    let buyer = customer();
    let details = delivered_order(&app, &buyer).await;
    app.backdate_delivery(details.order.id, 8).await;

    let result = app
        .service
        .request_return(
            &buyer,
            details.order.id,
            return_all(&details, ReturnResolution::Refund),
        )
        .await;

    assert_matches!(
        result,
        Err(ServiceError::ReturnWindowExpired { window_days: 7, .. })
    );
}

#[tokio::test]
async fn the_window_length_comes_from_configuration() {
    let app = TestApp::with_return_window(14).await;
    let buyer = customer();
    let details = delivered_order(&app, &buyer).await;
    app.backdate_delivery(details.order.id, 8).await;

    // 8 days ago is fine under a 14-day policy.
    let result = app
        .service
        .request_return(
            &buyer,
            details.order.id,
            return_all(&details, ReturnResolution::StoreCredit),
        )
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn returns_require_a_delivered_order() {
    let app = TestApp::new().await;
    let buyer = customer();
    let saree = app.seed_product("Kalamkari Saree", dec!(2199.00), 4).await;
    let details = app.place_order(&buyer, &saree, 1).await;
    let order_id = details.order.id;
    app.advance(&admin(), order_id, &[OrderStatus::Processing, OrderStatus::Shipped])
        .await;

    let result = app
        .service
        .request_return(&buyer, order_id, return_all(&details, ReturnResolution::Refund))
        .await;

    assert_matches!(result, Err(ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn return_quantity_cannot_exceed_the_ordered_quantity() {
    let app = TestApp::new().await;
    let buyer = customer();
    let details = delivered_order(&app, &buyer).await;

    let result = app
        .service
        .request_return(
            &buyer,
            details.order.id,
            RequestReturnRequest {
                items: vec![ReturnItemInput {
                    order_item_id: details.items[0].id,
                    quantity: details.items[0].quantity + 1,
                    reason: None,
                }],
                resolution: ReturnResolution::Exchange,
                reason: None,
            },
        )
        .await;

    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn return_items_must_belong_to_the_order() {
    let app = TestApp::new().await;
    let buyer = customer();
    let details = delivered_order(&app, &buyer).await;

    let result = app
        .service
        .request_return(
            &buyer,
            details.order.id,
            RequestReturnRequest {
                items: vec![ReturnItemInput {
                    order_item_id: Uuid::new_v4(),
                    quantity: 1,
                    reason: None,
                }],
                resolution: ReturnResolution::Refund,
                reason: None,
            },
        )
        .await;

    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn a_stranger_cannot_request_a_return() {
    let app = TestApp::new().await;
    let buyer = customer();
    let details = delivered_order(&app, &buyer).await;

    let result = app
        .service
        .request_return(
            &customer(),
            details.order.id,
            return_all(&details, ReturnResolution::Refund),
        )
        .await;

    assert_matches!(result, Err(ServiceError::Forbidden(_)));
}
