//! Integration tests for per-role transition authority.
//!
//! Every (role, from, to) triple is checked against the authority table,
//! both through the shared lifecycle functions and through the in-memory
//! service, which re-validates independently of the client.

#![allow(clippy::unwrap_used)]

use forkful_client::gateway::{Caller, GatewayError, InMemoryOrderGateway, OrderGateway};
use forkful_core::{
    MenuItemId, NewOrder, OrderId, OrderItem, OrderPatch, OrderStatus, Role, TransitionError,
    UserId, allowed_transitions, check_assignment, check_transition,
};
use forkful_integration_tests::{
    ADMIN, CUSTOMER, DAL, DRIVER, DRIVER_USER, OTHER_CUSTOMER, OTHER_DRIVER_USER, RESTAURANT,
    service,
};
use OrderStatus::{Cancelled, Confirmed, Delivered, OutForDelivery, Pending, Preparing};

const ROLES: [Role; 3] = [Role::Customer, Role::Admin, Role::Driver];

/// The authority table, written out independently of the implementation.
fn permitted(role: Role, related: bool, from: OrderStatus, to: OrderStatus) -> bool {
    if matches!(from, Delivered | Cancelled) {
        return false;
    }
    match role {
        Role::Customer => related && matches!(from, Pending | Confirmed) && to == Cancelled,
        Role::Admin => matches!(to, Pending | Confirmed),
        Role::Driver => {
            related && matches!(to, Preparing | OutForDelivery | Delivered | Cancelled)
        }
    }
}

// =============================================================================
// Lifecycle functions
// =============================================================================

#[test]
fn test_every_triple_matches_table() {
    for role in ROLES {
        for related in [true, false] {
            for from in OrderStatus::ALL {
                for to in OrderStatus::ALL {
                    let expected = permitted(role, related, from, to);
                    assert_eq!(
                        check_transition(role, from, to, related).is_ok(),
                        expected,
                        "check_transition({role}, {from}, {to}, related={related})"
                    );
                    assert_eq!(
                        allowed_transitions(role, from, related).contains(&to),
                        expected,
                        "allowed_transitions({role}, {from}, related={related}) vs {to}"
                    );
                }
            }
        }
    }
}

#[test]
fn test_terminal_states_have_no_controls() {
    for role in ROLES {
        for status in [Delivered, Cancelled] {
            assert!(allowed_transitions(role, status, true).is_empty());
            assert!(matches!(
                check_transition(role, status, Pending, true),
                Err(TransitionError::Terminal(_))
            ));
        }
    }
}

#[test]
fn test_only_admin_assigns() {
    for from in OrderStatus::ALL {
        assert_eq!(
            check_assignment(Role::Admin, from).is_ok(),
            !from.is_terminal()
        );
        assert!(check_assignment(Role::Customer, from).is_err());
        assert!(check_assignment(Role::Driver, from).is_err());
    }
}

// =============================================================================
// Service re-validation
// =============================================================================

fn admin() -> Caller {
    Caller::new(ADMIN, Role::Admin)
}

/// Place an order assigned to `DRIVER` and walk it to `status`.
async fn order_in(service: &InMemoryOrderGateway, status: OrderStatus) -> OrderId {
    let order = service
        .create_order(NewOrder {
            customer_id: CUSTOMER,
            restaurant_id: RESTAURANT,
            items: vec![OrderItem {
                menu_item_id: DAL,
                quantity: 1,
            }],
            delivery_address: None,
            payment_method: Some("COD".to_string()),
            transaction_id: None,
        })
        .await
        .unwrap()
        .order_id;
    service
        .update_order(order, OrderPatch::assign(Some(DRIVER)), admin())
        .await
        .unwrap();

    let driver = Caller::new(DRIVER_USER, Role::Driver);
    match status {
        Pending => {}
        Confirmed => {
            service
                .update_order(order, OrderPatch::status(Confirmed), admin())
                .await
                .unwrap();
        }
        Preparing | OutForDelivery | Delivered => {
            service
                .update_order(order, OrderPatch::status(status), driver)
                .await
                .unwrap();
        }
        Cancelled => {
            service.cancel_order(order, CUSTOMER).await.unwrap();
        }
    }
    assert_eq!(service.order(order).await.unwrap().status, status);
    order
}

fn caller(role: Role, related: bool) -> Caller {
    let user = match (role, related) {
        (Role::Customer, true) => CUSTOMER,
        (Role::Customer, false) => OTHER_CUSTOMER,
        (Role::Driver, true) => DRIVER_USER,
        (Role::Driver, false) => OTHER_DRIVER_USER,
        (Role::Admin, _) => ADMIN,
    };
    Caller::new(user, role)
}

#[tokio::test]
async fn test_service_enforces_same_table() {
    for role in ROLES {
        for related in [true, false] {
            for from in OrderStatus::ALL {
                for to in OrderStatus::ALL {
                    let service = service();
                    let order = order_in(&service, from).await;

                    let result = service
                        .update_order(order, OrderPatch::status(to), caller(role, related))
                        .await;

                    let expected = permitted(role, related, from, to);
                    assert_eq!(
                        result.is_ok(),
                        expected,
                        "service: {role} (related={related}) {from} -> {to}: {result:?}"
                    );
                    if expected {
                        assert_eq!(service.order(order).await.unwrap().status, to);
                    } else {
                        assert!(matches!(result, Err(GatewayError::Rejected(_))));
                        assert_eq!(service.order(order).await.unwrap().status, from);
                    }
                }
            }
        }
    }
}

#[tokio::test]
async fn test_service_refuses_non_admin_assignment() {
    let service = service();
    let order = order_in(&service, Pending).await;

    for role in [Role::Customer, Role::Driver] {
        let err = service
            .update_order(order, OrderPatch::assign(None), caller(role, true))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Rejected(TransitionError::AssignmentNotPermitted(_))
        ));
    }
    assert_eq!(service.order(order).await.unwrap().driver_id, Some(DRIVER));
}

#[tokio::test]
async fn test_admin_endpoints_require_registered_admin() {
    let service = service();
    let impostor = Caller::new(UserId::new(999), Role::Admin);
    assert!(matches!(
        service.list_orders_for_admin(impostor).await,
        Err(GatewayError::Forbidden(_))
    ));
    assert!(matches!(
        service.list_drivers(impostor).await,
        Err(GatewayError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_unknown_menu_items_are_rejected() {
    let service = service();
    let err = service
        .create_order(NewOrder {
            customer_id: CUSTOMER,
            restaurant_id: RESTAURANT,
            items: vec![OrderItem {
                menu_item_id: MenuItemId::new(404),
                quantity: 1,
            }],
            delivery_address: None,
            payment_method: None,
            transaction_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::BadRequest(_)));
}
