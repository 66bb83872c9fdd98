//! Order status state machine and per-role transition authority.
//!
//! | Role     | May set                                           | Precondition                                |
//! |----------|---------------------------------------------------|---------------------------------------------|
//! | Customer | `CANCELLED`                                       | own order, status `PENDING` or `CONFIRMED`  |
//! | Admin    | `PENDING`, `CONFIRMED`                            | status non-terminal                         |
//! | Driver   | `PREPARING`, `OUT_FOR_DELIVERY`, `DELIVERED`, `CANCELLED` | assigned to the driver, status non-terminal |
//!
//! Driver assignment is a separate mutation: only an admin may assign or
//! unassign, only while the order is non-terminal, and it never changes the
//! status.
//!
//! The backing service enforces the same rules authoritatively. Views use
//! [`allowed_transitions`] to decide which controls to offer and
//! [`check_transition`] before issuing a request, so an illegal transition is
//! never offered nor sent.

use thiserror::Error;

use crate::types::{OrderStatus, Role};

/// How the acting user relates to the order.
///
/// For a customer this means "placed the order"; for a driver, "is assigned
/// to it". Admins act on every order regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// The order's own customer, or its assigned driver.
    OwnerOrAssignee,
    /// Anyone else.
    Unrelated,
}

impl From<bool> for Relation {
    fn from(is_owner_or_assignee: bool) -> Self {
        if is_owner_or_assignee {
            Self::OwnerOrAssignee
        } else {
            Self::Unrelated
        }
    }
}

/// Why a requested transition was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The order has already reached `DELIVERED` or `CANCELLED`.
    #[error("order is already {0} and cannot change")]
    Terminal(OrderStatus),

    /// The role may never set this status, or not from this status.
    #[error("{role} may not move an order from {from} to {to}")]
    NotPermitted {
        role: Role,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// A customer acting on someone else's order.
    #[error("order does not belong to this customer")]
    NotOwner,

    /// A driver acting on an order assigned elsewhere.
    #[error("order is not assigned to this driver")]
    NotAssigned,

    /// A non-admin trying to change the driver assignment.
    #[error("{0} may not assign drivers")]
    AssignmentNotPermitted(Role),
}

const CUSTOMER_TARGETS: &[OrderStatus] = &[OrderStatus::Cancelled];
const CUSTOMER_CANCELLABLE: &[OrderStatus] = &[OrderStatus::Pending, OrderStatus::Confirmed];
const ADMIN_TARGETS: &[OrderStatus] = &[OrderStatus::Pending, OrderStatus::Confirmed];
const DRIVER_TARGETS: &[OrderStatus] = &[
    OrderStatus::Preparing,
    OrderStatus::OutForDelivery,
    OrderStatus::Delivered,
    OrderStatus::Cancelled,
];

/// Statuses `role` may set on an order currently in `current`.
///
/// Returned in lifecycle order. Empty whenever the order is terminal, or the
/// customer / driver is not the order's owner / assignee.
#[must_use]
pub fn allowed_transitions(
    role: Role,
    current: OrderStatus,
    relation: impl Into<Relation>,
) -> Vec<OrderStatus> {
    if current.is_terminal() {
        return Vec::new();
    }
    let related = relation.into() == Relation::OwnerOrAssignee;

    let targets: &[OrderStatus] = match role {
        Role::Customer if related && CUSTOMER_CANCELLABLE.contains(&current) => CUSTOMER_TARGETS,
        Role::Admin => ADMIN_TARGETS,
        Role::Driver if related => DRIVER_TARGETS,
        Role::Customer | Role::Driver => &[],
    };
    targets.to_vec()
}

/// Validate a single status change.
///
/// # Errors
///
/// Returns the most specific [`TransitionError`]: terminal source first,
/// then ownership / assignment, then the role's permitted set.
pub fn check_transition(
    role: Role,
    current: OrderStatus,
    target: OrderStatus,
    relation: impl Into<Relation>,
) -> Result<(), TransitionError> {
    if current.is_terminal() {
        return Err(TransitionError::Terminal(current));
    }
    let relation = relation.into();
    match (role, relation) {
        (Role::Customer, Relation::Unrelated) => return Err(TransitionError::NotOwner),
        (Role::Driver, Relation::Unrelated) => return Err(TransitionError::NotAssigned),
        _ => {}
    }

    if allowed_transitions(role, current, relation).contains(&target) {
        Ok(())
    } else {
        Err(TransitionError::NotPermitted {
            role,
            from: current,
            to: target,
        })
    }
}

/// Validate a driver assignment change.
///
/// # Errors
///
/// Returns [`TransitionError::AssignmentNotPermitted`] for non-admins and
/// [`TransitionError::Terminal`] once the order is finished.
pub fn check_assignment(role: Role, current: OrderStatus) -> Result<(), TransitionError> {
    if role != Role::Admin {
        return Err(TransitionError::AssignmentNotPermitted(role));
    }
    if current.is_terminal() {
        return Err(TransitionError::Terminal(current));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::{Cancelled, Confirmed, Delivered, OutForDelivery, Pending, Preparing};

    #[test]
    fn test_customer_cancels_only_early_own_orders() {
        assert_eq!(allowed_transitions(Role::Customer, Pending, true), vec![Cancelled]);
        assert_eq!(allowed_transitions(Role::Customer, Confirmed, true), vec![Cancelled]);
        assert!(allowed_transitions(Role::Customer, Preparing, true).is_empty());
        assert!(allowed_transitions(Role::Customer, Pending, false).is_empty());
    }

    #[test]
    fn test_admin_sets_pending_or_confirmed() {
        for status in [Pending, Confirmed, Preparing, OutForDelivery] {
            assert_eq!(
                allowed_transitions(Role::Admin, status, false),
                vec![Pending, Confirmed]
            );
        }
        assert!(allowed_transitions(Role::Admin, Delivered, false).is_empty());
    }

    #[test]
    fn test_driver_needs_assignment() {
        assert_eq!(
            allowed_transitions(Role::Driver, Preparing, true),
            vec![Preparing, OutForDelivery, Delivered, Cancelled]
        );
        assert!(allowed_transitions(Role::Driver, Preparing, false).is_empty());
    }

    #[test]
    fn test_check_transition_reports_specific_errors() {
        assert_eq!(
            check_transition(Role::Driver, Delivered, Preparing, true),
            Err(TransitionError::Terminal(Delivered))
        );
        assert_eq!(
            check_transition(Role::Customer, Pending, Cancelled, false),
            Err(TransitionError::NotOwner)
        );
        assert_eq!(
            check_transition(Role::Driver, Preparing, OutForDelivery, false),
            Err(TransitionError::NotAssigned)
        );
        assert_eq!(
            check_transition(Role::Customer, Preparing, Cancelled, true),
            Err(TransitionError::NotPermitted {
                role: Role::Customer,
                from: Preparing,
                to: Cancelled,
            })
        );
        assert_eq!(
            check_transition(Role::Driver, Preparing, OutForDelivery, true),
            Ok(())
        );
    }

    #[test]
    fn test_assignment_is_admin_only() {
        assert_eq!(check_assignment(Role::Admin, Preparing), Ok(()));
        assert_eq!(
            check_assignment(Role::Driver, Preparing),
            Err(TransitionError::AssignmentNotPermitted(Role::Driver))
        );
        assert_eq!(
            check_assignment(Role::Admin, Cancelled),
            Err(TransitionError::Terminal(Cancelled))
        );
    }
}
