//! # Authorization Guard
//!
//! One decision function called by every service before it opens a
//! transaction.
//!
//! | Action          | Customer             | Admin |
//! |-----------------|----------------------|-------|
//! | View            | own resources        | any   |
//! | Use             | own wallet/cart      | own   |
//! | Cancel          | own orders           | own   |
//! | AdminCancel     | no                   | any   |
//! | AdvanceStatus   | no                   | any   |

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

/// The authenticated identity behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn customer(user_id: impl Into<UserId>) -> Self {
        Caller {
            user_id: user_id.into(),
            role: Role::Customer,
        }
    }

    pub fn admin(user_id: impl Into<UserId>) -> Self {
        Caller {
            user_id: user_id.into(),
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    Order { owner: &'a UserId },
    Wallet { owner: &'a UserId },
    TopUpRequest { owner: &'a UserId },
}

impl Resource<'_> {
    fn owner(&self) -> &UserId {
        match self {
            Resource::Order { owner }
            | Resource::Wallet { owner }
            | Resource::TopUpRequest { owner } => owner,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Use,
    Cancel,
    AdminCancel,
    AdvanceStatus,
}

impl Action {
    fn label(&self) -> &'static str {
        match self {
            Action::View => "view this resource",
            Action::Use => "use this resource",
            Action::Cancel => "cancel this order",
            Action::AdminCancel => "cancel orders as an administrator",
            Action::AdvanceStatus => "change order status",
        }
    }
}

pub fn authorize(caller: &Caller, resource: Resource<'_>, action: Action) -> CoreResult<()> {
    let is_owner = resource.owner() == &caller.user_id;

    let allowed = match action {
        Action::View => is_owner || caller.is_admin(),
        Action::Use | Action::Cancel => is_owner,
        Action::AdminCancel | Action::AdvanceStatus => caller.is_admin(),
    };

    if allowed {
        Ok(())
    } else {
        Err(CoreError::forbidden(action.label()))
    }
}
