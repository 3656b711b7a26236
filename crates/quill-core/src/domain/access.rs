//! Access control policy.
//!
//! Every core operation states what it wants to do (`Action`) to what
//! (`Resource`) on behalf of whom (`Option<&Principal>`, `None` for anonymous
//! requests) and receives a [`Decision`]. The rules, in precedence order:
//!
//! 1. reads (`List`, `Retrieve`) are open to everyone;
//! 2. `Create` needs an authenticated principal;
//! 3. `Update` on a post is reserved to its owner;
//! 4. `Delete` on a post is allowed to its owner or a privileged principal.
//!
//! Privilege never grants `Update`.

use uuid::Uuid;

use super::post::Post;

/// The authenticated identity behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub username: String,
    pub is_privileged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Retrieve,
    Create,
    Update,
    Delete,
}

impl Action {
    fn is_read(self) -> bool {
        matches!(self, Action::List | Action::Retrieve)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Post,
    Category,
    Comment,
}

/// What an action targets.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    /// A collection, or an item not yet loaded.
    Collection(ResourceKind),
    Post(&'a Post),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Unauthenticated,
    Forbidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied(DenyReason),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allowed
    }

    pub fn check(self) -> Result<(), DenyReason> {
        match self {
            Decision::Allowed => Ok(()),
            Decision::Denied(reason) => Err(reason),
        }
    }
}

/// Decide whether `principal` may perform `action` on `resource`.
pub fn authorize(action: Action, principal: Option<&Principal>, resource: Resource<'_>) -> Decision {
    if action.is_read() {
        return Decision::Allowed;
    }

    let Some(principal) = principal else {
        return Decision::Denied(DenyReason::Unauthenticated);
    };

    match (action, resource) {
        (Action::Create, _) => Decision::Allowed,
        (Action::Update, Resource::Post(post)) if post.is_owned_by(principal.user_id) => {
            Decision::Allowed
        }
        (Action::Delete, Resource::Post(post))
            if post.is_owned_by(principal.user_id) || principal.is_privileged =>
        {
            Decision::Allowed
        }
        _ => Decision::Denied(DenyReason::Forbidden),
    }
}
