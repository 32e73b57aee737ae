//! Route-level authorization.
//!
//! Every protected operation is listed in [`Route`] together with the roles
//! allowed to call it and whether the target resource must belong to the
//! caller. [`authorize`] is the single gate all services go through.

use uuid::Uuid;

use super::{claims::Principal, roles::Role};
use crate::error::{AppError, AppResult};

const ANY_ROLE: &[Role] = &[Role::User, Role::Admin];
const ADMIN_ONLY: &[Role] = &[Role::Admin];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    CreateExpense,
    ListExpenses,
    GetExpense,
    UpdateExpense,
    DeleteExpense,
    CreateUser,
    ListUsers,
    GetUser,
    UpdateUser,
    DeleteUser,
}

#[derive(Debug, Clone, Copy)]
pub struct RoutePolicy {
    pub roles: &'static [Role],
    pub ownership_check: bool,
}

impl Route {
    pub const fn policy(self) -> RoutePolicy {
        match self {
            Route::ListExpenses | Route::CreateUser | Route::ListUsers => RoutePolicy {
                roles: ADMIN_ONLY,
                ownership_check: false,
            },
            Route::CreateExpense
            | Route::GetExpense
            | Route::UpdateExpense
            | Route::DeleteExpense
            | Route::GetUser
            | Route::UpdateUser
            | Route::DeleteUser => RoutePolicy {
                roles: ANY_ROLE,
                ownership_check: true,
            },
        }
    }

    fn denial(self) -> &'static str {
        match self {
            Route::CreateExpense => "You can only create expenses for yourself",
            Route::GetExpense => "You can only access your own expenses",
            Route::UpdateExpense => "You can only update your own expenses",
            Route::DeleteExpense => "You can only remove your own expenses",
            Route::GetUser => "You can only access your own account",
            Route::UpdateUser => "You can only update your own account",
            Route::DeleteUser => "You can only remove your own account",
            Route::ListExpenses | Route::CreateUser | Route::ListUsers => {
                "Administrator role required"
            }
        }
    }
}

/// Decides whether `principal` may invoke `route`. For ownership routes
/// `owner` is the id that owns the fetched resource; admins bypass it.
pub fn authorize(principal: &Principal, route: Route, owner: Option<Uuid>) -> AppResult<()> {
    let policy = route.policy();
    if !policy.roles.contains(&principal.role) {
        tracing::warn!(user_id = %principal.id, role = %principal.role, ?route, "role not permitted");
        return Err(AppError::Forbidden(route.denial().into()));
    }
    if policy.ownership_check && !principal.is_admin() {
        let owned = owner.is_some_and(|o| o == principal.id);
        if !owned {
            tracing::warn!(user_id = %principal.id, ?route, "ownership check failed");
            return Err(AppError::Forbidden(route.denial().into()));
        }
    }
    Ok(())
}

/// Assigning `admin` is only possible for an actor that is already admin,
/// or as a no-op on an account that already holds the role. Registration
/// has no actor.
pub fn authorize_role_assignment(
    actor: Option<&Principal>,
    requested: Role,
    current: Option<Role>,
) -> AppResult<()> {
    if requested != Role::Admin || current == Some(Role::Admin) {
        return Ok(());
    }
    match actor {
        Some(p) if p.is_admin() => Ok(()),
        _ => Err(AppError::Forbidden("You cannot change role to admin".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            email: "p@x.com".into(),
            role,
        }
    }

    #[test]
    fn admin_only_routes_reject_users() {
        let user = principal(Role::User);
        for route in [Route::ListExpenses, Route::ListUsers, Route::CreateUser] {
            assert!(matches!(authorize(&user, route, None), Err(AppError::Forbidden(_))));
            assert!(authorize(&principal(Role::Admin), route, None).is_ok());
        }
    }

    #[test]
    fn owner_passes_ownership_check() {
        let user = principal(Role::User);
        assert!(authorize(&user, Route::GetExpense, Some(user.id)).is_ok());
        assert!(authorize(&user, Route::UpdateExpense, Some(user.id)).is_ok());
        assert!(authorize(&user, Route::DeleteExpense, Some(user.id)).is_ok());
    }

    #[test]
    fn non_owner_is_forbidden() {
        let user = principal(Role::User);
        let other = Uuid::new_v4();
        let err = authorize(&user, Route::GetExpense, Some(other)).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(ref m) if m.contains("your own")));
        assert!(authorize(&user, Route::DeleteUser, Some(other)).is_err());
        assert!(authorize(&user, Route::GetExpense, None).is_err());
    }

    #[test]
    fn admin_bypasses_ownership() {
        let admin = principal(Role::Admin);
        for route in [Route::GetExpense, Route::UpdateExpense, Route::DeleteExpense, Route::GetUser] {
            assert!(authorize(&admin, route, Some(Uuid::new_v4())).is_ok());
        }
    }

    #[test]
    fn only_admin_may_grant_admin() {
        let user = principal(Role::User);
        let admin = principal(Role::Admin);
        assert!(authorize_role_assignment(None, Role::Admin, None).is_err());
        assert!(authorize_role_assignment(Some(&user), Role::Admin, Some(Role::User)).is_err());
        assert!(authorize_role_assignment(Some(&admin), Role::Admin, Some(Role::User)).is_ok());
        assert!(authorize_role_assignment(None, Role::User, None).is_ok());
        assert!(authorize_role_assignment(Some(&user), Role::User, Some(Role::User)).is_ok());
    }
}
