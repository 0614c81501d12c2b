//! Post-submission navigation policy.
//!
//! A pure function from (operation, result, affected role) to a display
//! decision. Routes are passed in explicitly so the policy never touches
//! ambient navigation or session state.

use super::{ActionResult, Role};

/// Route table supplied by the embedding application.
#[derive(Clone, Debug)]
pub struct Routes {
    pub dashboard: String,
    pub admin_list: String,
    pub user_list: String,
    pub login: String,
    pub logout: String,
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            dashboard: "/dashboard".to_string(),
            admin_list: "/dashboard/admins".to_string(),
            user_list: "/dashboard/admins/users".to_string(),
            login: "/login".to_string(),
            logout: "/logout".to_string(),
        }
    }
}

/// The operation a result belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Register,
    SignIn,
    ProfileUpdate,
    PasswordUpdate,
    AccountDelete,
    DirectoryCreate,
    DirectoryUpdate,
    DirectoryDelete,
    PasswordForgot,
    PasswordReset,
    EmailVerify,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Navigation {
    /// Render the result inline; no navigation.
    Stay,
    /// Show a transient "saved" indicator; no navigation.
    Saved,
    Redirect(String),
}

/// Decide what the client does with a submission outcome.
///
/// Validation errors and business warnings always render inline. Committed
/// admin-directory writes navigate to the list view matching the affected
/// record's role; self-deletion terminates the session.
#[must_use]
pub fn decide(
    routes: &Routes,
    operation: Operation,
    result: &ActionResult,
    affected_role: Option<Role>,
) -> Navigation {
    if !result.is_committed() {
        return Navigation::Stay;
    }

    match operation {
        Operation::Register | Operation::SignIn => Navigation::Redirect(routes.dashboard.clone()),
        Operation::ProfileUpdate | Operation::PasswordUpdate => Navigation::Saved,
        Operation::AccountDelete => Navigation::Redirect(routes.logout.clone()),
        Operation::DirectoryCreate | Operation::DirectoryUpdate => {
            let route = match affected_role {
                Some(Role::User) => &routes.user_list,
                _ => &routes.admin_list,
            };
            Navigation::Redirect(route.clone())
        }
        Operation::DirectoryDelete
        | Operation::PasswordForgot
        | Operation::PasswordReset
        | Operation::EmailVerify => Navigation::Stay,
    }
}

#[cfg(test)]
mod tests {
    use super::super::FieldErrors;
    use super::*;

    #[test]
    fn errors_and_warnings_stay_inline() {
        let routes = Routes::default();

        let mut errors = FieldErrors::new();
        errors.insert("email".to_string(), vec!["EmailInvalid".to_string()]);
        assert_eq!(
            decide(
                &routes,
                Operation::Register,
                &ActionResult::rejected(errors),
                None
            ),
            Navigation::Stay
        );

        assert_eq!(
            decide(
                &routes,
                Operation::DirectoryCreate,
                &ActionResult::denied("EmailAlreadyRegistered"),
                Some(Role::User)
            ),
            Navigation::Stay
        );
    }

    #[test]
    fn directory_writes_navigate_by_affected_role() {
        let routes = Routes::default();
        let committed = ActionResult::committed();

        assert_eq!(
            decide(
                &routes,
                Operation::DirectoryCreate,
                &committed,
                Some(Role::User)
            ),
            Navigation::Redirect("/dashboard/admins/users".to_string())
        );
        assert_eq!(
            decide(
                &routes,
                Operation::DirectoryUpdate,
                &committed,
                Some(Role::Admin)
            ),
            Navigation::Redirect("/dashboard/admins".to_string())
        );
    }

    #[test]
    fn self_delete_terminates_the_session() {
        let routes = Routes::default();
        assert_eq!(
            decide(
                &routes,
                Operation::AccountDelete,
                &ActionResult::committed(),
                None
            ),
            Navigation::Redirect("/logout".to_string())
        );
    }

    #[test]
    fn profile_and_password_updates_show_saved_indicator() {
        let routes = Routes::default();
        assert_eq!(
            decide(
                &routes,
                Operation::ProfileUpdate,
                &ActionResult::saved(),
                None
            ),
            Navigation::Saved
        );
        assert_eq!(
            decide(
                &routes,
                Operation::PasswordUpdate,
                &ActionResult::committed(),
                None
            ),
            Navigation::Saved
        );
    }

    #[test]
    fn register_and_sign_in_land_on_dashboard() {
        let routes = Routes::default();
        assert_eq!(
            decide(
                &routes,
                Operation::Register,
                &ActionResult::committed(),
                Some(Role::Admin)
            ),
            Navigation::Redirect("/dashboard".to_string())
        );
        assert_eq!(
            decide(&routes, Operation::SignIn, &ActionResult::committed(), None),
            Navigation::Redirect("/dashboard".to_string())
        );
    }
}
