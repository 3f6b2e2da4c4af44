use crate::types::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    RedirectToLogin,
    /// Signed in, but lacking the role or permission the route needs.
    RedirectToHome,
}

/// Access requirements of a protected route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteGuard {
    required_role: Option<String>,
    required_permission: Option<String>,
}

impl RouteGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.required_role = Some(role.into());
        self
    }

    #[must_use]
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.required_permission = Some(permission.into());
        self
    }

    #[must_use]
    pub fn check(&self, session: &Session) -> GuardDecision {
        if !session.is_authenticated {
            return GuardDecision::RedirectToLogin;
        }
        let Some(user) = session.user.as_ref() else {
            return GuardDecision::RedirectToLogin;
        };
        if let Some(role) = self.required_role.as_deref() {
            if user.role != role {
                return GuardDecision::RedirectToHome;
            }
        }
        if let Some(permission) = self.required_permission.as_deref() {
            if !user.has_permission(permission) {
                return GuardDecision::RedirectToHome;
            }
        }
        GuardDecision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::alice_session;

    #[test]
    fn anonymous_session_goes_to_login() {
        assert_eq!(
            RouteGuard::new().check(&Session::default()),
            GuardDecision::RedirectToLogin
        );
    }

    #[test]
    fn role_and_permission_are_enforced() {
        let session = alice_session("A1", "R1");
        assert_eq!(RouteGuard::new().check(&session), GuardDecision::Allow);
        assert_eq!(
            RouteGuard::new().with_role("ADMIN").check(&session),
            GuardDecision::RedirectToHome
        );
        assert_eq!(
            RouteGuard::new()
                .with_permission("products:read")
                .check(&session),
            GuardDecision::Allow
        );
        assert_eq!(
            RouteGuard::new()
                .with_role("USER")
                .with_permission("users:write")
                .check(&session),
            GuardDecision::RedirectToHome
        );
    }
}
