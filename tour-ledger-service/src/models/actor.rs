//! Acting user context for mutations.

use serde::{Deserialize, Serialize};
use service_core::error::AppError;

/// User on whose behalf a mutation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActingUser {
    pub id: String,
    pub roles: Vec<String>,
}

impl ActingUser {
    /// Build from a raw user id; an empty id means nobody is signed in.
    pub fn new(id: impl Into<String>, roles: Vec<String>) -> Result<Self, AppError> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "An authenticated user is required"
            )));
        }
        let roles = roles
            .into_iter()
            .map(|r| r.trim().to_ascii_lowercase())
            .filter(|r| !r.is_empty())
            .collect();
        Ok(Self { id, roles })
    }

    pub fn has_any_role(&self, allowed: &[String]) -> bool {
        self.roles
            .iter()
            .any(|r| allowed.iter().any(|a| a.eq_ignore_ascii_case(r)))
    }

    /// Fail with `Forbidden` unless the user holds one of `allowed`.
    pub fn require_any_role(&self, allowed: &[String]) -> Result<(), AppError> {
        if self.has_any_role(allowed) {
            return Ok(());
        }
        Err(AppError::Forbidden(anyhow::anyhow!(
            "User {} requires one of the roles: {}",
            self.id,
            allowed.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_user_is_unauthenticated() {
        assert!(matches!(
            ActingUser::new("  ", vec![]),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn role_check_is_case_insensitive() {
        let user = ActingUser::new("u-1", vec!["Finance".into()]).unwrap();
        let allowed = vec!["admin".to_string(), "finance".to_string()];
        assert!(user.require_any_role(&allowed).is_ok());

        let guest = ActingUser::new("u-2", vec!["agent".into()]).unwrap();
        assert!(matches!(
            guest.require_any_role(&allowed),
            Err(AppError::Forbidden(_))
        ));
    }
}
