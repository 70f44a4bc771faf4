//! Role and identity resolution from the login email, plus the
//! authentication-service contract. Credential verification itself is
//! delegated; this module only classifies the address.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::LoginError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub role: Role,
    pub user_id: String,
    pub email: String,
}

const ADMIN_SUFFIX: &str = "@admin.com";
const TEACHER_SUFFIX: &str = "@ogretmen.com";
const STUDENT_SUFFIX: &str = "@ogrenci.com";

const ADMIN_ID: &str = "admin";

const TEACHER_IDS: &[(&str, &str)] = &[("yasemin.bahtiyar", "t1"), ("mehmet.demir", "t2")];
const DEFAULT_TEACHER_ID: &str = "t1";

const STUDENT_IDS: &[(&str, &str)] = &[
    ("ali.ozturk", "s1"),
    ("zeynep.kaya", "s2"),
    ("ahmet.celik", "s3"),
];
const DEFAULT_STUDENT_ID: &str = "s1";

/// Map an email address to a role and stable user id. Rejects addresses
/// outside the three recognized domains.
pub fn resolve(email: &str) -> Result<Identity, LoginError> {
    let email = email.trim().to_lowercase();

    if email.strip_suffix(ADMIN_SUFFIX).is_some() {
        return Ok(Identity {
            role: Role::Admin,
            user_id: ADMIN_ID.to_string(),
            email,
        });
    }
    if let Some(local) = email.strip_suffix(TEACHER_SUFFIX) {
        let user_id = lookup(TEACHER_IDS, local, DEFAULT_TEACHER_ID);
        return Ok(Identity {
            role: Role::Teacher,
            user_id,
            email,
        });
    }
    if let Some(local) = email.strip_suffix(STUDENT_SUFFIX) {
        let user_id = lookup(STUDENT_IDS, local, DEFAULT_STUDENT_ID);
        return Ok(Identity {
            role: Role::Student,
            user_id,
            email,
        });
    }
    Err(LoginError::UnknownDomain)
}

fn lookup(table: &[(&str, &str)], local: &str, default: &str) -> String {
    table
        .iter()
        .find(|(name, _)| *name == local)
        .map(|(_, id)| (*id).to_string())
        .unwrap_or_else(|| default.to_string())
}

/// Credential verification against the hosted auth provider.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn verify(&self, email: &str, password: &str) -> Result<(), LoginError>;
}

/// Verify the credentials, then classify the address. The email is
/// normalized (trimmed, lowercased) before both steps.
pub async fn login(
    auth: &dyn AuthService,
    email: &str,
    password: &str,
) -> Result<Identity, LoginError> {
    let normalized = email.trim().to_lowercase();
    auth.verify(&normalized, password).await?;
    resolve(&normalized)
}

/// Fixed-credential auth used for demos and tests: known addresses
/// accept any password of four or more characters.
pub struct FixedCredentials {
    accounts: BTreeMap<String, Option<String>>,
}

impl FixedCredentials {
    /// An entry with `None` for the password accepts anything of four or
    /// more characters.
    pub fn new(accounts: impl IntoIterator<Item = (String, Option<String>)>) -> Self {
        FixedCredentials {
            accounts: accounts.into_iter().collect(),
        }
    }

    /// The three demo accounts shown on the login screen.
    pub fn demo() -> Self {
        Self::new(
            [
                "ahmet.gunaydin@admin.com",
                "yasemin.bahtiyar@ogretmen.com",
                "zeynep.kaya@ogrenci.com",
            ]
            .into_iter()
            .map(|email| (email.to_string(), None)),
        )
    }
}

#[async_trait]
impl AuthService for FixedCredentials {
    async fn verify(&self, email: &str, password: &str) -> Result<(), LoginError> {
        if !email.contains('@') {
            return Err(LoginError::InvalidEmail);
        }
        match self.accounts.get(email) {
            None => Err(LoginError::UserNotFound),
            Some(Some(expected)) if expected != password => Err(LoginError::WrongPassword),
            Some(None) if password.len() < 4 => Err(LoginError::WrongPassword),
            Some(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_suffix_resolves_to_constant_identity() {
        let identity = resolve("Ahmet.Gunaydin@Admin.com").unwrap();
        assert_eq!(identity.role, Role::Admin);
        assert_eq!(identity.user_id, "admin");
        assert_eq!(identity.email, "ahmet.gunaydin@admin.com");
    }

    #[test]
    fn teacher_locals_map_to_known_ids() {
        assert_eq!(
            resolve("yasemin.bahtiyar@ogretmen.com").unwrap().user_id,
            "t1"
        );
        assert_eq!(resolve("mehmet.demir@ogretmen.com").unwrap().user_id, "t2");
        // Unrecognized teachers fall back to the default slot.
        assert_eq!(resolve("someone.else@ogretmen.com").unwrap().user_id, "t1");
    }

    #[test]
    fn student_locals_map_to_known_ids() {
        assert_eq!(resolve("ali.ozturk@ogrenci.com").unwrap().user_id, "s1");
        assert_eq!(resolve("zeynep.kaya@ogrenci.com").unwrap().user_id, "s2");
        assert_eq!(resolve("ahmet.celik@ogrenci.com").unwrap().user_id, "s3");
        assert_eq!(resolve("nobody@ogrenci.com").unwrap().user_id, "s1");
    }

    #[test]
    fn unknown_domain_is_rejected() {
        assert_eq!(
            resolve("user@example.com").unwrap_err(),
            LoginError::UnknownDomain
        );
    }
}
