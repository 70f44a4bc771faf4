use odevd_core::error::LoginError;
use odevd_core::identity::{login, FixedCredentials, Role};

#[tokio::test]
async fn demo_accounts_sign_in_and_resolve() {
    let auth = FixedCredentials::demo();

    let admin = login(&auth, "ahmet.gunaydin@admin.com", "sifre").await.unwrap();
    assert_eq!(admin.role, Role::Admin);
    assert_eq!(admin.user_id, "admin");

    let teacher = login(&auth, "Yasemin.Bahtiyar@ogretmen.com ", "sifre")
        .await
        .unwrap();
    assert_eq!(teacher.role, Role::Teacher);
    assert_eq!(teacher.user_id, "t1");
    assert_eq!(teacher.email, "yasemin.bahtiyar@ogretmen.com");

    let student = login(&auth, "zeynep.kaya@ogrenci.com", "sifre").await.unwrap();
    assert_eq!(student.role, Role::Student);
    assert_eq!(student.user_id, "s2");
}

#[tokio::test]
async fn login_failures_are_classified() {
    let auth = FixedCredentials::demo();

    assert_eq!(
        login(&auth, "nobody@admin.com", "sifre").await.unwrap_err(),
        LoginError::UserNotFound
    );
    assert_eq!(
        login(&auth, "zeynep.kaya@ogrenci.com", "abc").await.unwrap_err(),
        LoginError::WrongPassword
    );
    assert_eq!(
        login(&auth, "not-an-email", "sifre").await.unwrap_err(),
        LoginError::InvalidEmail
    );
}

#[tokio::test]
async fn verified_credentials_with_foreign_domain_are_rejected() {
    let auth = FixedCredentials::new([("user@example.com".to_string(), None)]);
    assert_eq!(
        login(&auth, "user@example.com", "sifre").await.unwrap_err(),
        LoginError::UnknownDomain
    );
}

#[tokio::test]
async fn explicit_passwords_are_checked_exactly() {
    let auth = FixedCredentials::new([(
        "mudur@admin.com".to_string(),
        Some("gizli123".to_string()),
    )]);
    assert!(login(&auth, "mudur@admin.com", "gizli123").await.is_ok());
    assert_eq!(
        login(&auth, "mudur@admin.com", "yanlis").await.unwrap_err(),
        LoginError::WrongPassword
    );
}
