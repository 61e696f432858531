//! User Entity

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use platform::password::HashedPassword;

use crate::domain::value_object::{
    Email, Identity, Phone, user_role::UserRole, user_status::UserStatus,
};

/// User entity
///
/// At least one of `email` / `phone` is always present.
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<Email>,
    pub phone: Option<Phone>,
    pub password_hash: HashedPassword,
    pub role: UserRole,
    pub status: UserStatus,
    pub terms_agreed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new active customer
    pub fn new(
        first_name: String,
        last_name: String,
        email: Option<Email>,
        phone: Option<Phone>,
        password_hash: HashedPassword,
        terms_agreed: bool,
    ) -> Self {
        let now = Utc::now();

        Self {
            user_id: UserId::new(),
            first_name,
            last_name,
            email,
            phone,
            password_hash,
            role: UserRole::CUSTOMER,
            status: UserStatus::Active,
            terms_agreed,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if user can login
    pub fn can_login(&self) -> bool {
        self.status.can_login()
    }

    /// Whether this user is reachable under the given identity
    pub fn matches(&self, identity: &Identity) -> bool {
        match identity {
            Identity::Email(e) => self.email.as_ref() == Some(e),
            Identity::Phone(p) => self.phone.as_ref() == Some(p),
        }
    }

    /// Preferred out-of-band contact, e-mail first
    pub fn primary_identity(&self) -> Option<Identity> {
        self.email
            .clone()
            .map(Identity::Email)
            .or_else(|| self.phone.clone().map(Identity::Phone))
    }
}
