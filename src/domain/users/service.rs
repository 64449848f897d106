//! Users service.

use async_trait::async_trait;
use mockall::automock;
use sqlx::PgPool;

use crate::domain::users::{
    errors::UsersServiceError,
    models::{NewUser, User, UserId},
    repository::PgUsersRepository,
};

#[derive(Debug, Clone)]
pub struct PgUsersService {
    repository: PgUsersRepository,
}

impl PgUsersService {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: PgUsersRepository::new(pool),
        }
    }
}

#[async_trait]
impl UsersService for PgUsersService {
    async fn create_user(&self, user: NewUser) -> Result<User, UsersServiceError> {
        let created = self.repository.create_user(user).await?;

        Ok(created)
    }

    async fn get_user(&self, user: UserId) -> Result<User, UsersServiceError> {
        let user = self.repository.get_user(user).await?;

        Ok(user)
    }
}

#[automock]
#[async_trait]
pub trait UsersService: Send + Sync {
    /// Creates a new user row.
    async fn create_user(&self, user: NewUser) -> Result<User, UsersServiceError>;

    /// Retrieve a single user.
    async fn get_user(&self, user: UserId) -> Result<User, UsersServiceError>;
}
