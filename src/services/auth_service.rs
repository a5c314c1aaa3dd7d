use crate::entities::{
    refresh_token_entity as refresh_tokens, role_entity as roles, user_entity as users,
};
use crate::error::{AppError, AppResult};
use crate::models::{AuthResponse, LoginRequest, RegisterRequest, UserResponse};
use crate::services::user_service::{
    assign_roles, ensure_email_free, role_slugs, validate_person_name,
};
use crate::utils::{
    JwtService, hash_password, normalize_email, validate_email, validate_password,
    verify_password,
};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, Set, TransactionTrait,
};
use std::sync::Arc;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Clone)]
pub struct AuthService {
    pool: Arc<DatabaseConnection>,
    jwt_service: JwtService,
}

impl AuthService {
    pub fn new(pool: Arc<DatabaseConnection>, jwt_service: JwtService) -> Self {
        Self { pool, jwt_service }
    }

    /// Creates a customer account.
    pub async fn register(&self, request: RegisterRequest) -> AppResult<UserResponse> {
        let name = validate_person_name("Name", &request.name)?;
        let surname = validate_person_name("Surname", &request.surname)?;
        let email = normalize_email(&request.email);
        validate_email(&email)?;
        validate_password(&request.password)?;
        let password_hash = hash_password(&request.password)?;

        let txn = self.pool.begin().await?;
        ensure_email_free(&txn, &email, None).await?;

        let user = users::ActiveModel {
            name: Set(name),
            surname: Set(surname),
            email: Set(email),
            password_hash: Set(password_hash),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        assign_roles(&txn, user.id, &[roles::CUSTOMER.to_string()]).await?;

        txn.commit().await?;
        log::info!("User {} registered", user.id);

        Ok(UserResponse::new(user, vec![roles::CUSTOMER.to_string()]))
    }

    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthResponse> {
        let email = normalize_email(&request.email);

        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email.as_str()))
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::AuthError(INVALID_CREDENTIALS.to_string()))?;

        if !verify_password(&request.password, &user.password_hash)? {
            log::warn!("Failed login for user {}", user.id);
            return Err(AppError::AuthError(INVALID_CREDENTIALS.to_string()));
        }

        let txn = self.pool.begin().await?;
        let response = self.issue_tokens(&txn, user).await?;
        txn.commit().await?;
        Ok(response)
    }

    /// Exchanges a live refresh token for a new token pair. The presented
    /// token is revoked, so each refresh token works once.
    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<AuthResponse> {
        let claims = self.jwt_service.verify_refresh_token(refresh_token)?;
        let user_id = claims.user_id()?;

        let txn = self.pool.begin().await?;
        let stored = refresh_tokens::Entity::find()
            .filter(refresh_tokens::Column::Jti.eq(claims.jti.as_str()))
            .filter(refresh_tokens::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .filter(|t| t.is_active(Utc::now()))
            .ok_or_else(|| AppError::AuthError("Refresh token is no longer valid".to_string()))?;

        let mut am = stored.into_active_model();
        am.is_revoked = Set(true);
        am.update(&txn).await?;

        let user = users::Entity::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::AuthError("User no longer exists".to_string()))?;

        let response = self.issue_tokens(&txn, user).await?;
        txn.commit().await?;
        Ok(response)
    }

    /// Revokes the given refresh token, or every active one of the user.
    pub async fn logout(&self, user_id: i64, refresh_token: Option<&str>) -> AppResult<()> {
        let mut update = refresh_tokens::Entity::update_many()
            .col_expr(refresh_tokens::Column::IsRevoked, Expr::value(true))
            .filter(refresh_tokens::Column::UserId.eq(user_id))
            .filter(refresh_tokens::Column::IsRevoked.eq(false));

        if let Some(token) = refresh_token {
            let claims = self.jwt_service.verify_refresh_token(token)?;
            if claims.user_id()? != user_id {
                return Err(AppError::AuthError(
                    "Refresh token belongs to another user".to_string(),
                ));
            }
            update = update.filter(refresh_tokens::Column::Jti.eq(claims.jti.as_str()));
        }

        let result = update.exec(&*self.pool).await?;
        log::info!(
            "User {} logged out, {} refresh token(s) revoked",
            user_id,
            result.rows_affected
        );
        Ok(())
    }

    async fn issue_tokens<C: ConnectionTrait>(
        &self,
        conn: &C,
        user: users::Model,
    ) -> AppResult<AuthResponse> {
        let roles = role_slugs(conn, user.id).await?;
        let access = self.jwt_service.generate_access_token(user.id, &roles)?;
        let refresh = self.jwt_service.generate_refresh_token(user.id, &roles)?;

        refresh_tokens::ActiveModel {
            user_id: Set(user.id),
            jti: Set(refresh.jti),
            is_revoked: Set(false),
            expires_at: Set(refresh.expires_at),
            ..Default::default()
        }
        .insert(conn)
        .await?;

        Ok(AuthResponse {
            user: UserResponse::new(user, roles),
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.get_access_token_expires_in(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn jwt() -> JwtService {
        JwtService::new("secret", 600, 3600)
    }

    fn user(password_hash: String) -> users::Model {
        users::Model {
            id: 3,
            name: "Jane".to_string(),
            surname: "Doe".to_string(),
            email: "jane@example.com".to_string(),
            password_hash,
            image_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let hash = hash_password("Password123").unwrap();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user(hash)]])
            .into_connection();

        let err = AuthService::new(Arc::new(db), jwt())
            .login(LoginRequest {
                email: "Jane@Example.com".to_string(),
                password: "Wrong12345".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthError(_)));
    }

    #[tokio::test]
    async fn test_refresh_rejects_revoked_token() {
        let jwt = jwt();
        let issued = jwt.generate_refresh_token(3, &[]).unwrap();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![refresh_tokens::Model {
                id: 1,
                user_id: 3,
                jti: issued.jti.clone(),
                is_revoked: true,
                expires_at: issued.expires_at,
                created_at: None,
            }]])
            .into_connection();

        let err = AuthService::new(Arc::new(db), jwt)
            .refresh_token(&issued.token)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthError(_)));
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let jwt = jwt();
        let access = jwt.generate_access_token(3, &[]).unwrap();
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        assert!(
            AuthService::new(Arc::new(db), jwt)
                .refresh_token(&access.token)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let err = AuthService::new(Arc::new(db), jwt())
            .register(RegisterRequest {
                name: "Jane".to_string(),
                surname: "Doe".to_string(),
                email: "jane@example.com".to_string(),
                password: "short".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
