use crate::entities::{role_entity as roles, user_entity as users, user_role_entity as user_roles};
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateUserRequest, PaginatedResponse, PaginationParams, UpdateUserRequest, UserQuery,
    UserResponse, non_blank,
};
use crate::services::image_service::ensure_image_exists;
use crate::utils::{hash_password, normalize_email, validate_email, validate_password};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Role slugs of every user in `user_ids`
pub async fn roles_by_user<C: ConnectionTrait>(
    conn: &C,
    user_ids: &[i64],
) -> AppResult<HashMap<i64, Vec<String>>> {
    if user_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let links = user_roles::Entity::find()
        .filter(user_roles::Column::UserId.is_in(user_ids.to_vec()))
        .all(conn)
        .await?;
    if links.is_empty() {
        return Ok(HashMap::new());
    }

    let role_ids: Vec<i64> = links.iter().map(|l| l.role_id).collect();
    let slugs: HashMap<i64, String> = roles::Entity::find()
        .filter(roles::Column::Id.is_in(role_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|r| (r.id, r.slug))
        .collect();

    let mut by_user: HashMap<i64, Vec<String>> = HashMap::new();
    for link in links {
        if let Some(slug) = slugs.get(&link.role_id) {
            by_user.entry(link.user_id).or_default().push(slug.clone());
        }
    }
    for list in by_user.values_mut() {
        list.sort();
    }
    Ok(by_user)
}

pub async fn role_slugs<C: ConnectionTrait>(conn: &C, user_id: i64) -> AppResult<Vec<String>> {
    Ok(roles_by_user(conn, &[user_id])
        .await?
        .remove(&user_id)
        .unwrap_or_default())
}

/// Replaces the user's roles with the given slugs.
pub async fn assign_roles<C: ConnectionTrait>(
    conn: &C,
    user_id: i64,
    slugs: &[String],
) -> AppResult<()> {
    let mut slugs: Vec<String> = slugs.iter().map(|s| s.trim().to_lowercase()).collect();
    slugs.sort();
    slugs.dedup();

    let found = roles::Entity::find()
        .filter(roles::Column::Slug.is_in(slugs.clone()))
        .all(conn)
        .await?;
    if found.len() != slugs.len() {
        return Err(AppError::ValidationError(format!(
            "Unknown role in {slugs:?}"
        )));
    }

    user_roles::Entity::delete_many()
        .filter(user_roles::Column::UserId.eq(user_id))
        .exec(conn)
        .await?;

    if !found.is_empty() {
        user_roles::Entity::insert_many(found.iter().map(|role| user_roles::ActiveModel {
            user_id: Set(user_id),
            role_id: Set(role.id),
            ..Default::default()
        }))
        .exec(conn)
        .await?;
    }
    Ok(())
}

pub(crate) fn validate_person_name(field: &str, value: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() || value.chars().count() > 100 {
        return Err(AppError::ValidationError(format!(
            "{field} must be between 1 and 100 characters"
        )));
    }
    Ok(value.to_string())
}

pub(crate) async fn ensure_email_free<C: ConnectionTrait>(
    conn: &C,
    email: &str,
    except: Option<i64>,
) -> AppResult<()> {
    let mut query = users::Entity::find().filter(users::Column::Email.eq(email));
    if let Some(id) = except {
        query = query.filter(users::Column::Id.ne(id));
    }
    if query.one(conn).await?.is_some() {
        return Err(AppError::ValidationError(
            "Email is already registered".to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct UserService {
    pool: Arc<DatabaseConnection>,
}

impl UserService {
    pub fn new(pool: Arc<DatabaseConnection>) -> Self {
        Self { pool }
    }

    pub async fn list_users(&self, query: &UserQuery) -> AppResult<PaginatedResponse<UserResponse>> {
        let params = PaginationParams::new(query.page, query.limit);

        let mut base = users::Entity::find();
        if let Some(search) = non_blank(&query.search) {
            base = base.filter(
                Condition::any()
                    .add(users::Column::Name.contains(search))
                    .add(users::Column::Surname.contains(search))
                    .add(users::Column::Email.contains(search)),
            );
        }

        let total = base.clone().count(&*self.pool).await? as i64;
        let list = base
            .order_by_asc(users::Column::Id)
            .limit(params.limit() as u64)
            .offset(params.offset() as u64)
            .all(&*self.pool)
            .await?;

        let ids: Vec<i64> = list.iter().map(|u| u.id).collect();
        let mut roles = roles_by_user(&*self.pool, &ids).await?;
        let data = list
            .into_iter()
            .map(|u| {
                let r = roles.remove(&u.id).unwrap_or_default();
                UserResponse::new(u, r)
            })
            .collect();

        Ok(PaginatedResponse::new(data, &params, total))
    }

    pub async fn get_user(&self, id: i64) -> AppResult<UserResponse> {
        let user = self.find(id).await?;
        let roles = role_slugs(&*self.pool, user.id).await?;
        Ok(UserResponse::new(user, roles))
    }

    pub async fn create_user(&self, req: CreateUserRequest) -> AppResult<UserResponse> {
        let name = validate_person_name("Name", &req.name)?;
        let surname = validate_person_name("Surname", &req.surname)?;
        let email = normalize_email(&req.email);
        validate_email(&email)?;
        validate_password(&req.password)?;
        let password_hash = hash_password(&req.password)?;
        let role_list = req
            .roles
            .unwrap_or_else(|| vec![roles::CUSTOMER.to_string()]);

        let txn = self.pool.begin().await?;
        ensure_email_free(&txn, &email, None).await?;
        if let Some(image_id) = req.image_id {
            ensure_image_exists(&txn, image_id).await?;
        }

        let user = users::ActiveModel {
            name: Set(name),
            surname: Set(surname),
            email: Set(email),
            password_hash: Set(password_hash),
            image_id: Set(req.image_id),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        assign_roles(&txn, user.id, &role_list).await?;
        let roles = role_slugs(&txn, user.id).await?;

        txn.commit().await?;
        log::info!("User {} created", user.id);
        Ok(UserResponse::new(user, roles))
    }

    pub async fn update_user(&self, id: i64, req: UpdateUserRequest) -> AppResult<UserResponse> {
        let txn = self.pool.begin().await?;
        let user = users::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))?;

        let mut am = user.into_active_model();
        if let Some(name) = &req.name {
            am.name = Set(validate_person_name("Name", name)?);
        }
        if let Some(surname) = &req.surname {
            am.surname = Set(validate_person_name("Surname", surname)?);
        }
        if let Some(email) = &req.email {
            let email = normalize_email(email);
            validate_email(&email)?;
            ensure_email_free(&txn, &email, Some(id)).await?;
            am.email = Set(email);
        }
        if let Some(password) = &req.password {
            validate_password(password)?;
            am.password_hash = Set(hash_password(password)?);
        }
        if let Some(image_id) = req.image_id {
            ensure_image_exists(&txn, image_id).await?;
            am.image_id = Set(Some(image_id));
        }
        am.updated_at = Set(Some(Utc::now()));
        let user = am.update(&txn).await?;

        if let Some(role_list) = &req.roles {
            assign_roles(&txn, user.id, role_list).await?;
        }
        let roles = role_slugs(&txn, user.id).await?;

        txn.commit().await?;
        Ok(UserResponse::new(user, roles))
    }

    /// Orders, role links and refresh tokens go with the user (FK cascade).
    pub async fn delete_user(&self, id: i64) -> AppResult<()> {
        let user = self.find(id).await?;
        users::Entity::delete_by_id(user.id).exec(&*self.pool).await?;
        log::info!("User {} deleted", user.id);
        Ok(())
    }

    async fn find(&self, id: i64) -> AppResult<users::Model> {
        users::Entity::find_by_id(id)
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn role(id: i64, slug: &str) -> roles::Model {
        roles::Model {
            id,
            name: slug.to_string(),
            slug: slug.to_string(),
            description: None,
            created_at: None,
        }
    }

    fn link(id: i64, user_id: i64, role_id: i64) -> user_roles::Model {
        user_roles::Model { id, user_id, role_id }
    }

    #[test]
    fn test_validate_person_name() {
        assert_eq!(validate_person_name("Name", " Ana ").unwrap(), "Ana");
        assert!(validate_person_name("Name", "").is_err());
    }

    #[tokio::test]
    async fn test_roles_by_user_groups_slugs() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![link(1, 5, 2), link(2, 5, 1), link(3, 6, 3)]])
            .append_query_results([vec![
                role(1, "admin"),
                role(2, "manager"),
                role(3, "customer"),
            ]])
            .into_connection();

        let roles = roles_by_user(&db, &[5, 6]).await.unwrap();
        assert_eq!(roles[&5], vec!["admin".to_string(), "manager".to_string()]);
        assert_eq!(roles[&6], vec!["customer".to_string()]);
    }

    #[tokio::test]
    async fn test_assign_unknown_role() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![role(3, "customer")]])
            .into_connection();

        let err = assign_roles(&db, 1, &["customer".to_string(), "root".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
