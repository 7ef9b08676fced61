use crate::{
    auth::roles,
    db::DbPool,
    entities::organization::{self, Entity as OrganizationEntity},
    entities::user::{self, Entity as UserEntity},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateOrganizationRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 1, max = 64))]
    pub slug: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 120))]
    pub display_name: String,
    pub role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateUserRoleRequest {
    pub role: String,
}

/// Organizations and their members.
#[derive(Clone)]
pub struct AccountService {
    db_pool: Arc<DbPool>,
}

impl AccountService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, request))]
    pub async fn create_organization(
        &self,
        request: CreateOrganizationRequest,
    ) -> Result<organization::Model, ServiceError> {
        request.validate()?;

        let duplicate = OrganizationEntity::find()
            .filter(organization::Column::Slug.eq(request.slug.clone()))
            .one(&*self.db_pool)
            .await?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(format!(
                "organization slug '{}' is taken",
                request.slug
            )));
        }

        let model = organization::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            slug: Set(request.slug),
            status: Set("active".to_string()),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };
        let saved = model.insert(&*self.db_pool).await?;
        info!(org_id = %saved.id, "organization created");
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn get_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<organization::Model, ServiceError> {
        OrganizationEntity::find_by_id(organization_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Organization {organization_id} not found"))
            })
    }

    #[instrument(skip(self, request), fields(org_id = %organization_id))]
    pub async fn create_user(
        &self,
        organization_id: Uuid,
        request: CreateUserRequest,
    ) -> Result<user::Model, ServiceError> {
        request.validate()?;

        let role = request.role.unwrap_or_else(|| roles::STAFF.to_string());
        validate_role(&role)?;

        let duplicate = UserEntity::find()
            .filter(user::Column::OrganizationId.eq(organization_id))
            .filter(user::Column::Email.eq(request.email.clone()))
            .one(&*self.db_pool)
            .await?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(format!(
                "user with email '{}' already exists",
                request.email
            )));
        }

        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(organization_id),
            email: Set(request.email),
            display_name: Set(request.display_name),
            role: Set(role),
            status: Set("active".to_string()),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };
        let saved = model.insert(&*self.db_pool).await?;
        info!(user_id = %saved.id, "user created");
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn get_user(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<user::Model, ServiceError> {
        UserEntity::find_by_id(user_id)
            .filter(user::Column::OrganizationId.eq(organization_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {user_id} not found")))
    }

    #[instrument(skip(self))]
    pub async fn list_users(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<user::Model>, ServiceError> {
        let users = UserEntity::find()
            .filter(user::Column::OrganizationId.eq(organization_id))
            .order_by_asc(user::Column::DisplayName)
            .all(&*self.db_pool)
            .await?;
        Ok(users)
    }

    #[instrument(skip(self))]
    pub async fn update_user_role(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        request: UpdateUserRoleRequest,
    ) -> Result<user::Model, ServiceError> {
        validate_role(&request.role)?;
        let existing = self.get_user(organization_id, user_id).await?;

        let mut active: user::ActiveModel = existing.into();
        active.role = Set(request.role);
        active.updated_at = Set(Some(Utc::now()));
        Ok(active.update(&*self.db_pool).await?)
    }
}

fn validate_role(role: &str) -> Result<(), ServiceError> {
    if [roles::ADMIN, roles::MANAGER, roles::STAFF].contains(&role) {
        Ok(())
    } else {
        Err(ServiceError::ValidationError(format!(
            "unknown role '{role}'"
        )))
    }
}
