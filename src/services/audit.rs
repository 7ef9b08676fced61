use crate::{
    db::DbPool,
    entities::audit_log::{self, Entity as AuditLogEntity},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct AuditQuery {
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub actor_id: Option<Uuid>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuditPage {
    pub entries: Vec<audit_log::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Append-only audit trail. Writes are best-effort so a logging hiccup never
/// fails the operation being audited.
#[derive(Clone)]
pub struct AuditService {
    db_pool: Arc<DbPool>,
}

impl AuditService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, detail), fields(org_id = %organization_id, action))]
    pub async fn record(
        &self,
        organization_id: Uuid,
        actor_id: Option<Uuid>,
        action: &str,
        entity_type: &str,
        entity_id: Option<Uuid>,
        detail: Option<serde_json::Value>,
    ) {
        let model = audit_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(organization_id),
            actor_id: Set(actor_id),
            action: Set(action.to_string()),
            entity_type: Set(entity_type.to_string()),
            entity_id: Set(entity_id),
            detail: Set(detail),
            created_at: Set(Utc::now()),
        };
        if let Err(e) = model.insert(&*self.db_pool).await {
            warn!(action, error = %e, "failed to record audit entry");
        }
    }

    #[instrument(skip(self))]
    pub async fn query(
        &self,
        organization_id: Uuid,
        query: AuditQuery,
    ) -> Result<AuditPage, ServiceError> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(50).clamp(1, 200);

        let mut find = AuditLogEntity::find()
            .filter(audit_log::Column::OrganizationId.eq(organization_id))
            .order_by_desc(audit_log::Column::CreatedAt);
        if let Some(action) = query.action {
            find = find.filter(audit_log::Column::Action.eq(action));
        }
        if let Some(entity_type) = query.entity_type {
            find = find.filter(audit_log::Column::EntityType.eq(entity_type));
        }
        if let Some(actor_id) = query.actor_id {
            find = find.filter(audit_log::Column::ActorId.eq(actor_id));
        }

        let paginator = find.paginate(&*self.db_pool, per_page);
        let total = paginator.num_items().await?;
        let entries = paginator.fetch_page(page - 1).await?;

        Ok(AuditPage {
            entries,
            total,
            page,
            per_page,
        })
    }
}
