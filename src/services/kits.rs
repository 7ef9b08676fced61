use crate::{
    cache::Cache,
    db::DbPool,
    entities::booking::{self, BookingStatus},
    entities::kit::{self, Entity as KitEntity},
    entities::kit_instance::{self, Entity as KitInstanceEntity, KitCondition, KitInstanceStatus},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateKitRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateKitInstanceRequest {
    #[validate(length(min = 1, max = 64))]
    pub serial_number: String,
    pub location_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KitWithInstances {
    pub kit: kit::Model,
    pub instances: Vec<kit_instance::Model>,
}

/// Kit templates and their physical instances.
#[derive(Clone)]
pub struct KitService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    cache: Cache,
}

impl KitService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, cache: Cache) -> Self {
        Self {
            db_pool,
            event_sender,
            cache,
        }
    }

    fn cache_key(organization_id: Uuid, kit_id: Uuid) -> String {
        format!("kit:{organization_id}:{kit_id}")
    }

    #[instrument(skip(self, request), fields(org_id = %organization_id))]
    pub async fn create_kit(
        &self,
        organization_id: Uuid,
        request: CreateKitRequest,
    ) -> Result<kit::Model, ServiceError> {
        request.validate()?;

        let model = kit::ActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(organization_id),
            name: Set(request.name),
            description: Set(request.description),
            status: Set("active".to_string()),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };
        let saved = model.insert(&*self.db_pool).await?;
        info!(kit_id = %saved.id, "kit created");

        if let Err(e) = self
            .event_sender
            .send(Event::KitCreated {
                kit_id: saved.id,
                organization_id,
            })
            .await
        {
            error!(error = %e, "failed to emit event");
        }
        Ok(saved)
    }

    /// Read-through cached lookup of a kit and its instances.
    #[instrument(skip(self))]
    pub async fn get_kit(
        &self,
        organization_id: Uuid,
        kit_id: Uuid,
    ) -> Result<KitWithInstances, ServiceError> {
        let key = Self::cache_key(organization_id, kit_id);
        match self.cache.get_json::<KitWithInstances>(&key).await {
            Ok(Some(cached)) => return Ok(cached),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "cache read failed, falling through"),
        }

        let kit = KitEntity::find_by_id(kit_id)
            .filter(kit::Column::OrganizationId.eq(organization_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Kit {kit_id} not found")))?;
        let instances = KitInstanceEntity::find()
            .filter(kit_instance::Column::KitId.eq(kit_id))
            .order_by_asc(kit_instance::Column::SerialNumber)
            .all(&*self.db_pool)
            .await?;

        let result = KitWithInstances { kit, instances };
        if let Err(e) = self.cache.set_json(&key, &result).await {
            warn!(error = %e, "cache write failed");
        }
        Ok(result)
    }

    #[instrument(skip(self))]
    pub async fn list_kits(&self, organization_id: Uuid) -> Result<Vec<kit::Model>, ServiceError> {
        let kits = KitEntity::find()
            .filter(kit::Column::OrganizationId.eq(organization_id))
            .order_by_asc(kit::Column::Name)
            .all(&*self.db_pool)
            .await?;
        Ok(kits)
    }

    #[instrument(skip(self, request))]
    pub async fn create_instance(
        &self,
        organization_id: Uuid,
        kit_id: Uuid,
        request: CreateKitInstanceRequest,
    ) -> Result<kit_instance::Model, ServiceError> {
        request.validate()?;

        // Instance must hang off a kit in the same organization.
        KitEntity::find_by_id(kit_id)
            .filter(kit::Column::OrganizationId.eq(organization_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Kit {kit_id} not found")))?;

        let model = kit_instance::ActiveModel {
            id: Set(Uuid::new_v4()),
            kit_id: Set(kit_id),
            organization_id: Set(organization_id),
            serial_number: Set(request.serial_number),
            condition: Set("good".to_string()),
            location_id: Set(request.location_id),
            assigned_booking_id: Set(None),
            status: Set(KitInstanceStatus::Available.to_string()),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };
        let saved = model.insert(&*self.db_pool).await?;
        self.invalidate(organization_id, kit_id).await;
        Ok(saved)
    }

    /// Reserves an available instance for an approved booking.
    #[instrument(skip(self))]
    pub async fn assign_instance(
        &self,
        organization_id: Uuid,
        instance_id: Uuid,
        booking_id: Uuid,
    ) -> Result<kit_instance::Model, ServiceError> {
        let instance = KitInstanceEntity::find_by_id(instance_id)
            .filter(kit_instance::Column::OrganizationId.eq(organization_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Kit instance {instance_id} not found"))
            })?;

        if instance.status != KitInstanceStatus::Available.to_string() {
            return Err(ServiceError::InvalidOperation(format!(
                "kit instance is {}, only available instances can be assigned",
                instance.status
            )));
        }

        let target = booking::Entity::find_by_id(booking_id)
            .filter(booking::Column::OrganizationId.eq(organization_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {booking_id} not found")))?;
        if target.status != BookingStatus::Approved.to_string() {
            return Err(ServiceError::InvalidOperation(
                "kit instances can only be assigned to approved bookings".to_string(),
            ));
        }

        let kit_id = instance.kit_id;
        let mut active: kit_instance::ActiveModel = instance.into();
        active.status = Set(KitInstanceStatus::Assigned.to_string());
        active.assigned_booking_id = Set(Some(booking_id));
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db_pool).await?;

        self.invalidate(organization_id, kit_id).await;
        if let Err(e) = self
            .event_sender
            .send(Event::KitInstanceAssigned {
                kit_instance_id: instance_id,
                booking_id,
            })
            .await
        {
            error!(error = %e, "failed to emit event");
        }
        Ok(updated)
    }

    /// Returns an assigned instance to the pool, recording the condition it
    /// came back in. Damaged instances go to maintenance instead of the
    /// available pool.
    #[instrument(skip(self))]
    pub async fn release_instance(
        &self,
        organization_id: Uuid,
        instance_id: Uuid,
        condition: Option<KitCondition>,
    ) -> Result<kit_instance::Model, ServiceError> {
        let instance = KitInstanceEntity::find_by_id(instance_id)
            .filter(kit_instance::Column::OrganizationId.eq(organization_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Kit instance {instance_id} not found"))
            })?;

        if instance.status != KitInstanceStatus::Assigned.to_string() {
            return Err(ServiceError::InvalidOperation(format!(
                "kit instance is {}, only assigned instances can be released",
                instance.status
            )));
        }

        let kit_id = instance.kit_id;
        let next_status = match condition {
            Some(KitCondition::Damaged) => KitInstanceStatus::Maintenance,
            _ => KitInstanceStatus::Available,
        };
        let mut active: kit_instance::ActiveModel = instance.into();
        active.status = Set(next_status.to_string());
        if let Some(condition) = condition {
            active.condition = Set(condition.to_string());
        }
        active.assigned_booking_id = Set(None);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db_pool).await?;
        self.invalidate(organization_id, kit_id).await;
        Ok(updated)
    }

    async fn invalidate(&self, organization_id: Uuid, kit_id: Uuid) {
        let key = Self::cache_key(organization_id, kit_id);
        if let Err(e) = self.cache.invalidate(&key).await {
            warn!(error = %e, "cache invalidation failed");
        }
    }
}
