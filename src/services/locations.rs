use crate::{
    db::DbPool,
    entities::location::{self, Entity as LocationEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateLocationRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateLocationRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub timezone: Option<String>,
    pub status: Option<String>,
}

#[derive(Clone)]
pub struct LocationService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl LocationService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self, request), fields(org_id = %organization_id))]
    pub async fn create_location(
        &self,
        organization_id: Uuid,
        request: CreateLocationRequest,
    ) -> Result<location::Model, ServiceError> {
        request.validate()?;

        let model = location::ActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(organization_id),
            name: Set(request.name),
            address: Set(request.address),
            city: Set(request.city),
            region: Set(request.region),
            timezone: Set(request.timezone),
            status: Set("active".to_string()),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };
        let saved = model.insert(&*self.db_pool).await?;
        info!(location_id = %saved.id, "location created");

        if let Err(e) = self
            .event_sender
            .send(Event::LocationCreated {
                location_id: saved.id,
                organization_id,
            })
            .await
        {
            error!(error = %e, "failed to emit event");
        }
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn get_location(
        &self,
        organization_id: Uuid,
        location_id: Uuid,
    ) -> Result<location::Model, ServiceError> {
        LocationEntity::find_by_id(location_id)
            .filter(location::Column::OrganizationId.eq(organization_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Location {location_id} not found")))
    }

    #[instrument(skip(self))]
    pub async fn list_locations(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<location::Model>, ServiceError> {
        let locations = LocationEntity::find()
            .filter(location::Column::OrganizationId.eq(organization_id))
            .order_by_asc(location::Column::Name)
            .all(&*self.db_pool)
            .await?;
        Ok(locations)
    }

    #[instrument(skip(self, request))]
    pub async fn update_location(
        &self,
        organization_id: Uuid,
        location_id: Uuid,
        request: UpdateLocationRequest,
    ) -> Result<location::Model, ServiceError> {
        request.validate()?;
        let existing = self.get_location(organization_id, location_id).await?;

        let mut active: location::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(address) = request.address {
            active.address = Set(Some(address));
        }
        if let Some(city) = request.city {
            active.city = Set(Some(city));
        }
        if let Some(region) = request.region {
            active.region = Set(Some(region));
        }
        if let Some(timezone) = request.timezone {
            active.timezone = Set(Some(timezone));
        }
        if let Some(status) = request.status {
            active.status = Set(status);
        }
        active.updated_at = Set(Some(Utc::now()));

        Ok(active.update(&*self.db_pool).await?)
    }
}
