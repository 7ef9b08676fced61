use crate::{
    db::DbPool,
    entities::booking::{self, BookingStatus},
    entities::staff_assignment::{self, AssignmentStatus, Entity as AssignmentEntity},
    entities::user::{self, Entity as UserEntity},
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
pub struct AssignStaffRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub role_on_site: String,
}

/// Staff assignments against bookings: who works which job.
#[derive(Clone)]
pub struct StaffService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl StaffService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self, request), fields(org_id = %organization_id, booking_id = %booking_id))]
    pub async fn assign(
        &self,
        organization_id: Uuid,
        booking_id: Uuid,
        request: AssignStaffRequest,
    ) -> Result<staff_assignment::Model, ServiceError> {
        request.validate()?;

        let target = booking::Entity::find_by_id(booking_id)
            .filter(booking::Column::OrganizationId.eq(organization_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {booking_id} not found")))?;
        if target.status == BookingStatus::Cancelled.to_string()
            || target.status == BookingStatus::Rejected.to_string()
        {
            return Err(ServiceError::InvalidOperation(format!(
                "cannot assign staff to a {} booking",
                target.status
            )));
        }

        UserEntity::find_by_id(request.user_id)
            .filter(user::Column::OrganizationId.eq(organization_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("User {} not found", request.user_id))
            })?;

        let existing = AssignmentEntity::find()
            .filter(staff_assignment::Column::BookingId.eq(booking_id))
            .filter(staff_assignment::Column::UserId.eq(request.user_id))
            .one(&*self.db_pool)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "user is already assigned to this booking".to_string(),
            ));
        }

        let model = staff_assignment::ActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(organization_id),
            booking_id: Set(booking_id),
            user_id: Set(request.user_id),
            role_on_site: Set(request.role_on_site),
            status: Set(AssignmentStatus::Assigned.to_string()),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };
        let saved = model.insert(&*self.db_pool).await?;
        info!(assignment_id = %saved.id, "staff assigned");

        if let Err(e) = self
            .event_sender
            .send(Event::StaffAssigned {
                booking_id,
                user_id: saved.user_id,
            })
            .await
        {
            error!(error = %e, "failed to emit event");
        }
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn list_for_booking(
        &self,
        organization_id: Uuid,
        booking_id: Uuid,
    ) -> Result<Vec<staff_assignment::Model>, ServiceError> {
        let assignments = AssignmentEntity::find()
            .filter(staff_assignment::Column::OrganizationId.eq(organization_id))
            .filter(staff_assignment::Column::BookingId.eq(booking_id))
            .order_by_asc(staff_assignment::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?;
        Ok(assignments)
    }

    /// The assigned user accepts the job.
    #[instrument(skip(self))]
    pub async fn confirm(
        &self,
        organization_id: Uuid,
        assignment_id: Uuid,
        acting_user: Uuid,
    ) -> Result<staff_assignment::Model, ServiceError> {
        self.respond(
            organization_id,
            assignment_id,
            acting_user,
            AssignmentStatus::Confirmed,
        )
        .await
    }

    /// The assigned user turns the job down.
    #[instrument(skip(self))]
    pub async fn decline(
        &self,
        organization_id: Uuid,
        assignment_id: Uuid,
        acting_user: Uuid,
    ) -> Result<staff_assignment::Model, ServiceError> {
        self.respond(
            organization_id,
            assignment_id,
            acting_user,
            AssignmentStatus::Declined,
        )
        .await
    }

    async fn respond(
        &self,
        organization_id: Uuid,
        assignment_id: Uuid,
        acting_user: Uuid,
        response: AssignmentStatus,
    ) -> Result<staff_assignment::Model, ServiceError> {
        let assignment = AssignmentEntity::find_by_id(assignment_id)
            .filter(staff_assignment::Column::OrganizationId.eq(organization_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Assignment {assignment_id} not found"))
            })?;

        if assignment.user_id != acting_user {
            return Err(ServiceError::Forbidden(
                "only the assigned user can respond to an assignment".to_string(),
            ));
        }
        if assignment.status != AssignmentStatus::Assigned.to_string() {
            return Err(ServiceError::InvalidStatus(format!(
                "assignment already {}",
                assignment.status
            )));
        }

        let mut active: staff_assignment::ActiveModel = assignment.into();
        active.status = Set(response.to_string());
        active.updated_at = Set(Some(Utc::now()));
        Ok(active.update(&*self.db_pool).await?)
    }
}
