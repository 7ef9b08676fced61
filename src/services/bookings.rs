use crate::{
    db::{self, DbPool},
    entities::booking::{self, BookingStatus, Entity as BookingEntity},
    entities::event_instance::{self, EventInstanceStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    message_queue::{self, Message, MessageQueue},
    recurrence,
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub location_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub notes: Option<String>,
    pub start_date: NaiveDate,
    #[validate(range(min = 15, max = 1440))]
    pub duration_minutes: i32,
    pub recurrence_rule: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateBookingRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub notes: Option<String>,
    pub start_date: Option<NaiveDate>,
    #[validate(range(min = 15, max = 1440))]
    pub duration_minutes: Option<i32>,
    pub recurrence_rule: Option<String>,
    pub version: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub location_id: Uuid,
    pub title: String,
    pub notes: Option<String>,
    pub requested_by: Uuid,
    pub status: String,
    pub start_date: NaiveDate,
    pub duration_minutes: i32,
    pub recurrence_rule: Option<String>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

impl From<booking::Model> for BookingResponse {
    fn from(m: booking::Model) -> Self {
        Self {
            id: m.id,
            organization_id: m.organization_id,
            location_id: m.location_id,
            title: m.title,
            notes: m.notes,
            requested_by: m.requested_by,
            status: m.status,
            start_date: m.start_date,
            duration_minutes: m.duration_minutes,
            recurrence_rule: m.recurrence_rule,
            approved_by: m.approved_by,
            approved_at: m.approved_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
            version: m.version,
        }
    }
}

/// Optional list filters; all combine with AND.
#[derive(Debug, Default)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub location_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookingListResponse {
    pub bookings: Vec<BookingResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub booking: BookingResponse,
    pub events_generated: usize,
    pub first_event: Option<NaiveDate>,
    pub last_event: Option<NaiveDate>,
}

/// What the approval transaction hands back once committed.
#[derive(Debug)]
struct ApprovalOutcome {
    booking: booking::Model,
    generated: Vec<NaiveDate>,
}

/// Booking lifecycle: request, approve, reject, cancel, and the event
/// instances materialized at approval time.
#[derive(Clone)]
pub struct BookingService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    queue: Arc<dyn MessageQueue>,
    tx_max_attempts: u32,
    publish_max_attempts: u32,
    publish_retry_delay: Duration,
}

impl BookingService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        queue: Arc<dyn MessageQueue>,
        tx_max_attempts: u32,
        publish_max_attempts: u32,
        publish_retry_delay: Duration,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            queue,
            tx_max_attempts,
            publish_max_attempts,
            publish_retry_delay,
        }
    }

    #[instrument(skip(self, request), fields(org_id = %organization_id, title = %request.title))]
    pub async fn create_booking(
        &self,
        organization_id: Uuid,
        requested_by: Uuid,
        request: CreateBookingRequest,
    ) -> Result<BookingResponse, ServiceError> {
        request.validate()?;

        if let Some(rule) = request.recurrence_rule.as_deref() {
            // A malformed rule is stored as-is and degrades to a single
            // occurrence at approval time, but the requester gets a heads-up.
            if let Err(e) = recurrence::parse_rule(rule) {
                warn!(rule, error = %e, "booking created with unparseable recurrence rule");
            }
        }

        let now = Utc::now();
        let model = booking::ActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(organization_id),
            location_id: Set(request.location_id),
            title: Set(request.title),
            notes: Set(request.notes),
            requested_by: Set(requested_by),
            status: Set(BookingStatus::Pending.to_string()),
            start_date: Set(request.start_date),
            duration_minutes: Set(request.duration_minutes),
            recurrence_rule: Set(request.recurrence_rule),
            approved_by: Set(None),
            approved_at: Set(None),
            created_at: Set(now),
            updated_at: Set(None),
            version: Set(1),
        };

        let saved = model.insert(&*self.db_pool).await?;
        info!(booking_id = %saved.id, "booking created");

        self.emit(Event::BookingCreated {
            booking_id: saved.id,
            organization_id,
        })
        .await;

        Ok(saved.into())
    }

    #[instrument(skip(self))]
    pub async fn get_booking(
        &self,
        organization_id: Uuid,
        booking_id: Uuid,
    ) -> Result<BookingResponse, ServiceError> {
        let found = BookingEntity::find_by_id(booking_id)
            .filter(booking::Column::OrganizationId.eq(organization_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {booking_id} not found")))?;
        Ok(found.into())
    }

    #[instrument(skip(self))]
    pub async fn list_bookings(
        &self,
        organization_id: Uuid,
        filter: BookingFilter,
        page: u64,
        per_page: u64,
    ) -> Result<BookingListResponse, ServiceError> {
        let mut query = BookingEntity::find()
            .filter(booking::Column::OrganizationId.eq(organization_id))
            .order_by_desc(booking::Column::CreatedAt);
        if let Some(status) = filter.status {
            query = query.filter(booking::Column::Status.eq(status.to_string()));
        }
        if let Some(location_id) = filter.location_id {
            query = query.filter(booking::Column::LocationId.eq(location_id));
        }
        if let Some(from) = filter.from {
            query = query.filter(booking::Column::StartDate.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(booking::Column::StartDate.lte(to));
        }

        let paginator = query.paginate(&*self.db_pool, per_page);
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(BookingListResponse {
            bookings: models.into_iter().map(Into::into).collect(),
            total,
            page,
            per_page,
        })
    }

    #[instrument(skip(self, request))]
    pub async fn update_booking(
        &self,
        organization_id: Uuid,
        booking_id: Uuid,
        request: UpdateBookingRequest,
    ) -> Result<BookingResponse, ServiceError> {
        request.validate()?;

        let existing = BookingEntity::find_by_id(booking_id)
            .filter(booking::Column::OrganizationId.eq(organization_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {booking_id} not found")))?;

        if existing.status != BookingStatus::Pending.to_string() {
            return Err(ServiceError::InvalidStatus(format!(
                "only pending bookings can be edited, booking is {}",
                existing.status
            )));
        }

        let mut active = <booking::ActiveModel as std::default::Default>::default();
        if let Some(title) = request.title {
            active.title = Set(title);
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        if let Some(start_date) = request.start_date {
            active.start_date = Set(start_date);
        }
        if let Some(duration) = request.duration_minutes {
            active.duration_minutes = Set(duration);
        }
        if let Some(rule) = request.recurrence_rule {
            active.recurrence_rule = Set(Some(rule));
        }
        active.version = Set(request.version + 1);
        active.updated_at = Set(Some(Utc::now()));

        // The version and status predicates make the write atomic: a
        // concurrent editor or approver flips them first and this UPDATE
        // then matches zero rows.
        let result = BookingEntity::update_many()
            .set(active)
            .filter(booking::Column::Id.eq(booking_id))
            .filter(booking::Column::OrganizationId.eq(organization_id))
            .filter(booking::Column::Version.eq(request.version))
            .filter(booking::Column::Status.eq(BookingStatus::Pending.to_string()))
            .exec(&*self.db_pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(booking_id));
        }

        let updated = BookingEntity::find_by_id(booking_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {booking_id} not found")))?;
        Ok(updated.into())
    }

    /// Approves a pending booking and, unless suppressed, materializes one
    /// event instance per occurrence of its recurrence rule.
    ///
    /// Runs in a transaction with bounded retry so transient database
    /// failures cannot commit the status flip without its event rows.
    /// Post-commit notifications are best-effort.
    #[instrument(skip(self), fields(booking_id = %booking_id, approver = %approver_id))]
    pub async fn approve_booking(
        &self,
        organization_id: Uuid,
        booking_id: Uuid,
        approver_id: Uuid,
        generate_events: bool,
    ) -> Result<ApprovalResponse, ServiceError> {
        let outcome = db::transaction_with_retry(&self.db_pool, self.tx_max_attempts, move |txn| {
            Box::pin(async move {
                let existing = BookingEntity::find_by_id(booking_id)
                    .filter(booking::Column::OrganizationId.eq(organization_id))
                    .one(txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Booking {booking_id} not found"))
                    })?;

                if existing.status != BookingStatus::Pending.to_string() {
                    return Err(ServiceError::InvalidStatus(format!(
                        "booking is {}, only pending bookings can be approved",
                        existing.status
                    )));
                }

                let start_date = existing.start_date;
                let location_id = existing.location_id;
                let rule = existing.recurrence_rule.clone();
                let version = existing.version;

                let mut active: booking::ActiveModel = existing.into();
                active.status = Set(BookingStatus::Approved.to_string());
                active.approved_by = Set(Some(approver_id));
                active.approved_at = Set(Some(Utc::now()));
                active.updated_at = Set(Some(Utc::now()));
                active.version = Set(version + 1);
                let booking = active.update(txn).await?;

                let generated = if generate_events {
                    let dates = recurrence::expand_or_single(start_date, rule.as_deref());
                    let now = Utc::now();
                    let rows: Vec<event_instance::ActiveModel> = dates
                        .iter()
                        .map(|d| event_instance::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            booking_id: Set(booking_id),
                            organization_id: Set(organization_id),
                            location_id: Set(location_id),
                            occurs_on: Set(*d),
                            status: Set(EventInstanceStatus::Scheduled.to_string()),
                            created_at: Set(now),
                        })
                        .collect();
                    if !rows.is_empty() {
                        event_instance::Entity::insert_many(rows).exec(txn).await?;
                    }
                    dates
                } else {
                    Vec::new()
                };

                Ok(ApprovalOutcome { booking, generated })
            })
        })
        .await?;

        let events_generated = outcome.generated.len();
        info!(events_generated, "booking approved");

        self.emit(Event::BookingApproved {
            booking_id,
            organization_id,
            approved_by: approver_id,
            events_generated,
        })
        .await;
        if events_generated > 0 {
            self.emit(Event::EventInstancesGenerated {
                booking_id,
                count: events_generated,
                first_date: outcome.generated.first().copied(),
                last_date: outcome.generated.last().copied(),
            })
            .await;
        }
        self.publish_best_effort(
            "bookings.approved",
            serde_json::json!({
                "booking_id": booking_id,
                "organization_id": organization_id,
                "approved_by": approver_id,
                "events_generated": events_generated,
            }),
        )
        .await;

        Ok(ApprovalResponse {
            first_event: outcome.generated.first().copied(),
            last_event: outcome.generated.last().copied(),
            events_generated,
            booking: outcome.booking.into(),
        })
    }

    #[instrument(skip(self))]
    pub async fn reject_booking(
        &self,
        organization_id: Uuid,
        booking_id: Uuid,
        rejected_by: Uuid,
    ) -> Result<BookingResponse, ServiceError> {
        let updated = self
            .transition(
                organization_id,
                booking_id,
                &[BookingStatus::Pending],
                BookingStatus::Rejected,
            )
            .await?;
        info!(rejected_by = %rejected_by, "booking rejected");
        self.emit(Event::BookingRejected {
            booking_id,
            organization_id,
        })
        .await;
        Ok(updated.into())
    }

    #[instrument(skip(self))]
    pub async fn cancel_booking(
        &self,
        organization_id: Uuid,
        booking_id: Uuid,
    ) -> Result<BookingResponse, ServiceError> {
        let updated = self
            .transition(
                organization_id,
                booking_id,
                &[BookingStatus::Pending, BookingStatus::Approved],
                BookingStatus::Cancelled,
            )
            .await?;
        self.emit(Event::BookingCancelled {
            booking_id,
            organization_id,
        })
        .await;
        Ok(updated.into())
    }

    #[instrument(skip(self))]
    pub async fn list_event_instances(
        &self,
        organization_id: Uuid,
        booking_id: Uuid,
    ) -> Result<Vec<event_instance::Model>, ServiceError> {
        // Existence check keeps a wrong-org booking id indistinguishable
        // from a missing one.
        self.get_booking(organization_id, booking_id).await?;
        let instances = event_instance::Entity::find()
            .filter(event_instance::Column::BookingId.eq(booking_id))
            .order_by_asc(event_instance::Column::OccursOn)
            .all(&*self.db_pool)
            .await?;
        Ok(instances)
    }

    async fn transition(
        &self,
        organization_id: Uuid,
        booking_id: Uuid,
        from: &[BookingStatus],
        to: BookingStatus,
    ) -> Result<booking::Model, ServiceError> {
        let existing = BookingEntity::find_by_id(booking_id)
            .filter(booking::Column::OrganizationId.eq(organization_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {booking_id} not found")))?;

        if !from.iter().any(|s| s.to_string() == existing.status) {
            return Err(ServiceError::InvalidStatus(format!(
                "cannot move booking from {} to {}",
                existing.status, to
            )));
        }

        let version = existing.version;
        let mut active: booking::ActiveModel = existing.into();
        active.status = Set(to.to_string());
        active.updated_at = Set(Some(Utc::now()));
        active.version = Set(version + 1);
        Ok(active.update(&*self.db_pool).await?)
    }

    /// In-process notification, logged and swallowed on failure.
    async fn emit(&self, event: Event) {
        if let Err(e) = self.event_sender.send(event).await {
            error!(error = %e, "failed to emit event");
        }
    }

    /// Queue publish with bounded retry, logged and swallowed on failure.
    async fn publish_best_effort(&self, topic: &str, payload: serde_json::Value) {
        let message = Message::new(topic, payload);
        if let Err(e) = message_queue::publish_with_retry(
            self.queue.as_ref(),
            message,
            self.publish_max_attempts,
            self.publish_retry_delay,
        )
        .await
        {
            error!(topic, error = %e, "failed to publish message after retries");
        }
    }
}
