use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use validator::Validate;

/// Booking lifecycle states. Stored as lowercase strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Completed,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub organization_id: Uuid,
    pub location_id: Uuid,

    #[validate(length(min = 1, max = 200))]
    pub title: String,

    pub notes: Option<String>,
    pub requested_by: Uuid,
    pub status: String,
    pub start_date: Date,

    #[validate(range(min = 15, max = 1440))]
    pub duration_minutes: i32,

    /// Normalized recurrence rule string; None for one-off bookings.
    pub recurrence_rule: Option<String>,

    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::organization::Entity",
        from = "Column::OrganizationId",
        to = "super::organization::Column::Id"
    )]
    Organization,
    #[sea_orm(
        belongs_to = "super::location::Entity",
        from = "Column::LocationId",
        to = "super::location::Column::Id"
    )]
    Location,
    #[sea_orm(has_many = "super::event_instance::Entity")]
    EventInstances,
    #[sea_orm(has_many = "super::staff_assignment::Entity")]
    StaffAssignments,
}

impl Related<super::organization::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organization.def()
    }
}

impl Related<super::location::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Location.def()
    }
}

impl Related<super::event_instance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EventInstances.def()
    }
}

impl Related<super::staff_assignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StaffAssignments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
