use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Bookings::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Bookings::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(Bookings::OrganizationId).uuid().not_null())
                    .col(ColumnDef::new(Bookings::LocationId).uuid().not_null())
                    .col(ColumnDef::new(Bookings::Title).string().not_null())
                    .col(ColumnDef::new(Bookings::Notes).text().null())
                    .col(ColumnDef::new(Bookings::RequestedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(Bookings::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Bookings::StartDate).date().not_null())
                    .col(
                        ColumnDef::new(Bookings::DurationMinutes)
                            .integer()
                            .not_null()
                            .default(60),
                    )
                    .col(ColumnDef::new(Bookings::RecurrenceRule).string().null())
                    .col(ColumnDef::new(Bookings::ApprovedBy).uuid().null())
                    .col(ColumnDef::new(Bookings::ApprovedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Bookings::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Bookings::UpdatedAt).timestamp_with_time_zone().null())
                    .col(
                        ColumnDef::new(Bookings::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_bookings_org_status")
                    .table(Bookings::Table)
                    .col(Bookings::OrganizationId)
                    .col(Bookings::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_bookings_location")
                    .table(Bookings::Table)
                    .col(Bookings::LocationId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Bookings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Bookings {
    Table,
    Id,
    OrganizationId,
    LocationId,
    Title,
    Notes,
    RequestedBy,
    Status,
    StartDate,
    DurationMinutes,
    RecurrenceRule,
    ApprovedBy,
    ApprovedAt,
    CreatedAt,
    UpdatedAt,
    Version,
}
