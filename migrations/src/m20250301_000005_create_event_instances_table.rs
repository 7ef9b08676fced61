use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EventInstances::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EventInstances::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EventInstances::BookingId).uuid().not_null())
                    .col(
                        ColumnDef::new(EventInstances::OrganizationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EventInstances::LocationId).uuid().not_null())
                    .col(ColumnDef::new(EventInstances::OccursOn).date().not_null())
                    .col(
                        ColumnDef::new(EventInstances::Status)
                            .string()
                            .not_null()
                            .default("scheduled"),
                    )
                    .col(
                        ColumnDef::new(EventInstances::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_event_instances_booking")
                    .table(EventInstances::Table)
                    .col(EventInstances::BookingId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_event_instances_org_date")
                    .table(EventInstances::Table)
                    .col(EventInstances::OrganizationId)
                    .col(EventInstances::OccursOn)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EventInstances::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum EventInstances {
    Table,
    Id,
    BookingId,
    OrganizationId,
    LocationId,
    OccursOn,
    Status,
    CreatedAt,
}
