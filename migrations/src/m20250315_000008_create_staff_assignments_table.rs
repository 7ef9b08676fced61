use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StaffAssignments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StaffAssignments::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StaffAssignments::OrganizationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StaffAssignments::BookingId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StaffAssignments::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(StaffAssignments::RoleOnSite)
                            .string()
                            .not_null()
                            .default("crew"),
                    )
                    .col(
                        ColumnDef::new(StaffAssignments::Status)
                            .string()
                            .not_null()
                            .default("assigned"),
                    )
                    .col(
                        ColumnDef::new(StaffAssignments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StaffAssignments::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_staff_assignments_booking_user")
                    .table(StaffAssignments::Table)
                    .col(StaffAssignments::BookingId)
                    .col(StaffAssignments::UserId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StaffAssignments::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum StaffAssignments {
    Table,
    Id,
    OrganizationId,
    BookingId,
    UserId,
    RoleOnSite,
    Status,
    CreatedAt,
    UpdatedAt,
}
