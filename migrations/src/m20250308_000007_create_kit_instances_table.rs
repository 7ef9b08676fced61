use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(KitInstances::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(KitInstances::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(KitInstances::KitId).uuid().not_null())
                    .col(
                        ColumnDef::new(KitInstances::OrganizationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(KitInstances::SerialNumber)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(KitInstances::Condition)
                            .string()
                            .not_null()
                            .default("good"),
                    )
                    .col(ColumnDef::new(KitInstances::LocationId).uuid().null())
                    .col(ColumnDef::new(KitInstances::AssignedBookingId).uuid().null())
                    .col(
                        ColumnDef::new(KitInstances::Status)
                            .string()
                            .not_null()
                            .default("available"),
                    )
                    .col(
                        ColumnDef::new(KitInstances::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(KitInstances::UpdatedAt).timestamp_with_time_zone().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_kit_instances_kit_serial")
                    .table(KitInstances::Table)
                    .col(KitInstances::KitId)
                    .col(KitInstances::SerialNumber)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(KitInstances::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum KitInstances {
    Table,
    Id,
    KitId,
    OrganizationId,
    SerialNumber,
    Condition,
    LocationId,
    AssignedBookingId,
    Status,
    CreatedAt,
    UpdatedAt,
}
