use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Kits::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Kits::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(Kits::OrganizationId).uuid().not_null())
                    .col(ColumnDef::new(Kits::Name).string().not_null())
                    .col(ColumnDef::new(Kits::Description).text().null())
                    .col(
                        ColumnDef::new(Kits::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(ColumnDef::new(Kits::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Kits::UpdatedAt).timestamp_with_time_zone().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_kits_org")
                    .table(Kits::Table)
                    .col(Kits::OrganizationId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Kits::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Kits {
    Table,
    Id,
    OrganizationId,
    Name,
    Description,
    Status,
    CreatedAt,
    UpdatedAt,
}
