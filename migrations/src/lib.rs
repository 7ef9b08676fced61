pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_organizations_table;
mod m20250301_000002_create_users_table;
mod m20250301_000003_create_locations_table;
mod m20250301_000004_create_bookings_table;
mod m20250301_000005_create_event_instances_table;
mod m20250308_000006_create_kits_table;
mod m20250308_000007_create_kit_instances_table;
mod m20250315_000008_create_staff_assignments_table;
mod m20250322_000009_create_audit_logs_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_organizations_table::Migration),
            Box::new(m20250301_000002_create_users_table::Migration),
            Box::new(m20250301_000003_create_locations_table::Migration),
            Box::new(m20250301_000004_create_bookings_table::Migration),
            Box::new(m20250301_000005_create_event_instances_table::Migration),
            Box::new(m20250308_000006_create_kits_table::Migration),
            Box::new(m20250308_000007_create_kit_instances_table::Migration),
            Box::new(m20250315_000008_create_staff_assignments_table::Migration),
            Box::new(m20250322_000009_create_audit_logs_table::Migration),
        ]
    }
}
