use std::sync::Arc;

use crate::services::{
    AccountService, AuditService, BookingService, KitService, LocationService, StaffService,
};

pub mod accounts;
pub mod audit;
pub mod bookings;
pub mod health;
pub mod kits;
pub mod locations;
pub mod staff;

/// All domain services, cloned cheaply into handlers via AppState.
#[derive(Clone)]
pub struct AppServices {
    pub accounts: Arc<AccountService>,
    pub audit: Arc<AuditService>,
    pub bookings: Arc<BookingService>,
    pub kits: Arc<KitService>,
    pub locations: Arc<LocationService>,
    pub staff: Arc<StaffService>,
}
