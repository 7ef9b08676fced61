pub mod accounts;
pub mod audit;
pub mod bookings;
pub mod kits;
pub mod locations;
pub mod staff;

pub use accounts::AccountService;
pub use audit::AuditService;
pub use bookings::BookingService;
pub use kits::KitService;
pub use locations::LocationService;
pub use staff::StaffService;
