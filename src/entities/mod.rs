pub mod audit_log;
pub mod booking;
pub mod event_instance;
pub mod kit;
pub mod kit_instance;
pub mod location;
pub mod organization;
pub mod staff_assignment;
pub mod user;
