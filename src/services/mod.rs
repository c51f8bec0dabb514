pub mod bookings;
pub mod catalog;
pub mod channel_sync;
pub mod coupons;
pub mod expiry;
pub mod inventory;
pub mod payments;
pub mod pricing;
