pub mod booking;
pub mod booking_room;
pub mod channel_config;
pub mod coupon;
pub mod coupon_usage;
pub mod coupon_user_usage;
pub mod payment_event;
pub mod pricing_rule;
pub mod property;
pub mod room_instance;
pub mod room_unit;
pub mod sync_log;
