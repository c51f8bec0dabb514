pub mod bookings;
pub mod channels;
pub mod payment_webhooks;
pub mod properties;

use std::sync::Arc;

use crate::services::{
    bookings::BookingService, catalog::CatalogService, channel_sync::ChannelSyncService,
    coupons::CouponService, expiry::ExpiryService, inventory::InventoryService,
    payments::PaymentService, pricing::PricingService,
};

/// Service container shared through the router state.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub pricing: Arc<PricingService>,
    pub inventory: Arc<InventoryService>,
    pub coupons: Arc<CouponService>,
    pub bookings: Arc<BookingService>,
    pub payments: Arc<PaymentService>,
    pub expiry: Arc<ExpiryService>,
    pub channel_sync: Arc<ChannelSyncService>,
}
