use std::sync::Arc;

use soy_booking::{BookingService, PayuConfig, PricingPolicy};
use soy_shared::Masked;
use soy_store::app_config::{PayuSettings, PricingSettings};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: Masked<String>,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<BookingService>,
    pub auth: AuthConfig,
    /// Empty allows any origin.
    pub cors_origins: Vec<String>,
}

pub fn payu_config(settings: &PayuSettings) -> PayuConfig {
    PayuConfig {
        merchant_key: settings.merchant_key.clone(),
        salt: settings.salt.clone(),
        payment_url: settings.payment_url.clone(),
        callback_url: settings.callback_url.clone(),
        frontend_url: settings.frontend_url.clone(),
    }
}

pub fn pricing_policy(settings: &PricingSettings) -> PricingPolicy {
    PricingPolicy {
        base_price: settings.base_price,
        referral_discount: settings.referral_discount,
        reference_prefix: settings.reference_prefix.clone(),
    }
}
