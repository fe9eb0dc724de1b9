pub mod discount;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod reporting;

pub use discount::{DiscountCalculator, DiscountQuote};
pub use error::BookingError;
pub use gateway::{CallbackStatus, PaymentRequest, PayuCallback, PayuConfig, PayuGateway};
pub use lifecycle::{Actor, BookingService, BookingView, CallbackOutcome, NewBooking, PricingPolicy};
pub use reporting::{BookingStats, TimeRange};
