//! External collaborator interfaces.
//!
//! The checkout and order-lifecycle engine talks to two remote systems: the
//! shipping carrier (quotes and bookings) and the hosted payment gateway
//! (redirect URLs and result callbacks). Both are abstracted behind traits so
//! the engine can be tested with fakes.

pub mod payment;
pub mod shipping;

pub use payment::{GatewayResult, HostedGatewayClient, PaymentGateway};
pub use shipping::{
    BookingRequest, CancelResult, CarrierHttpClient, QuoteRequest, ShipmentDetails, ShipmentItem,
    ShippingBooking, ShippingCarrier, ShippingQuote,
};
