//! Order routing: order persistence port and the router service.

pub mod ports;
pub mod service;

pub use ports::OrderRepository;
pub use service::OrderRouter;
