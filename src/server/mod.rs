pub mod dispatcher;

#[cfg(feature = "rtu-server")]
pub mod rtu;

#[cfg(feature = "tcp-server")]
pub mod tcp;

#[cfg(feature = "tls")]
pub mod tls;

pub(crate) mod service;

pub use dispatcher::Dispatcher;
pub use service::{NewService, Service};
