mod customer;
mod entitlement;
mod experiment;
mod invoice;
mod provider;
mod subscription;
mod transfer;
mod virtual_currency;
mod webhook_event;

pub use customer::*;
pub use entitlement::*;
pub use experiment::*;
pub use invoice::*;
pub use provider::*;
pub use subscription::*;
pub use transfer::*;
pub use virtual_currency::*;
pub use webhook_event::*;
