//! Domain definitions.

pub mod catalog;
pub mod confirmation;
pub mod otp;
pub mod registration;
pub mod selection;
pub mod session;
pub mod shift;
pub mod staff;
pub mod stage;
pub mod stoppage;

pub use self::{
    catalog::Catalog, registration::Registration, selection::Selection,
    shift::Shift, stage::Stage, stoppage::Stoppage,
};
