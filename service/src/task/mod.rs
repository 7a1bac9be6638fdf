//! Background [`Task`]s definitions.

mod background;
pub mod expire_registrations;
pub mod otp_cooldown;

pub use common::Handler as Task;

pub use self::{
    background::{Background, Stopped},
    expire_registrations::ExpireRegistrations,
    otp_cooldown::OtpCooldown,
};
