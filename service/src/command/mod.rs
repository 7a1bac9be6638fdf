//! [`Command`] definition.

pub mod abandon_registration;
pub mod enter_selection;
pub mod reload_catalog;
pub mod resend_otp;
pub mod send_otp;
pub mod start_registration;
pub mod submit_selection;
pub mod update_selection;
pub mod verify_otp;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    abandon_registration::AbandonRegistration,
    enter_selection::EnterSelection, reload_catalog::ReloadCatalog,
    resend_otp::ResendOtp, send_otp::SendOtp,
    start_registration::StartRegistration, submit_selection::SubmitSelection,
    update_selection::UpdateSelection, verify_otp::VerifyOtp,
};
