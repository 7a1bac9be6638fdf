//! [`Registration`] session state machine.

use std::{sync::Arc, time::Duration};

#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf};
use derive_more::{Display, Error, From};

use super::{
    confirmation::Summary,
    otp::{self, Challenge, Phase},
    selection::SelectionError,
    session,
    stage::{Navigation, Redirect, RedirectReason, Stage},
    Catalog, Selection, Shift, Stoppage,
};

/// Registration session of a single staff member.
///
/// Owns all the mutable state of the flow. Every backend call is bracketed
/// by a `begin_*` method (marking the call as in flight and handing out a
/// [`Ticket`]) and one of the completion methods consuming that [`Ticket`].
#[derive(Debug)]
pub struct Registration {
    /// [`session::Token`] this [`Registration`] is bound to.
    token: session::Token,

    /// Current [`Stage`].
    stage: Stage,

    /// Generation of this [`Registration`], bumped on teardown.
    epoch: u64,

    /// OTP exchange state.
    otp: Otp,

    /// [`Catalog`] loading state.
    catalog: CatalogState,

    /// Current [`Selection`].
    selection: Selection,

    /// Indicator whether a submission is in flight.
    submitting: bool,

    /// Accepted submission, if any.
    confirmed: Option<Confirmed>,

    /// [`DateTime`] of the last activity upon this [`Registration`].
    last_activity: ActivityDateTime,
}

/// OTP exchange state of a [`Registration`].
#[derive(Clone, Debug)]
pub struct Otp {
    /// Current [`Phase`].
    pub phase: Phase,

    /// Current [`Challenge`], destroyed once verified.
    pub challenge: Option<Challenge>,

    /// Indicator whether a verification is in flight.
    pub verifying: bool,

    /// Field-level error of the last verification attempt.
    pub field_error: Option<String>,

    /// Error of the last send attempt.
    pub send_error: Option<String>,

    /// Number of successful sends.
    serial: u32,

    /// Continuation [`session::Token`] returned by a successful
    /// verification.
    pub continuation: Option<session::Token>,
}

/// [`Catalog`] loading state of a [`Registration`].
#[derive(Clone, Debug)]
pub enum CatalogState {
    /// Nothing has been requested yet.
    NotLoaded,

    /// Load is in flight.
    Loading,

    /// [`Catalog`] is loaded.
    Loaded(Arc<Catalog>),

    /// Load failed with the provided message.
    Failed(String),
}

/// Accepted submission of a [`Registration`].
#[derive(Clone, Debug)]
pub struct Confirmed {
    /// [`Summary`] to show.
    pub summary: Summary,

    /// Submitted [`Shift`].
    pub shift: Shift,

    /// Submitted [`Stoppage`].
    pub stoppage: Stoppage,
}

/// Proof of an in-flight backend call started against a [`Registration`].
///
/// Results carrying a [`Ticket`] of an older generation are discarded.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[must_use]
pub struct Ticket {
    /// Generation of the [`Registration`] the call started in.
    epoch: u64,
}

/// [`Shift`] and [`Stoppage`] about to be submitted.
#[derive(Clone, Debug)]
pub struct Submission {
    /// [`Catalog`] the entries were taken from.
    pub catalog: Arc<Catalog>,

    /// [`Shift`] to submit.
    pub shift: Shift,

    /// [`Stoppage`] to submit.
    pub stoppage: Stoppage,
}

/// Outcome of starting a [`Catalog`] load.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoadStart {
    /// Load must be performed by the caller.
    Start(Ticket),

    /// Nothing to do: the [`Catalog`] is loaded, loading or failed without
    /// an explicit retry.
    Skip,
}

impl Registration {
    /// Creates a new [`Registration`] at [`Stage::Login`].
    #[must_use]
    pub fn new(token: session::Token, now: ActivityDateTime) -> Self {
        Self {
            token,
            stage: Stage::Login,
            epoch: 0,
            otp: Otp {
                phase: Phase::Idle,
                challenge: None,
                verifying: false,
                field_error: None,
                send_error: None,
                serial: 0,
                continuation: None,
            },
            catalog: CatalogState::NotLoaded,
            selection: Selection::default(),
            submitting: false,
            confirmed: None,
            last_activity: now,
        }
    }

    /// Returns the [`session::Token`] of this [`Registration`].
    #[must_use]
    pub fn token(&self) -> &session::Token {
        &self.token
    }

    /// Returns the current [`Stage`].
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Returns the OTP exchange state.
    #[must_use]
    pub fn otp(&self) -> &Otp {
        &self.otp
    }

    /// Returns the [`Catalog`] loading state.
    #[must_use]
    pub fn catalog(&self) -> &CatalogState {
        &self.catalog
    }

    /// Returns the current [`Selection`].
    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Indicates whether a submission is in flight.
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Returns the accepted submission, if any.
    #[must_use]
    pub fn confirmed(&self) -> Option<&Confirmed> {
        self.confirmed.as_ref()
    }

    /// Returns the [`DateTime`] of the last activity.
    #[must_use]
    pub fn last_activity(&self) -> ActivityDateTime {
        self.last_activity
    }

    /// Records an activity at the provided moment.
    pub fn touch(&mut self, now: ActivityDateTime) {
        self.last_activity = self.last_activity.max(now);
    }

    /// Indicates whether a resend is allowed right now.
    #[must_use]
    pub fn can_resend(&self) -> bool {
        self.stage == Stage::Login
            && matches!(self.otp.phase, Phase::AwaitingCode | Phase::SendFailed)
            && self.cooldown_remaining() == 0
    }

    /// Returns the whole seconds left until a resend is allowed.
    #[must_use]
    pub fn cooldown_remaining(&self) -> u32 {
        self.otp
            .challenge
            .as_ref()
            .map_or(0, |c| c.cooldown_remaining)
    }

    /// Indicates whether submission is allowed right now.
    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.stage == Stage::Selection
            && !self.submitting
            && matches!(self.catalog, CatalogState::Loaded(_))
            && self.selection.is_complete()
    }

    /// Returns the [`session::Token`] to carry in [`Navigation`]s: the
    /// continuation one once verified.
    #[must_use]
    pub fn navigation_token(&self) -> &session::Token {
        self.otp.continuation.as_ref().unwrap_or(&self.token)
    }

    /// Returns the [`Navigation`] entering the current [`Stage`].
    #[must_use]
    pub fn navigation(&self) -> Navigation {
        match (self.stage, &self.confirmed) {
            (Stage::Login, _) => Navigation::default(),
            (Stage::Confirmation, Some(c)) => Navigation::confirmation(
                self.navigation_token(),
                &c.shift,
                c.stoppage.id,
            ),
            (Stage::Selection | Stage::Confirmation, _) => {
                Navigation::selection(self.navigation_token())
            }
        }
    }

    /// Checks whether [`Stage::Login`] may be entered.
    ///
    /// # Errors
    ///
    /// With a [`Redirect`] to the current [`Stage`] if it's past
    /// [`Stage::Login`].
    pub fn guard_login(&self) -> Result<(), Redirect> {
        match self.stage {
            Stage::Login => Ok(()),
            Stage::Selection => Err(Redirect {
                to: Stage::Selection,
                reason: RedirectReason::AlreadyVerified,
                navigation: self.navigation(),
            }),
            Stage::Confirmation => {
                Err(Redirect::confirmation(self.navigation()))
            }
        }
    }

    /// Checks whether [`Stage::Selection`] may be entered.
    ///
    /// # Errors
    ///
    /// With a [`Redirect`] to [`Stage::Login`] if the OTP is not verified yet,
    /// or to [`Stage::Confirmation`] if already confirmed.
    pub fn guard_selection(&self) -> Result<(), Redirect> {
        match self.stage {
            Stage::Selection => Ok(()),
            Stage::Login => {
                Err(Redirect::login(RedirectReason::NotVerified))
            }
            Stage::Confirmation => {
                Err(Redirect::confirmation(self.navigation()))
            }
        }
    }

    /// Tears this [`Registration`] down, so no in-flight result is applied
    /// to it anymore.
    pub fn teardown(&mut self) {
        self.epoch += 1;
        self.otp.challenge = None;
        self.otp.verifying = false;
        self.catalog = CatalogState::NotLoaded;
        self.selection.reset();
        self.submitting = false;
    }

    /// Starts sending an OTP.
    ///
    /// # Errors
    ///
    /// If:
    /// - the OTP is already verified;
    /// - another send is in flight.
    pub fn begin_send(
        &mut self,
        now: otp::IssuanceDateTime,
    ) -> Result<Ticket, TransitionError> {
        self.ensure_login()?;
        if self.otp.phase == Phase::Sending {
            return Err(TransitionError::SendInFlight);
        }

        self.otp.phase = Phase::Sending;
        if self.otp.challenge.is_none() {
            self.otp.challenge = Some(Challenge {
                token: self.token.clone(),
                destination: None,
                issued_at: now,
                cooldown_remaining: 0,
                status: otp::Status::Pending,
                serial: self.otp.serial,
            });
        }
        Ok(self.ticket())
    }

    /// Completes a successful OTP send.
    ///
    /// Starts the cooldown and invalidates codes typed against a previous
    /// [`Challenge`].
    ///
    /// # Errors
    ///
    /// If the send result is stale.
    pub fn complete_send(
        &mut self,
        ticket: Ticket,
        destination: &otp::Email,
        now: otp::IssuanceDateTime,
        cooldown: Duration,
    ) -> Result<&Challenge, Discarded> {
        self.check(ticket)?;
        if self.otp.phase != Phase::Sending {
            return Err(Discarded);
        }

        self.otp.serial += 1;
        self.otp.phase = Phase::AwaitingCode;
        self.otp.field_error = None;
        self.otp.send_error = None;
        Ok(self.otp.challenge.insert(Challenge {
            token: self.token.clone(),
            destination: Some(destination.masked()),
            issued_at: now,
            cooldown_remaining: u32::try_from(cooldown.as_secs())
                .unwrap_or(u32::MAX),
            status: otp::Status::Pending,
            serial: self.otp.serial,
        }))
    }

    /// Completes a failed OTP send.
    ///
    /// A previously delivered [`Challenge`] stays verifiable.
    ///
    /// # Errors
    ///
    /// If the send result is stale.
    pub fn fail_send(
        &mut self,
        ticket: Ticket,
        reason: impl Into<String>,
    ) -> Result<(), Discarded> {
        self.check(ticket)?;
        if self.otp.phase != Phase::Sending {
            return Err(Discarded);
        }

        self.otp.send_error = Some(reason.into());
        match &mut self.otp.challenge {
            Some(c) if c.destination.is_some() => {
                self.otp.phase = Phase::AwaitingCode;
            }
            Some(c) => {
                c.status = otp::Status::Failed;
                self.otp.phase = Phase::SendFailed;
            }
            None => self.otp.phase = Phase::SendFailed,
        }
        Ok(())
    }

    /// Decrements the cooldown by one second.
    ///
    /// Returns the remaining whole seconds.
    pub fn tick_cooldown(&mut self) -> u32 {
        match &mut self.otp.challenge {
            Some(c) => {
                c.cooldown_remaining = c.cooldown_remaining.saturating_sub(1);
                c.cooldown_remaining
            }
            None => 0,
        }
    }

    /// Starts verifying a code typed against the [`Challenge`] with the
    /// provided `serial` (if known).
    ///
    /// # Errors
    ///
    /// If:
    /// - the OTP is already verified;
    /// - no [`Challenge`] awaits a code;
    /// - a send or another verification is in flight;
    /// - the `serial` refers to an older [`Challenge`];
    /// - the [`Challenge`] outlived the provided `lifetime`.
    pub fn begin_verify<T: ?Sized>(
        &mut self,
        serial: Option<u32>,
        lifetime: Duration,
        now: DateTimeOf<T>,
    ) -> Result<Ticket, TransitionError> {
        use TransitionError as E;

        self.ensure_login()?;
        match self.otp.phase {
            Phase::AwaitingCode => {}
            Phase::Sending => return Err(E::SendInFlight),
            Phase::Idle | Phase::SendFailed => return Err(E::NoChallenge),
            Phase::Verified => return Err(E::AlreadyVerified),
        }
        if self.otp.verifying {
            return Err(E::VerifyInFlight);
        }
        let challenge = self.otp.challenge.as_mut().ok_or(E::NoChallenge)?;
        if serial.is_some_and(|s| s != challenge.serial) {
            return Err(E::StaleCode);
        }
        if challenge.is_expired_at(lifetime, now) {
            challenge.status = otp::Status::Expired;
            return Err(E::ChallengeExpired);
        }

        self.otp.verifying = true;
        Ok(self.ticket())
    }

    /// Completes a successful verification, moving to [`Stage::Selection`].
    ///
    /// # Errors
    ///
    /// If the verification result is stale.
    pub fn accept_verify(
        &mut self,
        ticket: Ticket,
        continuation: session::Token,
    ) -> Result<(), Discarded> {
        self.check(ticket)?;
        if !self.otp.verifying {
            return Err(Discarded);
        }

        self.otp.verifying = false;
        self.otp.phase = Phase::Verified;
        self.otp.field_error = None;
        self.otp.send_error = None;
        if let Some(c) = &mut self.otp.challenge {
            c.status = otp::Status::Verified;
        }
        self.otp.challenge = None;
        self.otp.continuation = Some(continuation);
        self.stage = Stage::Selection;
        Ok(())
    }

    /// Completes a verification rejected by the OTP service.
    ///
    /// The [`Challenge`] keeps awaiting a code and its cooldown is untouched.
    ///
    /// # Errors
    ///
    /// If the verification result is stale.
    pub fn reject_verify(
        &mut self,
        ticket: Ticket,
        field_error: impl Into<String>,
    ) -> Result<(), Discarded> {
        self.check(ticket)?;
        if !self.otp.verifying {
            return Err(Discarded);
        }

        self.otp.verifying = false;
        self.otp.field_error = Some(field_error.into());
        Ok(())
    }

    /// Completes a verification that never reached the OTP service.
    ///
    /// # Errors
    ///
    /// If the verification result is stale.
    pub fn abort_verify(&mut self, ticket: Ticket) -> Result<(), Discarded> {
        self.check(ticket)?;
        if !self.otp.verifying {
            return Err(Discarded);
        }

        self.otp.verifying = false;
        Ok(())
    }

    /// Starts loading the [`Catalog`], once per arrival at
    /// [`Stage::Selection`].
    ///
    /// A failed load is only restarted when `retry` is requested.
    ///
    /// # Errors
    ///
    /// If the [`Registration`] is not at [`Stage::Selection`].
    pub fn begin_load(
        &mut self,
        retry: bool,
    ) -> Result<LoadStart, TransitionError> {
        self.ensure_selection()?;
        match self.catalog {
            CatalogState::NotLoaded => {}
            CatalogState::Failed(_) if retry => {}
            CatalogState::Loading
            | CatalogState::Loaded(_)
            | CatalogState::Failed(_) => return Ok(LoadStart::Skip),
        }

        self.catalog = CatalogState::Loading;
        Ok(LoadStart::Start(self.ticket()))
    }

    /// Completes a successful [`Catalog`] load.
    ///
    /// # Errors
    ///
    /// If the load result is stale.
    pub fn complete_load(
        &mut self,
        ticket: Ticket,
        catalog: Catalog,
    ) -> Result<Arc<Catalog>, Discarded> {
        self.check(ticket)?;
        if !matches!(self.catalog, CatalogState::Loading) {
            return Err(Discarded);
        }

        let catalog = Arc::new(catalog);
        self.catalog = CatalogState::Loaded(Arc::clone(&catalog));
        Ok(catalog)
    }

    /// Completes a failed [`Catalog`] load.
    ///
    /// # Errors
    ///
    /// If the load result is stale.
    pub fn fail_load(
        &mut self,
        ticket: Ticket,
        message: impl Into<String>,
    ) -> Result<(), Discarded> {
        self.check(ticket)?;
        if !matches!(self.catalog, CatalogState::Loading) {
            return Err(Discarded);
        }

        self.catalog = CatalogState::Failed(message.into());
        Ok(())
    }

    /// Applies the provided [`Change`] to the [`Selection`].
    ///
    /// # Errors
    ///
    /// If:
    /// - the [`Registration`] is not at [`Stage::Selection`];
    /// - the [`Catalog`] is not loaded;
    /// - a submission is in flight;
    /// - the [`Change`] is invalid for the [`Catalog`].
    pub fn change_selection(
        &mut self,
        change: Change,
    ) -> Result<&Selection, TransitionError> {
        self.ensure_selection()?;
        if self.submitting {
            return Err(TransitionError::SubmissionInFlight);
        }
        let CatalogState::Loaded(catalog) = &self.catalog else {
            return Err(TransitionError::CatalogNotLoaded);
        };

        match change {
            Change::Shift(id) => self.selection.select_shift(catalog, id)?,
            Change::ShiftHint(hint) => {
                drop(self.selection.select_shift_by_hint(catalog, &hint)?);
            }
            Change::Stoppage(id) => {
                self.selection.select_stoppage(catalog, id)?;
            }
            Change::Reset => self.selection.reset(),
        }
        Ok(&self.selection)
    }

    /// Starts submitting the [`Selection`].
    ///
    /// # Errors
    ///
    /// If:
    /// - the [`Registration`] is not at [`Stage::Selection`];
    /// - another submission is in flight;
    /// - the [`Catalog`] is not loaded;
    /// - the [`Selection`] is incomplete.
    pub fn begin_submit(
        &mut self,
    ) -> Result<(Ticket, Submission), TransitionError> {
        use TransitionError as E;

        self.ensure_selection()?;
        if self.submitting {
            return Err(E::SubmissionInFlight);
        }
        let CatalogState::Loaded(catalog) = &self.catalog else {
            return Err(E::CatalogNotLoaded);
        };
        let (shift_id, stoppage_id) =
            self.selection.complete().ok_or(E::IncompleteSelection)?;
        let shift = catalog
            .shift(shift_id)
            .ok_or(SelectionError::UnknownShift(shift_id))?
            .clone();
        let stoppage = catalog
            .stoppage(Some(shift_id), stoppage_id)
            .ok_or(SelectionError::UnknownStoppage(stoppage_id))?
            .clone();
        let submission = Submission {
            catalog: Arc::clone(catalog),
            shift,
            stoppage,
        };

        self.submitting = true;
        Ok((self.ticket(), submission))
    }

    /// Completes an accepted submission, moving to [`Stage::Confirmation`].
    ///
    /// The [`Selection`] is destroyed.
    ///
    /// # Errors
    ///
    /// If the submission result is stale.
    pub fn accept_submit(
        &mut self,
        ticket: Ticket,
        submission: Submission,
    ) -> Result<&Confirmed, Discarded> {
        self.check(ticket)?;
        if !self.submitting {
            return Err(Discarded);
        }

        let Submission {
            catalog,
            shift,
            stoppage,
        } = submission;
        self.submitting = false;
        self.selection.reset();
        self.stage = Stage::Confirmation;
        Ok(self.confirmed.insert(Confirmed {
            summary: Summary::new(&catalog, &shift, &stoppage),
            shift,
            stoppage,
        }))
    }

    /// Completes a rejected or failed submission.
    ///
    /// The [`Selection`] stays intact for a retry.
    ///
    /// # Errors
    ///
    /// If the submission result is stale.
    pub fn reject_submit(&mut self, ticket: Ticket) -> Result<(), Discarded> {
        self.check(ticket)?;
        self.submitting = false;
        Ok(())
    }

    /// Issues a [`Ticket`] of the current generation.
    fn ticket(&self) -> Ticket {
        Ticket { epoch: self.epoch }
    }

    /// Checks whether the provided [`Ticket`] belongs to the current
    /// generation.
    fn check(&self, ticket: Ticket) -> Result<(), Discarded> {
        (ticket.epoch == self.epoch).then_some(()).ok_or(Discarded)
    }

    /// Ensures this [`Registration`] is at [`Stage::Login`].
    fn ensure_login(&self) -> Result<(), TransitionError> {
        match self.stage {
            Stage::Login => Ok(()),
            Stage::Selection | Stage::Confirmation => {
                Err(TransitionError::AlreadyVerified)
            }
        }
    }

    /// Ensures this [`Registration`] is at [`Stage::Selection`].
    fn ensure_selection(&self) -> Result<(), TransitionError> {
        match self.stage {
            Stage::Selection => Ok(()),
            Stage::Login => Err(TransitionError::NotVerified),
            Stage::Confirmation => Err(TransitionError::AlreadyConfirmed),
        }
    }
}

/// Change of a [`Selection`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Change {
    /// Choose the shift with the provided ID.
    Shift(super::shift::Id),

    /// Choose the first shift whose label matches the provided hint.
    ShiftHint(String),

    /// Choose the stoppage with the provided ID.
    Stoppage(super::stoppage::Id),

    /// Forget both choices.
    Reset,
}

/// Transition refused locally by a [`Registration`].
#[derive(Clone, Copy, Debug, Display, Eq, Error, From, PartialEq)]
pub enum TransitionError {
    /// OTP is already verified.
    #[display("Identity is already verified")]
    AlreadyVerified,

    /// OTP is not verified yet.
    #[display("Identity is not verified yet")]
    NotVerified,

    /// Registration is already confirmed.
    #[display("Registration is already confirmed")]
    AlreadyConfirmed,

    /// OTP send is in flight.
    #[display("OTP is being sent")]
    SendInFlight,

    /// OTP verification is in flight.
    #[display("OTP is being verified")]
    VerifyInFlight,

    /// No OTP awaits a code.
    #[display("No OTP has been sent")]
    NoChallenge,

    /// Code was typed against a previous OTP.
    #[display("A new OTP has been sent, use the latest code")]
    StaleCode,

    /// OTP outlived its lifetime.
    #[display("The OTP has expired, request a new one")]
    ChallengeExpired,

    /// [`Catalog`] is not loaded.
    #[display("Shifts and stoppages are not loaded")]
    CatalogNotLoaded,

    /// Submission is in flight.
    #[display("Submission is in progress")]
    SubmissionInFlight,

    /// [`Selection`] lacks a shift or a stoppage.
    #[display("Select both a shift and a stoppage")]
    IncompleteSelection,

    /// [`Selection`] change is invalid.
    #[display("{_0}")]
    #[from]
    Selection(SelectionError),
}

/// Result arrived for a torn down or already moved on [`Registration`].
#[derive(Clone, Copy, Debug, Display, Eq, Error, PartialEq)]
#[display("Result arrived after the registration moved on")]
pub struct Discarded;

/// [`DateTime`] of the last activity upon a [`Registration`].
pub type ActivityDateTime = DateTimeOf<(Registration, unit::Activity)>;
