//! In-memory [`Backend`] implementation.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use common::operations::{By, Issue, Select, Submit, Verify};
use secrecy::ExposeSecret as _;
use tokio::sync::{Mutex, OwnedRwLockWriteGuard, RwLock};
use tracerr::Traced;

use crate::domain::{otp, session, shift, stoppage, Catalog};

use super::{Attempt, Backend, Choice, Error, Rejection};

/// Kind of a [`Backend`] operation.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Operation {
    /// OTP send.
    Issue,

    /// OTP verification.
    Verify,

    /// [`Catalog`] fetch.
    Select,

    /// Shift and stoppage submission.
    Submit,
}

impl Operation {
    /// Returns the index of this [`Operation`] in per-[`Operation`] arrays.
    const fn index(self) -> usize {
        match self {
            Self::Issue => 0,
            Self::Verify => 1,
            Self::Select => 2,
            Self::Submit => 3,
        }
    }
}

/// Registered staff member of an [`InMemory`] backend.
#[derive(Clone, Debug)]
pub struct Staff {
    /// Address OTPs are delivered to.
    pub email: otp::Email,

    /// The only [`otp::Code`] being accepted.
    pub code: otp::Code,

    /// Continuation [`session::Token`] returned on verification, if any.
    pub continuation: Option<session::Token>,

    /// [`Catalog`] offered to the staff member.
    pub catalog: Catalog,
}

/// [`Backend`] keeping everything in memory.
///
/// Counts calls per [`Operation`] and allows holding any [`Operation`] to
/// observe in-flight behavior.
#[derive(Clone, Debug, Default)]
pub struct InMemory {
    /// Shared state of this [`InMemory`] backend.
    inner: Arc<Inner>,
}

/// Shared state of an [`InMemory`] backend.
#[derive(Debug, Default)]
struct Inner {
    /// Registered [`Staff`] by their [`session::Token`]s.
    staff: Mutex<HashMap<session::Token, Staff>>,

    /// Accepted submissions by [`session::Token`]s.
    submissions: Mutex<HashMap<session::Token, (shift::Id, stoppage::Id)>>,

    /// Message to reject all submissions with, if any.
    rejection: Mutex<Option<String>>,

    /// Indicator whether all [`Operation`]s fail as unavailable.
    unavailable: Mutex<bool>,

    /// Number of calls per [`Operation`].
    calls: [AtomicUsize; 4],

    /// Gates every call of an [`Operation`] passes through.
    gates: [Arc<RwLock<()>>; 4],
}

impl InMemory {
    /// Creates a new [`InMemory`] backend with a single demo staff member
    /// registered under the `U1` token.
    #[expect(clippy::missing_panics_doc, reason = "infallible")]
    #[must_use]
    pub fn demo() -> Self {
        use crate::domain::{catalog::Stoppages, staff, Shift, Stoppage};

        let catalog = Catalog::new(
            staff::Profile {
                first_name: "John".into(),
                last_name: "Doe".into(),
                employee_id: "E123456".into(),
                department: "Computer Science".into(),
            },
            vec![
                Shift {
                    id: 1.into(),
                    label: "Morning".into(),
                },
                Shift {
                    id: 2.into(),
                    label: "Evening".into(),
                },
            ],
            Stoppages::Global(vec![
                Stoppage {
                    id: 3.into(),
                    name: "Akabar Pur".into(),
                },
                Stoppage {
                    id: 4.into(),
                    name: "Anand Van".into(),
                },
                Stoppage {
                    id: 5.into(),
                    name: "Atalla Chungi".into(),
                },
            ]),
        )
        .expect("non-empty catalog");
        let demo = Staff {
            email: otp::Email::new("user@example.com").expect("valid e-mail"),
            code: otp::Code::new("123456").expect("valid OTP"),
            continuation: None,
            catalog,
        };

        Self {
            inner: Arc::new(Inner {
                staff: Mutex::new(HashMap::from([(
                    session::Token::new("U1").expect("valid token"),
                    demo,
                )])),
                ..Inner::default()
            }),
        }
    }

    /// Registers the provided [`Staff`] under the provided
    /// [`session::Token`].
    pub async fn register(&self, token: session::Token, staff: Staff) {
        drop(self.inner.staff.lock().await.insert(token, staff));
    }

    /// Makes all submissions being rejected with the provided `message`, or
    /// accepted if [`None`].
    pub async fn reject_submissions(&self, message: Option<String>) {
        *self.inner.rejection.lock().await = message;
    }

    /// Makes all [`Operation`]s fail as unavailable, or succeed again.
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.inner.unavailable.lock().await = unavailable;
    }

    /// Returns the number of calls of the provided [`Operation`] made so far.
    #[must_use]
    pub fn calls(&self, op: Operation) -> usize {
        self.inner.calls[op.index()].load(Ordering::SeqCst)
    }

    /// Holds all calls of the provided [`Operation`] until the returned guard
    /// is dropped.
    pub async fn hold(&self, op: Operation) -> OwnedRwLockWriteGuard<()> {
        Arc::clone(&self.inner.gates[op.index()]).write_owned().await
    }

    /// Returns the accepted submission of the provided [`session::Token`],
    /// if any.
    pub async fn submission(
        &self,
        token: &session::Token,
    ) -> Option<(shift::Id, stoppage::Id)> {
        self.inner.submissions.lock().await.get(token).copied()
    }

    /// Registers a call of the provided [`Operation`] and waits for its gate.
    async fn enter(&self, op: Operation) -> Result<(), Traced<Error>> {
        _ = self.inner.calls[op.index()].fetch_add(1, Ordering::SeqCst);
        drop(self.inner.gates[op.index()].read().await);
        if *self.inner.unavailable.lock().await {
            return Err(tracerr::new!(Error::Unavailable(
                "in-memory backend is switched off".into(),
            )));
        }
        Ok(())
    }

    /// Returns the [`Staff`] registered under the provided
    /// [`session::Token`].
    async fn staff(&self, token: &session::Token) -> Result<Staff, Traced<Error>> {
        self.inner
            .staff
            .lock()
            .await
            .get(token)
            .cloned()
            .ok_or_else(|| {
                tracerr::new!(Error::Rejected(Rejection {
                    status: Some(404),
                    message: Some("Invalid or expired registration link".into()),
                    field: None,
                }))
            })
    }
}

impl Backend<Issue<By<otp::Email, session::Token>>> for InMemory {
    type Ok = otp::Email;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Issue(by): Issue<By<otp::Email, session::Token>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.enter(Operation::Issue).await?;
        Ok(self.staff(by.as_inner()).await?.email)
    }
}

impl Backend<Verify<By<session::Token, Attempt>>> for InMemory {
    type Ok = session::Token;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Verify(by): Verify<By<session::Token, Attempt>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.enter(Operation::Verify).await?;
        let Attempt { token, code } = by.into_inner();
        let staff = self.staff(&token).await?;
        if *code.expose_secret() != staff.code {
            return Err(tracerr::new!(Error::Rejected(Rejection {
                status: Some(400),
                message: Some("Invalid OTP".into()),
                field: Some("otp".into()),
            })));
        }
        Ok(staff.continuation.unwrap_or(token))
    }
}

impl Backend<Select<By<Option<Catalog>, session::Token>>> for InMemory {
    type Ok = Option<Catalog>;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Catalog>, session::Token>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.enter(Operation::Select).await?;
        let staff = self.inner.staff.lock().await;
        Ok(staff.get(by.as_inner()).map(|s| s.catalog.clone()).or_else(|| {
            staff
                .values()
                .find(|s| s.continuation.as_ref() == Some(by.as_inner()))
                .map(|s| s.catalog.clone())
        }))
    }
}

impl Backend<Submit<Choice>> for InMemory {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Submit(choice): Submit<Choice>,
    ) -> Result<Self::Ok, Self::Err> {
        self.enter(Operation::Submit).await?;
        if let Some(msg) = self.inner.rejection.lock().await.clone() {
            return Err(tracerr::new!(Error::Rejected(Rejection {
                status: Some(422),
                message: Some(msg),
                field: Some("shift".into()),
            })));
        }

        let staff = self.inner.staff.lock().await;
        let catalog = staff
            .get(&choice.token)
            .or_else(|| {
                staff
                    .values()
                    .find(|s| s.continuation.as_ref() == Some(&choice.token))
            })
            .map(|s| &s.catalog)
            .ok_or_else(|| {
                tracerr::new!(Error::Rejected(Rejection::with_message(
                    "Invalid or expired registration link",
                )))
            })?;
        if catalog.stoppage(Some(choice.shift), choice.stoppage).is_none() {
            return Err(tracerr::new!(Error::Rejected(Rejection {
                status: Some(400),
                message: Some("Invalid shift or stoppage".into()),
                field: Some("location".into()),
            })));
        }
        drop(staff);

        drop(
            self.inner
                .submissions
                .lock()
                .await
                .insert(choice.token, (choice.shift, choice.stoppage)),
        );
        Ok(())
    }
}
