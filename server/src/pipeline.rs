//! Short-circuiting step combinators used to build every command processor
//!
//! A processor is written as an ordered [`Chain`] of small steps over a single
//! subject (usually the sender's [`Session`](crate::registry::Session)). Each
//! step either hands the (possibly replaced) subject to the next step or halts
//! the chain with a [`Failure`]. The first failure stops the chain and is
//! returned together with the subject as it was when the failure happened.
//!
//! Steps come in two flavours that the chain treats identically:
//! - error-valued steps ([`check`], [`attempt`]) fail with a [`ChatError`]
//! - absent-valued steps ([`resolve`]) fail when they produce no subject
//!
//! On top of plain chaining there are three structural combinators:
//! - [`on_failure`] runs failure handlers that may recover or replace the failure
//! - [`skip_if`] bypasses a step entirely when a condition holds
//! - [`tap`] lifts an infallible effect into a step
//!
//! Combinators never touch shared state. Only the closures supplied by the
//! processors (registry writes, credential store access, queue sends) do.

use crate::error::ChatError;
use std::fmt;

/// Why a chain stopped
#[derive(Debug)]
pub enum Failure {
    /// An absent-valued step produced nothing; the label names what was missing
    Absent(&'static str),
    /// An error-valued step failed
    Error(ChatError),
}

impl Failure {
    pub fn error(&self) -> Option<&ChatError> {
        match self {
            Failure::Error(err) => Some(err),
            Failure::Absent(_) => None,
        }
    }
}

impl From<ChatError> for Failure {
    fn from(err: ChatError) -> Self {
        Failure::Error(err)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Absent(what) => write!(f, "{} is absent", what),
            Failure::Error(err) => write!(f, "{}", err),
        }
    }
}

/// Outcome of a step or a whole chain
#[derive(Debug)]
pub enum Flow<S> {
    Continue(S),
    Halt(S, Failure),
}

impl<S> Flow<S> {
    pub fn is_continue(&self) -> bool {
        matches!(self, Flow::Continue(_))
    }

    pub fn subject(&self) -> &S {
        match self {
            Flow::Continue(subject) | Flow::Halt(subject, _) => subject,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Flow::Continue(_) => None,
            Flow::Halt(_, failure) => Some(failure),
        }
    }

    pub fn into_parts(self) -> (S, Option<Failure>) {
        match self {
            Flow::Continue(subject) => (subject, None),
            Flow::Halt(subject, failure) => (subject, Some(failure)),
        }
    }
}

/// A single processing step
pub trait Step<S> {
    fn apply(&mut self, subject: S) -> Flow<S>;
}

impl<S, F> Step<S> for F
where
    F: FnMut(S) -> Flow<S>,
{
    fn apply(&mut self, subject: S) -> Flow<S> {
        self(subject)
    }
}

pub type BoxStep<'a, S> = Box<dyn Step<S> + 'a>;

/// Applies `steps` in order, stopping at the first failure.
pub fn run_chain<S>(subject: S, steps: &mut [BoxStep<'_, S>]) -> Flow<S> {
    let mut subject = subject;
    for step in steps.iter_mut() {
        match step.apply(subject) {
            Flow::Continue(next) => subject = next,
            halted @ Flow::Halt(..) => return halted,
        }
    }
    Flow::Continue(subject)
}

/// Ordered list of steps; itself a step, so chains nest.
pub struct Chain<'a, S> {
    steps: Vec<BoxStep<'a, S>>,
}

impl<'a, S> Chain<'a, S> {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn then(mut self, step: impl Step<S> + 'a) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn run(&mut self, subject: S) -> Flow<S> {
        run_chain(subject, &mut self.steps)
    }
}

impl<'a, S> Default for Chain<'a, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, S> Step<S> for Chain<'a, S> {
    fn apply(&mut self, subject: S) -> Flow<S> {
        self.run(subject)
    }
}

/// Validation step: keeps the subject, fails with the returned error.
pub fn check<S, F>(mut predicate: F) -> impl FnMut(S) -> Flow<S>
where
    F: FnMut(&S) -> Result<(), ChatError>,
{
    move |subject| match predicate(&subject) {
        Ok(()) => Flow::Continue(subject),
        Err(err) => Flow::Halt(subject, Failure::Error(err)),
    }
}

/// Error-valued transform: replaces the subject on success.
pub fn attempt<S, F>(mut transform: F) -> impl FnMut(S) -> Flow<S>
where
    F: FnMut(&S) -> Result<S, ChatError>,
{
    move |subject| match transform(&subject) {
        Ok(next) => Flow::Continue(next),
        Err(err) => Flow::Halt(subject, Failure::Error(err)),
    }
}

/// Absent-valued transform: replaces the subject, or halts with
/// [`Failure::Absent`] labelled `what` when nothing comes back.
pub fn resolve<S, F>(what: &'static str, mut lookup: F) -> impl FnMut(S) -> Flow<S>
where
    F: FnMut(&S) -> Option<S>,
{
    move |subject| match lookup(&subject) {
        Some(next) => Flow::Continue(next),
        None => Flow::Halt(subject, Failure::Absent(what)),
    }
}

/// Infallible side effect.
pub fn tap<S, F>(mut effect: F) -> impl FnMut(S) -> Flow<S>
where
    F: FnMut(&S),
{
    move |subject| {
        effect(&subject);
        Flow::Continue(subject)
    }
}

/// Guarded step: when `skip` is true the wrapped step never runs and the
/// subject passes through untouched.
pub fn skip_if<S, T>(skip: bool, mut step: T) -> impl FnMut(S) -> Flow<S>
where
    T: Step<S>,
{
    move |subject| {
        if skip {
            Flow::Continue(subject)
        } else {
            step.apply(subject)
        }
    }
}

/// What a failure handler decided
#[derive(Debug)]
pub enum Recovery<S> {
    /// Clear the failure; the enclosing chain continues with this subject
    Recover(S),
    /// Keep failing, possibly with a replaced failure
    Propagate(S, Failure),
}

pub trait FailureHandler<S> {
    fn handle(&mut self, subject: S, failure: Failure) -> Recovery<S>;
}

impl<S, F> FailureHandler<S> for F
where
    F: FnMut(S, Failure) -> Recovery<S>,
{
    fn handle(&mut self, subject: S, failure: Failure) -> Recovery<S> {
        self(subject, failure)
    }
}

/// Step wrapper that routes failures of the inner step through handlers.
///
/// Handlers run in order. Each receives the subject and the current failure.
/// The first one that recovers ends handling and the chain continues; if none
/// recovers, the last propagated failure halts the chain.
pub struct OnFailure<'a, S> {
    step: BoxStep<'a, S>,
    handlers: Vec<Box<dyn FailureHandler<S> + 'a>>,
}

pub fn on_failure<'a, S>(step: impl Step<S> + 'a) -> OnFailure<'a, S> {
    OnFailure {
        step: Box::new(step),
        handlers: Vec::new(),
    }
}

impl<'a, S> OnFailure<'a, S> {
    pub fn handle(mut self, handler: impl FailureHandler<S> + 'a) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }
}

impl<'a, S> Step<S> for OnFailure<'a, S> {
    fn apply(&mut self, subject: S) -> Flow<S> {
        let (mut subject, mut failure) = match self.step.apply(subject) {
            Flow::Continue(next) => return Flow::Continue(next),
            Flow::Halt(subject, failure) => (subject, failure),
        };

        for handler in self.handlers.iter_mut() {
            match handler.handle(subject, failure) {
                Recovery::Recover(next) => return Flow::Continue(next),
                Recovery::Propagate(next, next_failure) => {
                    subject = next;
                    failure = next_failure;
                }
            }
        }

        Flow::Halt(subject, failure)
    }
}

/// Handler that swallows any failure.
pub fn recover<S>() -> impl FnMut(S, Failure) -> Recovery<S> {
    |subject, _| Recovery::Recover(subject)
}
