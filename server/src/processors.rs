//! Command processors for `login`, `newuser`, `send` and `logout`
//!
//! Each processor is a chain of pipeline steps over the sender's session.
//! A rejected request queues one `Server` notice to its sender and halts;
//! nothing is retried and no other client is affected. Every processor is
//! driven by its own single-consumer loop ([`run_processor`]), so requests of
//! one command type are handled strictly in arrival order. Requests of
//! different command types travel through different queues and have no
//! ordering relative to each other.

use crate::credentials::{CredentialRecord, CredentialStore};
use crate::dispatcher::{Envelope, OutboundQueue};
use crate::error::ChatError;
use crate::pipeline::{
    attempt, check, on_failure, recover, resolve, skip_if, tap, Chain, Failure, Flow, OnFailure,
    Recovery,
};
use crate::registry::{Registry, Session};
use crate::request::{Request, RequestReceiver};
use log::{debug, error, info, warn};
use shared::{MAX_HANDLE_LEN, MAX_PASS_LEN, MIN_PASS_LEN};
use std::sync::Arc;

pub const WELCOME_NOTICE: &str = "Welcome to the chat room!";
pub const ALREADY_LOGGED_IN: &str = "Client is already logged in";
pub const LOGIN_SUCCESS: &str = "Successful login";
pub const LOGIN_REJECTED: &str = "Unable to log in with provided credentials";
pub const LOGIN_FAILED: &str = "Unable to log in, please try again later";
pub const HANDLE_TAKEN: &str = "Handle is already taken";
pub const REGISTER_FAILED: &str = "Unable to register new user";
pub const UNAUTHORIZED: &str = "Unauthorized - Please login";
pub const NOT_LOGGED_IN: &str = "Client is not logged in";
pub const LOGOUT_SUCCESS: &str = "Successful logout";

/// Everything a processor touches, shared by every task
#[derive(Clone)]
pub struct ServerContext {
    pub registry: Arc<Registry>,
    pub store: Arc<CredentialStore>,
    pub outbound: OutboundQueue,
}

impl ServerContext {
    pub fn new(registry: Arc<Registry>, store: Arc<CredentialStore>, outbound: OutboundQueue) -> Self {
        Self {
            registry,
            store,
            outbound,
        }
    }
}

pub type Processor = fn(&ServerContext, &Request) -> Flow<Session>;

/// Consumes `requests` one at a time until the queue closes.
pub async fn run_processor(
    name: &'static str,
    context: ServerContext,
    mut requests: RequestReceiver,
    processor: Processor,
) {
    while let Some(request) = requests.recv().await {
        match processor(&context, &request) {
            Flow::Continue(session) => {
                debug!("{} request from connection {} completed", name, session.id());
            }
            Flow::Halt(session, failure) => {
                warn!(
                    "{} request from connection {} rejected: {}",
                    name,
                    session.id(),
                    failure
                );
            }
        }
    }
    info!("{} processor stopped", name);
}

/// Characters that would split or merge `handle,password` records
fn has_record_delimiter(value: &str) -> bool {
    value.contains(&[',', '\n', '\r'][..])
}

pub fn valid_handle(handle: &str) -> Result<(), ChatError> {
    if handle.is_empty() {
        return Err(ChatError::EmptyHandle);
    }
    if handle.chars().count() > MAX_HANDLE_LEN {
        return Err(ChatError::HandleTooLong);
    }
    if has_record_delimiter(handle) {
        return Err(ChatError::HandleDelimiter);
    }
    Ok(())
}

pub fn valid_pass(pass: &str) -> Result<(), ChatError> {
    let length = pass.chars().count();
    if !(MIN_PASS_LEN..=MAX_PASS_LEN).contains(&length) {
        return Err(ChatError::PassLength);
    }
    if has_record_delimiter(pass) {
        return Err(ChatError::PassDelimiter);
    }
    Ok(())
}

/// Replaces the request's snapshot with the live session.
///
/// A connection that closed after queueing keeps its snapshot, so the request
/// still runs to completion and only its replies are dropped on delivery.
fn has_client(context: &ServerContext) -> OnFailure<'_, Session> {
    on_failure(resolve("registered session", move |session: &Session| {
        context.registry.lookup(session.id())
    }))
    .handle(recover())
}

fn has_conn() -> impl FnMut(Session) -> Flow<Session> {
    check(|session: &Session| {
        if session.is_open() {
            Ok(())
        } else {
            Err(ChatError::ConnectionClosed(session.id()))
        }
    })
}

fn has_auth(session: &Session) -> Result<(), ChatError> {
    if session.is_authenticated() {
        Ok(())
    } else {
        Err(ChatError::NotAuthenticated)
    }
}

fn lacks_auth(session: &Session) -> Result<(), ChatError> {
    if session.is_authenticated() {
        Err(ChatError::AlreadyAuthenticated)
    } else {
        Ok(())
    }
}

/// Queues a fixed notice to the failing sender and keeps the failure.
fn notify<'a>(
    context: &'a ServerContext,
    body: &'static str,
) -> impl FnMut(Session, Failure) -> Recovery<Session> + 'a {
    explain(context, move |_| body.to_string())
}

/// Queues a notice derived from the failure and keeps the failure.
fn explain<F>(
    context: &ServerContext,
    mut describe: F,
) -> impl FnMut(Session, Failure) -> Recovery<Session> + '_
where
    F: FnMut(&Failure) -> String + 'static,
{
    move |session: Session, failure: Failure| {
        if let Err(e) = context.outbound.notice(session.id(), describe(&failure)) {
            error!("Unable to notify connection {}: {}", session.id(), e);
        }
        Recovery::Propagate(session, failure)
    }
}

fn notice<'a>(context: &'a ServerContext, body: &'a str) -> impl FnMut(Session) -> Flow<Session> + 'a {
    check(move |session: &Session| context.outbound.notice(session.id(), body))
}

/// `login <handle> <pass>`
pub fn process_login(context: &ServerContext, request: &Request) -> Flow<Session> {
    let credentials = request.message.credentials();

    let authorize = attempt(|session: &Session| {
        if context.store.verify(&credentials.handle, &credentials.pass)? {
            context
                .registry
                .set_authenticated(session.id(), &credentials.handle)
        } else {
            Err(ChatError::InvalidCredentials)
        }
    });

    let mut chain = Chain::new()
        .then(has_client(context))
        .then(has_conn())
        .then(on_failure(check(lacks_auth)).handle(notify(context, ALREADY_LOGGED_IN)))
        .then(on_failure(authorize).handle(explain(context, |failure| {
            match failure.error() {
                Some(ChatError::InvalidCredentials) => LOGIN_REJECTED.to_string(),
                _ => LOGIN_FAILED.to_string(),
            }
        })))
        .then(tap(|session: &Session| {
            info!(
                "Connection {} logged in as '{}'",
                session.id(),
                session.handle().unwrap_or_default()
            )
        }))
        .then(notice(context, LOGIN_SUCCESS));
    chain.run(request.sender.clone())
}

/// `newuser <handle> <pass>`: registration only, the user still has to log in.
pub fn process_newuser(context: &ServerContext, request: &Request) -> Flow<Session> {
    let credentials = request.message.credentials();
    let welcome = format!("Welcome {}! Use 'login' to continue.", credentials.handle);
    let store_missing = !context.store.exists();

    let unique_handle = check(|_: &Session| {
        if context.store.contains_handle(&credentials.handle)? {
            Err(ChatError::HandleTaken)
        } else {
            Ok(())
        }
    });

    let register = check(|_: &Session| {
        let record = CredentialRecord::new(credentials.handle.as_str(), credentials.pass.as_str());
        context.store.append(&record).map_err(ChatError::from)
    });

    let describe_failure = |failure: &Failure| failure.to_string();

    let mut chain = Chain::new()
        .then(has_client(context))
        .then(
            on_failure(check(|_: &Session| valid_handle(&credentials.handle)))
                .handle(explain(context, describe_failure)),
        )
        .then(
            on_failure(check(|_: &Session| valid_pass(&credentials.pass)))
                .handle(explain(context, describe_failure)),
        )
        .then(skip_if(
            store_missing,
            on_failure(unique_handle).handle(explain(context, |failure| {
                match failure.error() {
                    Some(ChatError::HandleTaken) => HANDLE_TAKEN.to_string(),
                    _ => REGISTER_FAILED.to_string(),
                }
            })),
        ))
        .then(on_failure(register).handle(notify(context, REGISTER_FAILED)))
        .then(tap(|session: &Session| {
            info!(
                "Connection {} registered new user '{}'",
                session.id(),
                credentials.handle
            )
        }))
        .then(notice(context, &welcome));
    chain.run(request.sender.clone())
}

/// `send <text>`: fan out to every registered session, sender included.
pub fn process_send(context: &ServerContext, request: &Request) -> Flow<Session> {
    let body = request.message.body.as_str();

    let broadcast = check(|sender: &Session| {
        let from = sender.handle().unwrap_or_default();
        for session in context.registry.for_each() {
            context
                .outbound
                .queue(Envelope::chat(session.id(), from, body))?;
        }
        Ok(())
    });

    let mut chain = Chain::new()
        .then(has_client(context))
        .then(on_failure(check(has_auth)).handle(notify(context, UNAUTHORIZED)))
        .then(broadcast);
    chain.run(request.sender.clone())
}

/// `logout`
pub fn process_logout(context: &ServerContext, request: &Request) -> Flow<Session> {
    let mut chain = Chain::new()
        .then(has_client(context))
        .then(has_conn())
        .then(on_failure(check(has_auth)).handle(notify(context, NOT_LOGGED_IN)))
        .then(tap(|session: &Session| {
            info!(
                "Connection {} logged out from '{}'",
                session.id(),
                session.handle().unwrap_or_default()
            )
        }))
        .then(attempt(|session: &Session| context.registry.clear(session.id())))
        .then(notice(context, LOGOUT_SUCCESS));
    chain.run(request.sender.clone())
}
