//! Error and message fan-out.
//!
//! A [`Notifier`] decouples event producers from consumers: producers push
//! errors or informational messages into it, and every registered listener is
//! invoked synchronously, in registration order, on the caller's thread. It
//! is a best-effort, fire-and-forget broadcast primitive: there is no error
//! return, no listener removal, and no isolation between listeners, which are
//! expected to be side-effect-only and non-panicking.

use std::sync::RwLock;

use crate::error::Error;

/// Type-erased listener for the error channel.
pub type ErrorListener = Box<dyn Fn(&Error) + Send + Sync>;

/// Type-erased listener for the message channel.
pub type MessageListener = Box<dyn Fn(&str) + Send + Sync>;

/// A fan-out broadcaster with one error channel and one message channel.
///
/// The listener lists are lock-protected so connection tasks can emit while
/// other tasks emit concurrently; emission never blocks on anything but the
/// listeners themselves.
///
/// # Examples
///
/// ```
/// use soloserve::{Error, Notifier};
///
/// let notifier = Notifier::new();
/// notifier.on_error(|err| eprintln!("{err}"));
/// notifier.on_message(|msg| println!("{msg}"));
///
/// notifier.message("starting up");
/// notifier.error(&Error::handler("something went sideways"));
/// ```
#[derive(Default)]
pub struct Notifier {
    errors: RwLock<Vec<ErrorListener>>,
    messages: RwLock<Vec<MessageListener>>,
}

impl Notifier {
    /// Creates a notifier with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a listener to the error channel.
    ///
    /// Listeners are never deduplicated: registering the same closure twice
    /// means it runs twice per emission.
    pub fn on_error(&self, listener: impl Fn(&Error) + Send + Sync + 'static) {
        self.errors
            .write()
            .expect("error listener list poisoned")
            .push(Box::new(listener));
    }

    /// Appends a listener to the message channel.
    pub fn on_message(&self, listener: impl Fn(&str) + Send + Sync + 'static) {
        self.messages
            .write()
            .expect("message listener list poisoned")
            .push(Box::new(listener));
    }

    /// Broadcasts `err` to every error listener, in registration order.
    pub fn error(&self, err: &Error) {
        for listener in self
            .errors
            .read()
            .expect("error listener list poisoned")
            .iter()
        {
            listener(err);
        }
    }

    /// Broadcasts `message` to every message listener, in registration order.
    pub fn message(&self, message: &str) {
        for listener in self
            .messages
            .read()
            .expect("message listener list poisoned")
            .iter()
        {
            listener(message);
        }
    }
}
