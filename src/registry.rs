//! Canonical test and handler registry.
//!
//! The registry is a single source of truth: it is constructed once at the
//! entry point, populated by an explicit initialization phase, and passed by
//! reference to the run loop. Registration is append-only; insertion order is
//! execution order for tests and consultation order for handlers. There is no
//! deduplication, no validation, and no removal.

use std::any::Any;

/// One named, registered unit of behavior to execute and judge.
///
/// The body takes no input and must be callable any number of times with
/// identical expected behavior per call, since a multi-repeat run invokes it
/// once per configured repetition.
pub struct Test {
    name: String,
    body: Box<dyn Fn()>,
}

impl Test {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn call(&self) {
        (self.body)()
    }
}

/// A registered converter that may reclassify an arbitrary panic payload as a
/// harness failure.
///
/// A handler inspects the payload and either raises a failure itself (via
/// [`crate::expect::raise_failure`] or the `fail!` macro) or returns without
/// raising, which declines the payload and passes it to the next handler.
pub struct Handler {
    convert: Box<dyn Fn(&(dyn Any + Send))>,
}

impl Handler {
    pub(crate) fn call(&self, payload: &(dyn Any + Send)) {
        (self.convert)(payload)
    }
}

/// Ordered collections of declared tests and handlers.
#[derive(Default)]
pub struct Registry {
    tests: Vec<Test>,
    handlers: Vec<Handler>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a test. Names need not be unique.
    pub fn register_test<F>(&mut self, name: impl Into<String>, body: F)
    where
        F: Fn() + 'static,
    {
        self.tests.push(Test {
            name: name.into(),
            body: Box::new(body),
        });
    }

    /// Append an error handler. Handlers are consulted in registration order;
    /// the first one to convert a payload wins.
    pub fn register_handler<F>(&mut self, convert: F)
    where
        F: Fn(&(dyn Any + Send)) + 'static,
    {
        self.handlers.push(Handler {
            convert: Box::new(convert),
        });
    }

    pub fn tests(&self) -> &[Test] {
        &self.tests
    }

    pub(crate) fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}
