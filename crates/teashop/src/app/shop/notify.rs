use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ServeSignal {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub(crate) struct ListenerError(String);

impl ListenerError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub(crate) type ServeListener = Box<dyn FnMut() -> Result<(), ListenerError>>;

struct Registration {
    name: &'static str,
    signal: ServeSignal,
    listener: ServeListener,
}

/// Zero-argument serve notifications. A failing listener is logged and the
/// remaining listeners still run.
#[derive(Default)]
pub(crate) struct ServeNotifier {
    registrations: Vec<Registration>,
}

impl ServeNotifier {
    pub(crate) fn subscribe(
        &mut self,
        signal: ServeSignal,
        name: &'static str,
        listener: ServeListener,
    ) {
        self.registrations.push(Registration {
            name,
            signal,
            listener,
        });
    }

    /// Returns how many listeners completed without error.
    pub(crate) fn emit(&mut self, signal: ServeSignal) -> usize {
        let mut delivered = 0;
        for registration in self
            .registrations
            .iter_mut()
            .filter(|registration| registration.signal == signal)
        {
            match (registration.listener)() {
                Ok(()) => delivered += 1,
                Err(error) => warn!(
                    listener = registration.name,
                    signal = ?signal,
                    error = %error,
                    "serve_listener_failed"
                ),
            }
        }
        delivered
    }
}

impl std::fmt::Debug for ServeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServeNotifier")
            .field(
                "listeners",
                &self
                    .registrations
                    .iter()
                    .map(|registration| registration.name)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn failing_listener_does_not_stop_delivery() {
        let calls = Rc::new(Cell::new(0));
        let mut notifier = ServeNotifier::default();

        let first = Rc::clone(&calls);
        notifier.subscribe(
            ServeSignal::Succeeded,
            "first",
            Box::new(move || {
                first.set(first.get() + 1);
                Ok(())
            }),
        );
        notifier.subscribe(
            ServeSignal::Succeeded,
            "broken",
            Box::new(|| Err(ListenerError::new("ledger offline"))),
        );
        let last = Rc::clone(&calls);
        notifier.subscribe(
            ServeSignal::Succeeded,
            "last",
            Box::new(move || {
                last.set(last.get() + 10);
                Ok(())
            }),
        );

        assert_eq!(notifier.emit(ServeSignal::Succeeded), 2);
        assert_eq!(calls.get(), 11);
    }

    #[test]
    fn listeners_only_hear_their_signal() {
        let failures = Rc::new(Cell::new(0));
        let mut notifier = ServeNotifier::default();
        let counter = Rc::clone(&failures);
        notifier.subscribe(
            ServeSignal::Failed,
            "failures",
            Box::new(move || {
                counter.set(counter.get() + 1);
                Ok(())
            }),
        );

        assert_eq!(notifier.emit(ServeSignal::Succeeded), 0);
        assert_eq!(notifier.emit(ServeSignal::Failed), 1);
        assert_eq!(failures.get(), 1);
    }
}
