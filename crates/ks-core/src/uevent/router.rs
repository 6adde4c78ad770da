//! Uevent dispatch to independent handlers.
//!
//! The router holds a fixed ordered list of handlers. Every handler is
//! invoked for every decoded field table; each one checks for the fields
//! it needs and silently no-ops when they are absent or fail its own
//! validation. A handler error is logged and contained; handlers never
//! observe each other's failures and there is no early exit.

use super::parser::FieldTable;
use crate::sink::TelemetrySink;
use crate::source::RawSource;
use ks_common::Result;
use tracing::warn;

/// Shared context for handler invocations.
pub struct HandlerCx<'a> {
    pub sink: &'a dyn TelemetrySink,
    pub source: &'a dyn RawSource,
}

/// One uevent consumer.
pub trait UeventHandler: Send {
    fn name(&self) -> &'static str;
    fn handle(&mut self, fields: &FieldTable, cx: &HandlerCx<'_>) -> Result<()>;
}

/// Fixed ordered handler list.
pub struct Router {
    handlers: Vec<Box<dyn UeventHandler>>,
}

impl Router {
    pub fn new(handlers: Vec<Box<dyn UeventHandler>>) -> Self {
        Self { handlers }
    }

    /// Invoke every handler on `fields`, containing per-handler failures.
    pub fn dispatch(&mut self, fields: &FieldTable, cx: &HandlerCx<'_>) {
        for handler in &mut self.handlers {
            if let Err(e) = handler.handle(fields, cx) {
                warn!(
                    target: "ks_core::uevent",
                    handler = handler.name(),
                    category = %e.category(),
                    error = %e,
                    "uevent handler failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;
    use crate::source::SysfsSource;
    use crate::uevent::parser::FieldKey;
    use ks_common::Error;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct ProbeHandler {
        name: &'static str,
        calls: Arc<AtomicU32>,
        fail: bool,
    }

    impl UeventHandler for ProbeHandler {
        fn name(&self) -> &'static str {
            self.name
        }

        fn handle(&mut self, fields: &FieldTable, _cx: &HandlerCx<'_>) -> Result<()> {
            // Requires a driver field; no-op without it.
            if fields.get(FieldKey::Driver).is_none() {
                return Ok(());
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::malformed("uevent", "synthetic handler failure"));
            }
            Ok(())
        }
    }

    #[test]
    fn all_handlers_run_despite_failure() {
        let first_calls = Arc::new(AtomicU32::new(0));
        let second_calls = Arc::new(AtomicU32::new(0));
        let mut router = Router::new(vec![
            Box::new(ProbeHandler {
                name: "failing",
                calls: Arc::clone(&first_calls),
                fail: true,
            }),
            Box::new(ProbeHandler {
                name: "healthy",
                calls: Arc::clone(&second_calls),
                fail: false,
            }),
        ]);

        let mut fields = FieldTable::new();
        fields.set(FieldKey::Driver, "x");
        let sink = RecordingSink::new();
        let source = SysfsSource::new("/nonexistent");
        router.dispatch(
            &fields,
            &HandlerCx {
                sink: &sink,
                source: &source,
            },
        );

        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handlers_no_op_without_required_fields() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut router = Router::new(vec![Box::new(ProbeHandler {
            name: "probe",
            calls: Arc::clone(&calls),
            fail: false,
        })]);

        let sink = RecordingSink::new();
        let source = SysfsSource::new("/nonexistent");
        router.dispatch(
            &FieldTable::new(),
            &HandlerCx {
                sink: &sink,
                source: &source,
            },
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
