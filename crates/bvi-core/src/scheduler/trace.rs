use std::{
    backtrace::Backtrace,
    future::Future,
    sync::{Arc, Once},
};

use parking_lot::Mutex;

/// Backtrace recorded by the panic hook for the current job, if it panicked.
pub(super) type TraceSlot = Arc<Mutex<Option<String>>>;

tokio::task_local! {
    static TRACE: TraceSlot;
}

static HOOK: Once = Once::new();

/// Chain a process panic hook that records a backtrace for panics inside [`traced`] futures.
///
/// Panics elsewhere only reach the previous hook.
pub(super) fn install_hook() {
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let _ = TRACE.try_with(|slot| {
                *slot.lock() = Some(Backtrace::force_capture().to_string());
            });
            previous(info);
        }));
    });
}

/// Run `fut` with a fresh trace slot.
pub(super) fn traced<F: Future>(fut: F) -> (TraceSlot, impl Future<Output = F::Output>) {
    let slot = TraceSlot::default();
    (Arc::clone(&slot), TRACE.scope(slot, fut))
}

/// Panic payload followed by the recorded backtrace.
pub(super) fn panic_detail(message: String, slot: &TraceSlot) -> String {
    match slot.lock().take() {
        Some(trace) => format!("{message}\n{trace}"),
        None => message,
    }
}
