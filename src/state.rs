use crate::bars::BarField;
use crate::config::VizConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// Everything the capture, render and settings paths contend over.
///
/// Configuration and bar heights live behind one lock so a reader never
/// sees the configuration from one settings apply combined with heights
/// from another.
pub struct VizState {
    pub config: VizConfig,
    pub bars: BarField,
}

impl VizState {
    pub fn new(config: VizConfig) -> Self {
        Self {
            config,
            bars: BarField::new(),
        }
    }
}

pub type SharedViz = Arc<Mutex<VizState>>;

/// Locks a mutex, recovering the value if a peer thread panicked while
/// holding it.
pub fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sleeps in short slices so a shutdown request is honored promptly.
pub fn sleep_cancellable(shutdown: &AtomicBool, total: Duration) {
    const SLICE: Duration = Duration::from_millis(100);
    let mut remaining = total;
    while !shutdown.load(Ordering::Relaxed) && !remaining.is_zero() {
        let step = remaining.min(SLICE);
        thread::sleep(step);
        remaining -= step;
    }
}

type Waker = Box<dyn Fn() + Send + Sync>;

/// Toolkit-independent dirty flag for the overlay surface.
///
/// Writers call [`request`](Self::request) after touching shared state.
/// The host installs its repaint handle as the waker and consumes the
/// flag with [`take`](Self::take) on each frame.
pub struct RedrawSignal {
    dirty: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

impl RedrawSignal {
    pub fn new() -> Self {
        Self {
            // starts dirty so the first frame paints
            dirty: AtomicBool::new(true),
            waker: Mutex::new(None),
        }
    }

    pub fn install_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *lock_or_recover(&self.waker) = Some(Box::new(waker));
    }

    /// Marks the surface dirty and pokes the waker if one is installed.
    pub fn request(&self) {
        self.dirty.store(true, Ordering::Release);
        if let Some(waker) = lock_or_recover(&self.waker).as_ref() {
            waker();
        }
    }

    /// Clears and returns the dirty flag.
    pub fn take(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    #[test]
    fn redraw_take_clears_the_flag() {
        let signal = RedrawSignal::new();
        assert!(signal.take());
        assert!(!signal.take());
        signal.request();
        assert!(signal.take());
        assert!(!signal.take());
    }

    #[test]
    fn request_pokes_the_installed_waker() {
        let signal = RedrawSignal::new();
        let pokes = Arc::new(AtomicUsize::new(0));
        let counter = pokes.clone();
        signal.install_waker(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        signal.request();
        signal.request();
        assert_eq!(pokes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn lock_recovers_after_a_poisoning_panic() {
        let shared = Arc::new(Mutex::new(5));
        let clone = shared.clone();
        let _ = thread::spawn(move || {
            let _guard = clone.lock().unwrap();
            panic!("poison it");
        })
        .join();
        assert_eq!(*lock_or_recover(&shared), 5);
    }

    #[test]
    fn cancelled_sleep_returns_early() {
        let shutdown = AtomicBool::new(true);
        let started = Instant::now();
        sleep_cancellable(&shutdown, Duration::from_secs(10));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
