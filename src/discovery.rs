use std::any::Any;
use std::io;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use crate::addresses::InterfaceAddresses;
use crate::common::DiscoveryOptions;
use crate::device::NatDevice;
use crate::errors::DiscoveryError;
use crate::search::Searcher;
use crate::upnp::UpnpSearcher;

/// Notifications published by the discovery loop.
#[derive(Clone, Debug)]
pub enum DiscoveryEvent {
    /// A new gateway was found.
    DeviceFound(NatDevice),
    /// A searcher failed during a cycle. The loop keeps running.
    UnhandledError(Arc<DiscoveryError>),
}

// Returns false once the listener is gone and should be dropped.
pub(crate) type Listener = Box<dyn FnMut(&DiscoveryEvent) -> bool + Send>;

struct Shared {
    searching: AtomicBool,
    closed: AtomicBool,
    searchers: Mutex<Vec<Box<dyn Searcher>>>,
    listeners: Mutex<Vec<Listener>>,
    options: DiscoveryOptions,
}

/// Runs the searchers on a background thread and publishes what they find.
///
/// The loop starts idle: `initialize` spawns it, `start_discovery` and
/// `stop_discovery` toggle whether it searches. Dropping the discoverer ends
/// the loop after its current cycle.
pub struct NatDiscoverer {
    shared: Arc<Shared>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl NatDiscoverer {
    /// Create a discoverer without any searcher.
    pub fn new(options: DiscoveryOptions) -> NatDiscoverer {
        NatDiscoverer {
            shared: Arc::new(Shared {
                searching: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                searchers: Mutex::new(Vec::new()),
                listeners: Mutex::new(Vec::new()),
                options,
            }),
            worker: Mutex::new(None),
        }
    }

    /// Create a discoverer searching for UPnP gateways on every local
    /// interface.
    pub fn with_default_searchers(options: DiscoveryOptions) -> NatDiscoverer {
        let discoverer = NatDiscoverer::new(options.clone());
        discoverer.register(UpnpSearcher::new(&InterfaceAddresses, options));
        discoverer
    }

    /// Add a searcher to the loop. It is driven from the next cycle on.
    pub fn register<S>(&self, searcher: S)
    where
        S: Searcher + 'static,
    {
        lock(&self.shared.searchers).push(Box::new(searcher));
    }

    /// Spawn the discovery loop. Calling it again does nothing.
    pub fn initialize(&self) -> io::Result<()> {
        let mut worker = lock(&self.worker);
        if worker.is_some() {
            return Ok(());
        }
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("nat-discovery".into())
            .spawn(move || shared.run())?;
        *worker = Some(handle);
        Ok(())
    }

    pub fn start_discovery(&self) {
        if !self.shared.searching.swap(true, Ordering::SeqCst) {
            info!("discovery started");
        }
    }

    /// Stop searching. Takes effect before the next cycle; a cycle under way
    /// runs to completion.
    pub fn stop_discovery(&self) {
        if self.shared.searching.swap(false, Ordering::SeqCst) {
            info!("discovery stopped");
        }
    }

    pub fn is_searching(&self) -> bool {
        self.shared.searching.load(Ordering::SeqCst)
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> mpsc::Receiver<DiscoveryEvent> {
        let (tx, rx) = mpsc::channel();
        self.add_raw_listener(Box::new(move |event: &DiscoveryEvent| tx.send(event.clone()).is_ok()));
        rx
    }

    /// Call `listener` on the discovery thread for every event published
    /// from now on.
    pub fn add_listener<F>(&self, mut listener: F)
    where
        F: FnMut(&DiscoveryEvent) + Send + 'static,
    {
        self.add_raw_listener(Box::new(move |event: &DiscoveryEvent| {
            listener(event);
            true
        }));
    }

    pub(crate) fn add_raw_listener(&self, listener: Listener) {
        lock(&self.shared.listeners).push(listener);
    }
}

impl Drop for NatDiscoverer {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        if let Some(handle) = lock(&self.worker).take() {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                error!("discovery loop panicked");
            }
        }
    }
}

impl Shared {
    fn run(&self) {
        debug!("discovery loop running");
        while !self.closed.load(Ordering::SeqCst) {
            if self.searching.load(Ordering::SeqCst) {
                let events = self.cycle();
                for event in events {
                    self.publish(event);
                }
            }
            thread::sleep(self.options.loop_pause);
        }
        debug!("discovery loop closed");
    }

    // Drain replies to the previous requests before sending new ones.
    fn cycle(&self) -> Vec<DiscoveryEvent> {
        let mut events = Vec::new();
        let mut searchers = lock(&self.searchers);

        for searcher in searchers.iter_mut() {
            let mut found = Vec::new();
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                searcher.receive(&mut |device| found.push(device))
            }));
            events.extend(found.into_iter().map(DiscoveryEvent::DeviceFound));
            events.extend(failure(result));
        }

        for searcher in searchers.iter_mut() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| searcher.search()));
            events.extend(failure(result));
        }

        events
    }

    fn publish(&self, event: DiscoveryEvent) {
        match event {
            DiscoveryEvent::DeviceFound(ref device) => info!("device found: {}", device),
            DiscoveryEvent::UnhandledError(ref err) => warn!("discovery cycle failed: {}", err),
        }

        // listeners may subscribe others, so none is called under the lock
        let current = mem::replace(&mut *lock(&self.listeners), Vec::new());
        let mut live = Vec::with_capacity(current.len());
        for mut listener in current {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                Ok(true) => live.push(listener),
                Ok(false) => debug!("listener disconnected"),
                Err(_) => error!("listener panicked, removed"),
            }
        }

        let mut listeners = lock(&self.listeners);
        let added = mem::replace(&mut *listeners, live);
        listeners.extend(added);
    }
}

fn failure(result: thread::Result<Result<(), DiscoveryError>>) -> Option<DiscoveryEvent> {
    let err = match result {
        Ok(Ok(())) => return None,
        Ok(Err(err)) => err,
        Err(payload) => DiscoveryError::SearcherPanicked(panic_message(payload)),
    };
    Some(DiscoveryEvent::UnhandledError(Arc::new(err)))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::PmpDevice;
    use std::net::Ipv4Addr;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    const WAIT: Duration = Duration::from_secs(5);

    #[derive(Clone, Copy)]
    enum Behaviour {
        Fine,
        FailSearch,
        PanicReceive,
    }

    struct FakeSearcher {
        behaviour: Behaviour,
        calls: Arc<Mutex<Vec<&'static str>>>,
        reported: bool,
    }

    impl FakeSearcher {
        fn new(behaviour: Behaviour) -> (FakeSearcher, Arc<Mutex<Vec<&'static str>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let searcher = FakeSearcher {
                behaviour,
                calls: Arc::clone(&calls),
                reported: false,
            };
            (searcher, calls)
        }
    }

    impl Searcher for FakeSearcher {
        fn search(&mut self) -> Result<(), DiscoveryError> {
            self.calls.lock().unwrap().push("search");
            match self.behaviour {
                Behaviour::FailSearch => Err(DiscoveryError::IoError(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "broadcast denied",
                ))),
                _ => Ok(()),
            }
        }

        fn receive(&mut self, found: &mut dyn FnMut(NatDevice)) -> Result<(), DiscoveryError> {
            self.calls.lock().unwrap().push("receive");
            if let Behaviour::PanicReceive = self.behaviour {
                panic!("hostile reply");
            }
            if !self.reported {
                self.reported = true;
                found(NatDevice::Pmp(PmpDevice {
                    local_addr: "192.168.1.10".parse().unwrap(),
                    gateway: Ipv4Addr::new(192, 168, 1, 1),
                    public_addr: Ipv4Addr::new(203, 0, 113, 7),
                }));
            }
            Ok(())
        }
    }

    fn options() -> DiscoveryOptions {
        DiscoveryOptions {
            loop_pause: Duration::from_millis(1),
            ..DiscoveryOptions::default()
        }
    }

    fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_idle_until_started() {
        let discoverer = NatDiscoverer::new(options());
        let (searcher, calls) = FakeSearcher::new(Behaviour::Fine);
        discoverer.register(searcher);
        discoverer.initialize().unwrap();

        thread::sleep(Duration::from_millis(30));
        assert!(calls.lock().unwrap().is_empty());
        assert!(!discoverer.is_searching());
    }

    #[test]
    fn test_receive_before_search() {
        let discoverer = NatDiscoverer::new(options());
        let (searcher, calls) = FakeSearcher::new(Behaviour::Fine);
        discoverer.register(searcher);
        discoverer.initialize().unwrap();
        discoverer.start_discovery();

        assert!(wait_for(|| calls.lock().unwrap().len() >= 6));
        discoverer.stop_discovery();
        let calls = calls.lock().unwrap();
        for pair in calls.chunks(2).filter(|pair| pair.len() == 2) {
            assert_eq!(pair, &["receive", "search"][..]);
        }
    }

    #[test]
    fn test_device_found_published() {
        let discoverer = NatDiscoverer::new(options());
        let (searcher, _) = FakeSearcher::new(Behaviour::Fine);
        discoverer.register(searcher);
        let events = discoverer.subscribe();
        let counted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&counted);
        discoverer.add_listener(move |event| {
            if let DiscoveryEvent::DeviceFound(_) = event {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        discoverer.initialize().unwrap();
        discoverer.start_discovery();

        match events.recv_timeout(WAIT).unwrap() {
            DiscoveryEvent::DeviceFound(NatDevice::Pmp(device)) => {
                assert_eq!(device.gateway, Ipv4Addr::new(192, 168, 1, 1))
            }
            other => panic!("unexpected event: {:?}", other),
        }
        thread::sleep(Duration::from_millis(20));
        assert_eq!(counted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failures_do_not_stop_the_loop() {
        let discoverer = NatDiscoverer::new(options());
        let (panicking, _) = FakeSearcher::new(Behaviour::PanicReceive);
        let (failing, _) = FakeSearcher::new(Behaviour::FailSearch);
        let (healthy, healthy_calls) = FakeSearcher::new(Behaviour::Fine);
        discoverer.register(panicking);
        discoverer.register(failing);
        discoverer.register(healthy);
        let events = discoverer.subscribe();
        discoverer.initialize().unwrap();
        discoverer.start_discovery();

        let mut panicked = 0;
        let mut failed = 0;
        let deadline = Instant::now() + WAIT;
        while (panicked < 2 || failed < 2) && Instant::now() < deadline {
            if let Ok(DiscoveryEvent::UnhandledError(err)) = events.recv_timeout(WAIT) {
                match *err {
                    DiscoveryError::SearcherPanicked(ref msg) => {
                        assert_eq!(msg, "hostile reply");
                        panicked += 1;
                    }
                    DiscoveryError::IoError(_) => failed += 1,
                    ref other => panic!("unexpected error: {:?}", other),
                }
            }
        }
        assert!(panicked >= 2 && failed >= 2);
        assert!(healthy_calls.lock().unwrap().len() >= 4);
    }

    #[test]
    fn test_stop_then_start_resumes() {
        let discoverer = NatDiscoverer::new(options());
        let (searcher, calls) = FakeSearcher::new(Behaviour::Fine);
        discoverer.register(searcher);
        discoverer.initialize().unwrap();
        discoverer.initialize().unwrap();

        discoverer.start_discovery();
        discoverer.start_discovery();
        assert!(wait_for(|| !calls.lock().unwrap().is_empty()));

        discoverer.stop_discovery();
        discoverer.stop_discovery();
        thread::sleep(Duration::from_millis(30));
        let stopped_at = calls.lock().unwrap().len();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(calls.lock().unwrap().len(), stopped_at);

        discoverer.stop_discovery();
        discoverer.start_discovery();
        assert!(wait_for(|| calls.lock().unwrap().len() > stopped_at));
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let discoverer = NatDiscoverer::new(options());
        drop(discoverer.subscribe());
        discoverer.shared.publish(DiscoveryEvent::UnhandledError(Arc::new(DiscoveryError::SearcherPanicked(
            "boom".into(),
        ))));
        assert!(lock(&discoverer.shared.listeners).is_empty());
    }

    #[test]
    fn test_drop_stops_the_loop() {
        let (searcher, calls) = FakeSearcher::new(Behaviour::Fine);
        {
            let discoverer = NatDiscoverer::new(options());
            discoverer.register(searcher);
            discoverer.initialize().unwrap();
            discoverer.start_discovery();
            assert!(wait_for(|| !calls.lock().unwrap().is_empty()));
        }
        let after_drop = calls.lock().unwrap().len();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(calls.lock().unwrap().len(), after_drop);
    }
}
