//=========================================================================
// Main Loop Controller
//=========================================================================
//
// Drives simulate → callback → dispatch cycles on the main thread while
// the core thread renders the previous frame.
//
// State machine:
//   Stopped ──run()──> Running ──stop()──> StopRequested ──> Stopped
//
// Iteration N:
//   1. Check RunState (exit if cleared)
//   2. Simulate (input poll, scene update)
//   3. Frame callback (main thread, synchronous)
//   4. Wait on FrameSignal for frame N-1
//   5. Dispatch frame N to the core thread (fire-and-forget)
//
// Step 4 caps outstanding render work at exactly one frame: frame N+1 is
// simulated while frame N renders, but never dispatched before frame N
// has signalled.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info};

//=== Internal Dependencies ===============================================

use super::FrameSignal;

//=== LoopState ===========================================================

/// Observable state of the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Not inside `run()`.
    Stopped,

    /// Iterating.
    Running,

    /// A stop was requested; the current iteration is finishing.
    StopRequested,
}

//=== RunState ============================================================

/// Monotonic "keep running" flag shared across threads.
///
/// Starts set. Once cleared it is never set again.
#[derive(Debug, Clone)]
pub struct RunState {
    running: Arc<AtomicBool>,
}

impl RunState {
    /// Creates a run state in the running position.
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Returns `false` once a stop has been requested.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Clears the flag. Returns `true` if this call cleared it.
    pub fn stop(&self) -> bool {
        self.running.swap(false, Ordering::AcqRel)
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

//=== StopHandle ==========================================================

/// Cloneable, `Send` handle for stopping the main loop from any thread.
///
/// The stop is cooperative: the iteration in progress completes (including
/// its wait on the frame signal) and the next one never starts.
#[derive(Debug, Clone)]
pub struct StopHandle {
    run_state: RunState,
}

impl StopHandle {
    /// Requests the main loop to stop after its current iteration.
    pub fn stop_main_loop(&self) {
        if self.run_state.stop() {
            info!(target: "app", "Main loop stop requested");
        }
    }

    /// Returns `true` once a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        !self.run_state.is_running()
    }
}

//=== FrameHooks ==========================================================

/// Per-iteration work driven by [`MainLoop::run`].
pub trait FrameHooks {
    type Error;

    /// Advances simulation state (input, scene).
    fn simulate(&mut self) -> Result<(), Self::Error>;

    /// Runs the per-frame callback hook.
    fn frame_callback(&mut self) -> Result<(), Self::Error>;

    /// Hands this frame's render work to the core thread. The render side
    /// must notify the frame signal exactly once when the work completes.
    fn dispatch(&mut self) -> Result<(), Self::Error>;
}

//=== MainLoop ============================================================

/// Main loop controller.
///
/// Clones share the same run state, so a clone can be used to observe
/// [`MainLoop::state`] from inside the hooks.
#[derive(Debug, Clone)]
pub struct MainLoop {
    run_state: RunState,
    active: Arc<AtomicBool>,
}

impl MainLoop {
    /// Creates a stopped loop whose run state is still set.
    pub fn new() -> Self {
        Self {
            run_state: RunState::new(),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    //--- Control ----------------------------------------------------------

    /// Handle that stops this loop from any thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            run_state: self.run_state.clone(),
        }
    }

    /// Requests the loop to stop at the next iteration boundary.
    pub fn stop(&self) {
        self.stop_handle().stop_main_loop();
    }

    /// Current loop state, observable from any clone.
    pub fn state(&self) -> LoopState {
        match (self.active.load(Ordering::Acquire), self.run_state.is_running()) {
            (false, _) => LoopState::Stopped,
            (true, true) => LoopState::Running,
            (true, false) => LoopState::StopRequested,
        }
    }

    //--- Execution --------------------------------------------------------

    /// Iterates until a stop is requested or a hook fails.
    ///
    /// Returns the number of completed iterations. Whatever the outcome,
    /// the last dispatched frame has finished and `signal` is left in the
    /// finished state when this returns.
    ///
    /// # Errors
    ///
    /// The first hook error ends the loop and is returned unchanged.
    pub fn run<H: FrameHooks>(&self, hooks: &mut H, signal: &FrameSignal) -> Result<u64, H::Error> {
        info!(target: "app", "Main loop started");
        self.active.store(true, Ordering::Release);

        let result = self.iterate(hooks, signal);

        signal.wait_idle();
        self.active.store(false, Ordering::Release);

        match &result {
            Ok(frames) => info!(target: "app", "Main loop stopped after {} frame(s)", frames),
            Err(_) => info!(target: "app", "Main loop aborted by error"),
        }
        result
    }

    fn iterate<H: FrameHooks>(&self, hooks: &mut H, signal: &FrameSignal) -> Result<u64, H::Error> {
        let mut frames = 0;

        while self.run_state.is_running() {
            hooks.simulate()?;
            hooks.frame_callback()?;

            signal.wait();

            if let Err(e) = hooks.dispatch() {
                // Nothing is in flight; restore the token for wait_idle().
                signal.notify();
                return Err(e);
            }

            frames += 1;
        }

        debug!(target: "app", "Run state cleared, leaving main loop");
        Ok(frames)
    }
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{unbounded, Receiver, Sender};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    //=====================================================================
    // Test Harness
    //=====================================================================

    /// Stand-in for the core thread: renders slowly and signals.
    struct FakeCore {
        sender: Option<Sender<u64>>,
        handle: Option<JoinHandle<()>>,
        outstanding: Arc<AtomicUsize>,
    }

    impl FakeCore {
        fn spawn(signal: FrameSignal, log: Arc<Mutex<Vec<String>>>, render_time: Duration) -> Self {
            let (sender, receiver): (Sender<u64>, Receiver<u64>) = unbounded();
            let outstanding = Arc::new(AtomicUsize::new(0));
            let in_flight = Arc::clone(&outstanding);

            let handle = thread::spawn(move || {
                while let Ok(frame) = receiver.recv() {
                    thread::sleep(render_time);
                    log.lock().unwrap().push(format!("render {}", frame));
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    signal.notify();
                }
            });

            Self {
                sender: Some(sender),
                handle: Some(handle),
                outstanding,
            }
        }
    }

    impl Drop for FakeCore {
        fn drop(&mut self) {
            self.sender.take();
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }

    struct Hooks {
        log: Arc<Mutex<Vec<String>>>,
        core: FakeCore,
        main_loop: MainLoop,
        frame: u64,
        stop_after: Option<u64>,
        fail_callback_at: Option<u64>,
        fail_dispatch_at: Option<u64>,
        max_outstanding: usize,
        states: Vec<LoopState>,
    }

    impl Hooks {
        fn new(main_loop: &MainLoop, signal: &FrameSignal, render_time: Duration) -> Self {
            let log = Arc::new(Mutex::new(Vec::new()));
            Self {
                core: FakeCore::spawn(signal.clone(), Arc::clone(&log), render_time),
                log,
                main_loop: main_loop.clone(),
                frame: 0,
                stop_after: None,
                fail_callback_at: None,
                fail_dispatch_at: None,
                max_outstanding: 0,
                states: Vec::new(),
            }
        }

        fn push(&self, entry: String) {
            self.log.lock().unwrap().push(entry);
        }

        fn entries(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl FrameHooks for Hooks {
        type Error = String;

        fn simulate(&mut self) -> Result<(), String> {
            self.push(format!("simulate {}", self.frame));
            Ok(())
        }

        fn frame_callback(&mut self) -> Result<(), String> {
            self.states.push(self.main_loop.state());
            if self.fail_callback_at == Some(self.frame) {
                return Err(format!("callback failed at {}", self.frame));
            }
            self.push(format!("callback {}", self.frame));
            if self.stop_after == Some(self.frame) {
                self.main_loop.stop();
                self.states.push(self.main_loop.state());
            }
            Ok(())
        }

        fn dispatch(&mut self) -> Result<(), String> {
            if self.fail_dispatch_at == Some(self.frame) {
                return Err("core thread gone".into());
            }
            let before = self.core.outstanding.fetch_add(1, Ordering::SeqCst);
            self.max_outstanding = self.max_outstanding.max(before + 1);
            self.push(format!("dispatch {}", self.frame));
            if let Some(sender) = &self.core.sender {
                sender.send(self.frame).unwrap();
            }
            self.frame += 1;
            Ok(())
        }
    }

    fn position(entries: &[String], needle: &str) -> usize {
        entries
            .iter()
            .position(|e| e == needle)
            .unwrap_or_else(|| panic!("{} missing from {:?}", needle, entries))
    }

    //=====================================================================
    // Stop Tests
    //=====================================================================

    #[test]
    fn stop_before_run_skips_simulation() {
        let main_loop = MainLoop::new();
        let signal = FrameSignal::new();
        let mut hooks = Hooks::new(&main_loop, &signal, Duration::ZERO);

        main_loop.stop();
        let frames = main_loop.run(&mut hooks, &signal).unwrap();

        assert_eq!(frames, 0);
        assert!(hooks.entries().is_empty());
        assert_eq!(main_loop.state(), LoopState::Stopped);
    }

    #[test]
    fn stop_during_iteration_completes_that_iteration_only() {
        let main_loop = MainLoop::new();
        let signal = FrameSignal::new();
        let mut hooks = Hooks::new(&main_loop, &signal, Duration::from_millis(1));
        hooks.stop_after = Some(2);

        let frames = main_loop.run(&mut hooks, &signal).unwrap();

        assert_eq!(frames, 3);
        let entries = hooks.entries();
        assert!(entries.contains(&"dispatch 2".to_string()), "Iteration 2 completes");
        assert!(!entries.contains(&"simulate 3".to_string()), "Iteration 3 never starts");
    }

    #[test]
    fn stop_from_other_thread_ends_loop() {
        let main_loop = MainLoop::new();
        let signal = FrameSignal::new();
        let mut hooks = Hooks::new(&main_loop, &signal, Duration::from_millis(1));

        let stopper = main_loop.stop_handle();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            stopper.stop_main_loop();
        });

        let frames = main_loop.run(&mut hooks, &signal).unwrap();
        handle.join().unwrap();

        assert!(frames > 0);
        assert_eq!(main_loop.state(), LoopState::Stopped);
    }

    #[test]
    fn run_state_never_restarts() {
        let main_loop = MainLoop::new();
        let signal = FrameSignal::new();
        let mut hooks = Hooks::new(&main_loop, &signal, Duration::ZERO);
        hooks.stop_after = Some(0);

        assert_eq!(main_loop.run(&mut hooks, &signal).unwrap(), 1);
        assert_eq!(main_loop.run(&mut hooks, &signal).unwrap(), 0);
        assert!(main_loop.stop_handle().is_stop_requested());
    }

    #[test]
    fn state_transitions_are_observable() {
        let main_loop = MainLoop::new();
        let signal = FrameSignal::new();
        let mut hooks = Hooks::new(&main_loop, &signal, Duration::ZERO);
        hooks.stop_after = Some(0);

        assert_eq!(main_loop.state(), LoopState::Stopped);
        main_loop.run(&mut hooks, &signal).unwrap();

        assert_eq!(hooks.states, vec![LoopState::Running, LoopState::StopRequested]);
        assert_eq!(main_loop.state(), LoopState::Stopped);
    }

    //=====================================================================
    // Ordering Tests
    //=====================================================================

    #[test]
    fn callback_runs_after_simulate_and_before_dispatch() {
        let main_loop = MainLoop::new();
        let signal = FrameSignal::new();
        let mut hooks = Hooks::new(&main_loop, &signal, Duration::ZERO);
        hooks.stop_after = Some(3);

        main_loop.run(&mut hooks, &signal).unwrap();

        let entries = hooks.entries();
        for frame in 0..=3 {
            let simulate = position(&entries, &format!("simulate {}", frame));
            let callback = position(&entries, &format!("callback {}", frame));
            let dispatch = position(&entries, &format!("dispatch {}", frame));
            assert!(simulate < callback && callback < dispatch, "{:?}", entries);
        }
        assert_eq!(entries.iter().filter(|e| e.starts_with("callback")).count(), 4);
    }

    #[test]
    fn previous_frame_renders_before_next_dispatch() {
        let main_loop = MainLoop::new();
        let signal = FrameSignal::new();
        let mut hooks = Hooks::new(&main_loop, &signal, Duration::from_millis(5));
        hooks.stop_after = Some(4);

        main_loop.run(&mut hooks, &signal).unwrap();

        let entries = hooks.entries();
        for frame in 0..4 {
            let rendered = position(&entries, &format!("render {}", frame));
            let next = position(&entries, &format!("dispatch {}", frame + 1));
            assert!(rendered < next, "{:?}", entries);
        }
        assert_eq!(hooks.max_outstanding, 1);
    }

    #[test]
    fn last_frame_finished_when_run_returns() {
        let main_loop = MainLoop::new();
        let signal = FrameSignal::new();
        let mut hooks = Hooks::new(&main_loop, &signal, Duration::from_millis(10));
        hooks.stop_after = Some(1);

        main_loop.run(&mut hooks, &signal).unwrap();

        assert!(hooks.entries().contains(&"render 1".to_string()));
        assert!(signal.is_finished());
    }

    //=====================================================================
    // Error Tests
    //=====================================================================

    #[test]
    fn callback_error_ends_loop_and_drains_frame() {
        let main_loop = MainLoop::new();
        let signal = FrameSignal::new();
        let mut hooks = Hooks::new(&main_loop, &signal, Duration::from_millis(5));
        hooks.fail_callback_at = Some(2);

        let err = main_loop.run(&mut hooks, &signal).unwrap_err();

        assert_eq!(err, "callback failed at 2");
        let entries = hooks.entries();
        assert!(entries.contains(&"render 1".to_string()), "Outstanding frame drained");
        assert!(!entries.contains(&"dispatch 2".to_string()));
        assert!(signal.is_finished());
        assert_eq!(main_loop.state(), LoopState::Stopped);
    }

    #[test]
    fn dispatch_error_restores_signal() {
        let main_loop = MainLoop::new();
        let signal = FrameSignal::new();
        let mut hooks = Hooks::new(&main_loop, &signal, Duration::ZERO);
        hooks.fail_dispatch_at = Some(1);

        let err = main_loop.run(&mut hooks, &signal).unwrap_err();

        assert_eq!(err, "core thread gone");
        assert!(signal.is_finished());
    }
}
