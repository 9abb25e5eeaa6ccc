//! One simulated hart: state, execution engine and the thread that drives it.

pub mod bootstrap;
pub mod exec_state;
pub mod executor;
pub mod fault;
pub mod state;
pub mod sync_point;
pub mod syscall;

#[cfg(test)]
pub(crate) mod hart_tester;

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread::{self, JoinHandle},
};

use crate::{
    config::{HartConfig, arch_config::WordType},
    event::{MemoryAllocate, MemoryRead, MemoryWrite, RegisterRead, RegisterWrite},
    mem::MemoryImage,
    utils::lock,
};

use bootstrap::ProcessArgs;
use exec_state::{ExecutionState, StateMonitor};
use executor::Executor;
use fault::Fault;
use state::HartState;
use sync_point::SyncPoint;
use syscall::{HostSyscall, SyscallBridge};

/// Cloneable control handle usable from any thread, including hooks.
#[derive(Clone)]
pub struct HartController {
    state: Arc<Mutex<HartState>>,
    monitor: Arc<StateMonitor>,
    /// Controllers queued on `state`; the execution thread steps aside for them.
    waiters: Arc<AtomicUsize>,
}

/// Holds a place in the `waiters` count, even if the accessor panics.
struct WaiterTicket<'a>(&'a AtomicUsize);

impl<'a> WaiterTicket<'a> {
    fn take(waiters: &'a AtomicUsize) -> Self {
        waiters.fetch_add(1, Ordering::AcqRel);
        Self(waiters)
    }
}

impl Drop for WaiterTicket<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl HartController {
    pub fn execution_state(&self) -> ExecutionState {
        self.monitor.state()
    }

    pub fn pause(&self) -> Result<(), Fault> {
        self.monitor.pause()
    }

    pub fn resume(&self) -> Result<(), Fault> {
        self.monitor.resume()
    }

    pub fn stop(&self) -> Result<(), Fault> {
        self.monitor.stop()
    }

    /// Block until the hart is no longer running.
    pub fn wait_while_running(&self) -> ExecutionState {
        self.monitor.wait_while_running()
    }

    /// Inspect the hart state. While running, the execution thread hands the
    /// state over after the instruction in flight and waits until `f` returns.
    /// Must not be called from a hook.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut HartState) -> R) -> R {
        let _ticket = WaiterTicket::take(&self.waiters);
        let mut hs = lock(&self.state);
        f(&mut hs)
    }
}

pub struct Hart {
    controller: HartController,
    config: HartConfig,
    /// Moved into the execution thread by `init`.
    executor: Option<Executor>,
    thread: Option<JoinHandle<()>>,
}

impl Hart {
    /// A hart over `mem` that starts at `entry`, backed by the platform's host syscalls.
    pub fn new(mem: MemoryImage, entry: WordType, config: HartConfig) -> Self {
        let syscalls = SyscallBridge::native(config.seed);
        Self::with_bridge(mem, entry, config, syscalls)
    }

    pub fn with_host(
        mem: MemoryImage,
        entry: WordType,
        config: HartConfig,
        host: Box<dyn HostSyscall>,
    ) -> Self {
        let syscalls = SyscallBridge::new(host, config.seed);
        Self::with_bridge(mem, entry, config, syscalls)
    }

    fn with_bridge(
        mem: MemoryImage,
        entry: WordType,
        config: HartConfig,
        syscalls: SyscallBridge,
    ) -> Self {
        Self {
            controller: HartController {
                state: Arc::new(Mutex::new(HartState::new(mem, entry))),
                monitor: Arc::new(StateMonitor::new()),
                waiters: Arc::new(AtomicUsize::new(0)),
            },
            config,
            executor: Some(Executor::new(syscalls)),
            thread: None,
        }
    }

    pub fn controller(&self) -> HartController {
        self.controller.clone()
    }

    pub fn config(&self) -> &HartConfig {
        &self.config
    }

    pub fn execution_state(&self) -> ExecutionState {
        self.controller.execution_state()
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut HartState) -> R) -> R {
        self.controller.with_state(f)
    }

    fn executor_mut(&mut self) -> Result<&mut Executor, Fault> {
        self.executor.as_mut().ok_or(Fault::InvalidState)
    }

    /// Run `f` on the state, but only before the execution thread exists.
    fn before_start<R>(&self, f: impl FnOnce(&mut HartState) -> R) -> Result<R, Fault> {
        if self.executor.is_none() {
            return Err(Fault::InvalidState);
        }
        Ok(self.with_state(f))
    }

    pub fn on_before_execute<F>(&mut self, f: F) -> Result<(), Fault>
    where
        F: FnMut(&HartState) + Send + 'static,
    {
        self.executor_mut()?.before_execute.subscribe(f);
        Ok(())
    }

    pub fn on_after_execute<F>(&mut self, f: F) -> Result<(), Fault>
    where
        F: FnMut(&HartState) + Send + 'static,
    {
        self.executor_mut()?.after_execute.subscribe(f);
        Ok(())
    }

    pub fn on_register_read<F>(&mut self, f: F) -> Result<(), Fault>
    where
        F: FnMut(&RegisterRead) + Send + 'static,
    {
        self.before_start(|hs| hs.rf_mut().gpr_mut().on_read.subscribe(f))
    }

    pub fn on_register_write<F>(&mut self, f: F) -> Result<(), Fault>
    where
        F: FnMut(&RegisterWrite) + Send + 'static,
    {
        self.before_start(|hs| hs.rf_mut().gpr_mut().on_write.subscribe(f))
    }

    pub fn on_memory_allocate<F>(&mut self, f: F) -> Result<(), Fault>
    where
        F: FnMut(&MemoryAllocate) + Send + 'static,
    {
        self.before_start(|hs| hs.mem_mut().on_allocate.subscribe(f))
    }

    pub fn on_memory_read<F>(&mut self, f: F) -> Result<(), Fault>
    where
        F: FnMut(&MemoryRead) + Send + 'static,
    {
        self.before_start(|hs| hs.mem_mut().on_read.subscribe(f))
    }

    pub fn on_memory_write<F>(&mut self, f: F) -> Result<(), Fault>
    where
        F: FnMut(&MemoryWrite) + Send + 'static,
    {
        self.before_start(|hs| hs.mem_mut().on_write.subscribe(f))
    }

    /// Make a guest `ebreak` pause the hart instead of ending the run.
    pub fn pause_on_ebreak(&mut self) -> Result<(), Fault> {
        self.before_start(|hs| hs.set_pause_on_ebreak(true))
    }

    /// Bootstrap the process image and start executing.
    pub fn init(&mut self, args: &ProcessArgs) -> Result<(), Fault> {
        self.start(args, ExecutionState::Running)
    }

    /// Like [`Self::init`], but the hart waits in `Paused` for a `resume`.
    pub fn init_paused(&mut self, args: &ProcessArgs) -> Result<(), Fault> {
        self.start(args, ExecutionState::Paused)
    }

    fn start(&mut self, args: &ProcessArgs, initial: ExecutionState) -> Result<(), Fault> {
        if self.controller.monitor.has_started() {
            return Err(Fault::InvalidState);
        }
        let executor = self.executor.take().ok_or(Fault::InvalidState)?;

        let gate = SyncPoint::new();
        let thread = {
            let gate = gate.clone();
            let controller = self.controller.clone();
            thread::Builder::new()
                .name("hart".into())
                .spawn(move || {
                    gate.wait();
                    execute(controller, executor);
                })
                .map_err(|err| {
                    log::error!("failed to spawn the execution thread: {}", err);
                    Fault::InvalidState
                })?
        };
        self.thread = Some(thread);

        let booted = self.with_state(|hs| bootstrap::init_process(hs, args, &self.config));
        let result = match booted {
            Ok(()) => self.controller.monitor.start(initial),
            Err(fault) => {
                log::error!("process bootstrap failed: {}", fault);
                self.with_state(|hs| hs.set_fault(fault));
                self.controller.monitor.fail();
                Err(fault)
            }
        };

        gate.signal();
        result
    }

    pub fn pause(&self) -> Result<(), Fault> {
        self.controller.pause()
    }

    pub fn resume(&self) -> Result<(), Fault> {
        self.controller.resume()
    }

    pub fn stop(&self) -> Result<(), Fault> {
        self.controller.stop()
    }

    /// Join the execution thread. `Ok` if the run ended without a fault.
    pub fn wait_till_done(&mut self) -> Result<(), Fault> {
        let thread = self.thread.take().ok_or(Fault::InvalidState)?;
        if thread.join().is_err() {
            log::error!("execution thread panicked");
            self.controller.monitor.fail();
        }

        match self.execution_state() {
            ExecutionState::InvalidState => {
                Err(self.with_state(|hs| hs.fault()).unwrap_or(Fault::InvalidState))
            }
            _ => Ok(()),
        }
    }
}

impl Drop for Hart {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.controller.stop();
            let _ = thread.join();
        }
    }
}

/// Body of the execution thread.
fn execute(controller: HartController, mut executor: Executor) {
    let HartController {
        state,
        monitor,
        waiters,
    } = controller;

    loop {
        if monitor.wait_while_paused() != ExecutionState::Running {
            break;
        }
        while waiters.load(Ordering::Acquire) > 0 {
            thread::yield_now();
        }

        let mut hs = lock(&state);
        if let Err(fault) = executor.step(&mut hs) {
            log::error!("hart fault: {}", fault);
            hs.set_fault(fault);
            monitor.fail();
            break;
        }

        if let Some(reason) = Executor::halt_reason(&hs) {
            log::info!("hart halted: {:?}", reason);
            hs.set_halt_reason(reason);
            monitor.halt();
            break;
        }

        if hs.take_pause_request() {
            // a concurrent stop wins over the request
            let _ = monitor.pause();
        }
    }

    log::debug!("execution thread exits in {:?}", monitor.state());
}
