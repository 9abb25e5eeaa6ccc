//! Breakpoints and single stepping on a running [`Hart`].
//!
//! The debugger drives the execution thread through the hart's pause/resume
//! controls. An after-execute hook counts down the step budget, checks
//! breakpoints and reports what stopped the hart over a channel.

use std::{
    collections::{BTreeSet, VecDeque},
    sync::{Arc, Mutex},
};

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};

use crate::{
    config::arch_config::WordType,
    hart::{
        Hart, HartController, exec_state::ExecutionState, fault::Fault, state::HartState,
    },
    utils::{UnsignedInteger, lock},
};

const HISTORY_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugEvent {
    StepCompleted { pc: WordType },
    BreakpointHit { pc: WordType },
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugError {
    #[error("target fault: {0}")]
    TargetFault(#[from] Fault),
    #[error("hart is not paused")]
    NotPaused,
    #[error("program finished")]
    Finished,
    #[error("debug event channel closed")]
    Disconnected,
}

#[derive(Debug, Default)]
struct Control {
    breakpoints: BTreeSet<WordType>,
    /// Steps left before pausing; `None` runs until a breakpoint.
    budget: Option<u64>,
    history: VecDeque<WordType>,
}

pub struct Debugger {
    controller: HartController,
    control: Arc<Mutex<Control>>,
    events: Receiver<DebugEvent>,
}

fn on_step(
    hs: &HartState,
    control: &Mutex<Control>,
    controller: &HartController,
    events: &Sender<DebugEvent>,
) {
    let pc = hs.pc.read();
    let mut control = lock(control);

    if let Some(last) = hs.last_executed() {
        if control.history.len() == HISTORY_LEN {
            control.history.pop_front();
        }
        control.history.push_back(last.pc);
    }

    let event = if control.breakpoints.contains(&pc) {
        DebugEvent::BreakpointHit { pc }
    } else {
        match control.budget.as_mut() {
            Some(left) => {
                *left = left.saturating_sub(1);
                if *left != 0 {
                    return;
                }
                DebugEvent::StepCompleted { pc }
            }
            None => return,
        }
    };

    control.budget = None;
    // the event must be queued before the controller can observe the pause
    let _ = events.send(event);
    let _ = controller.pause();
}

impl Debugger {
    /// Hook into `hart`. Must happen before the hart starts; start it with `init_paused`.
    pub fn attach(hart: &mut Hart) -> Result<Self, Fault> {
        let (sender, events) = channel::unbounded();
        let control = Arc::new(Mutex::new(Control::default()));
        let controller = hart.controller();
        hart.pause_on_ebreak()?;

        {
            let control = control.clone();
            let controller = controller.clone();
            hart.on_after_execute(move |hs| on_step(hs, &control, &controller, &sender))?;
        }

        Ok(Self {
            controller,
            control,
            events,
        })
    }

    pub fn set_breakpoint(&mut self, addr: WordType) -> bool {
        lock(&self.control).breakpoints.insert(addr)
    }

    pub fn clear_breakpoint(&mut self, addr: WordType) -> bool {
        lock(&self.control).breakpoints.remove(&addr)
    }

    pub fn breakpoints(&self) -> Vec<WordType> {
        lock(&self.control).breakpoints.iter().copied().collect()
    }

    pub fn step(&mut self) -> Result<DebugEvent, DebugError> {
        self.continue_until(1)
    }

    /// Run at most `max_steps` instructions, stopping early at a breakpoint.
    pub fn continue_until(&mut self, max_steps: u64) -> Result<DebugEvent, DebugError> {
        self.ensure_paused()?;
        if max_steps == 0 {
            return Ok(DebugEvent::StepCompleted { pc: self.read_pc() });
        }
        self.run(Some(max_steps))
    }

    pub fn continue_run(&mut self) -> Result<DebugEvent, DebugError> {
        self.ensure_paused()?;
        self.run(None)
    }

    fn ensure_paused(&self) -> Result<(), DebugError> {
        match self.controller.execution_state() {
            ExecutionState::Paused => Ok(()),
            ExecutionState::Running => Err(DebugError::NotPaused),
            ExecutionState::Stopped => Err(DebugError::Finished),
            ExecutionState::InvalidState => Err(self.fault().into()),
        }
    }

    fn fault(&self) -> Fault {
        self.controller
            .with_state(|hs| hs.fault())
            .unwrap_or(Fault::InvalidState)
    }

    fn run(&mut self, budget: Option<u64>) -> Result<DebugEvent, DebugError> {
        while self.events.try_recv().is_ok() {}
        lock(&self.control).budget = budget;

        self.controller.resume()?;
        let state = self.controller.wait_while_running();

        match self.events.try_recv() {
            Ok(event) => Ok(event),
            Err(err) => match state {
                // `ebreak` in the guest
                ExecutionState::Paused if err == TryRecvError::Empty => {
                    Ok(DebugEvent::BreakpointHit { pc: self.read_pc() })
                }
                ExecutionState::Paused => Err(DebugError::Disconnected),
                ExecutionState::InvalidState => Err(self.fault().into()),
                _ => Err(DebugError::Finished),
            },
        }
    }

    pub fn read_pc(&self) -> WordType {
        self.controller.with_state(|hs| hs.pc.read())
    }

    pub fn read_reg(&self, idx: u8) -> WordType {
        self.controller.with_state(|hs| hs.rf().raw(idx))
    }

    pub fn read_mem<T: UnsignedInteger>(&self, addr: WordType) -> Result<T, DebugError> {
        self.controller
            .with_state(|hs| hs.mem().peek::<T>(addr))
            .map_err(|err| DebugError::TargetFault(err.into()))
    }

    /// Addresses of the most recently executed instructions, oldest first.
    pub fn pc_history(&self) -> Vec<WordType> {
        lock(&self.control).history.iter().copied().collect()
    }

    pub fn controller(&self) -> &HartController {
        &self.controller
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        config::HartConfig,
        hart::{bootstrap::ProcessArgs, hart_tester::image_with_program, syscall::UnsupportedHost},
    };

    use super::*;

    fn paused_hart(program: &[u32]) -> (Hart, Debugger) {
        let mut hart = Hart::with_host(
            image_with_program(0x1000, program),
            0x1000,
            HartConfig::default(),
            Box::new(UnsupportedHost),
        );
        let debugger = Debugger::attach(&mut hart).unwrap();
        hart.init_paused(&ProcessArgs::default()).unwrap();
        (hart, debugger)
    }

    const COUNTER: [u32; 4] = [
        0x00128293, // addi x5, x5, 1
        0x00128293, // addi x5, x5, 1
        0x00128293, // addi x5, x5, 1
        0xff5ff06f, // jal x0, -12
    ];

    #[test]
    fn test_single_step() {
        let (_hart, mut debugger) = paused_hart(&COUNTER);

        assert_eq!(debugger.step(), Ok(DebugEvent::StepCompleted { pc: 0x1004 }));
        assert_eq!(debugger.read_reg(5), 1);
        assert_eq!(debugger.step(), Ok(DebugEvent::StepCompleted { pc: 0x1008 }));
        assert_eq!(debugger.pc_history(), vec![0x1000, 0x1004]);

        assert_eq!(
            debugger.continue_until(3),
            Ok(DebugEvent::StepCompleted { pc: 0x1004 })
        );
        assert_eq!(debugger.read_reg(5), 4);
        assert_eq!(
            debugger.read_mem::<u32>(0x100c),
            Ok(0xff5ff06f)
        );
    }

    #[test]
    fn test_breakpoints() {
        let (_hart, mut debugger) = paused_hart(&COUNTER);
        assert!(debugger.set_breakpoint(0x1008));
        assert!(!debugger.set_breakpoint(0x1008));
        assert_eq!(debugger.breakpoints(), vec![0x1008]);

        assert_eq!(
            debugger.continue_run(),
            Ok(DebugEvent::BreakpointHit { pc: 0x1008 })
        );
        assert_eq!(debugger.read_reg(5), 2);

        // leaving the breakpoint does not hit it again
        assert_eq!(
            debugger.continue_run(),
            Ok(DebugEvent::BreakpointHit { pc: 0x1008 })
        );
        assert_eq!(debugger.read_reg(5), 5);

        assert!(debugger.clear_breakpoint(0x1008));
        assert_eq!(
            debugger.continue_until(9),
            Ok(DebugEvent::StepCompleted { pc: 0x100c })
        );
    }

    #[test]
    fn test_run_to_end() {
        let (mut hart, mut debugger) = paused_hart(&[
            0x00500293, // addi x5, x0, 5
            0x0000006f, // jal x0, 0
        ]);
        assert_eq!(debugger.continue_run(), Err(DebugError::Finished));
        assert_eq!(debugger.step(), Err(DebugError::Finished));
        assert_eq!(hart.wait_till_done(), Ok(()));
    }

    #[test]
    fn test_fault_is_reported() {
        let (_hart, mut debugger) = paused_hart(&[0x00000013, 0xFFFF_FFFF]);
        debugger.step().unwrap();
        assert_eq!(
            debugger.step(),
            Err(DebugError::TargetFault(Fault::IllegalInstruction {
                word: 0xFFFF_FFFF,
                pc: 0x1004
            }))
        );
    }
}
