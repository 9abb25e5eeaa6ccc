mod common;

use std::{
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use common::*;
use hartsim::{
    Emulator,
    config::HartConfig,
    debugger::{DebugError, DebugEvent, Debugger},
    hart::{
        Hart,
        bootstrap::ProcessArgs,
        exec_state::ExecutionState,
        executor::HaltReason,
        fault::Fault,
        syscall::{HostSyscall, Sysno, UnsupportedHost},
    },
    isa::RiscvInstr,
    load,
    mem::MemoryImage,
    trace::{Stats, TraceMode, TraceSink, Tracer},
};

const ENTRY: u64 = 0x1_0000;

/// Captures everything the guest writes; nothing reaches the real host.
#[derive(Clone, Default)]
struct RecordingHost {
    output: Arc<Mutex<Vec<(i32, Vec<u8>)>>>,
}

impl RecordingHost {
    fn written(&self) -> Vec<(i32, Vec<u8>)> {
        self.output.lock().unwrap().clone()
    }
}

impl HostSyscall for RecordingHost {
    fn remap(&self, _sysno: Sysno) -> Option<i64> {
        None
    }

    fn invoke(&mut self, _nr: i64, _args: [u64; 6]) -> i64 {
        unreachable!("nothing is remapped")
    }

    fn write(&mut self, fd: i32, buf: &[u8]) -> i64 {
        self.output.lock().unwrap().push((fd, buf.to_vec()));
        buf.len() as i64
    }
}

fn hart_from_elf(elf: &[u8], host: Box<dyn HostSyscall>) -> Hart {
    let config = HartConfig::default();
    let mut mem = MemoryImage::new(config.arena_size);
    let image = load::load_elf(&mut mem, elf).unwrap();
    assert_eq!(image.entry, ENTRY);
    Hart::with_host(mem, image.entry, config, host)
}

/// sum 1..=10 into t1, store it at DATA_VADDR, then spin.
fn sum_program() -> Vec<u32> {
    vec![
        li(T0, 10),         // 0x00
        li(T1, 0),          // 0x04
        beq(T0, ZERO, 16),  // 0x08
        add(T1, T1, T0),    // 0x0c
        addi(T0, T0, -1),   // 0x10
        jal(ZERO, -12),     // 0x14
        lui(A1, 0x2_0000),  // 0x18
        sd(T1, A1, 0),      // 0x1c
        jal(ZERO, 0),       // 0x20
    ]
}

#[test]
fn test_run_to_self_jump() {
    let elf = build_elf(ENTRY, &sum_program(), &[0; 8]);
    let mut emu = Emulator::from_hart(hart_from_elf(&elf, Box::new(UnsupportedHost)));

    let summary = emu.run(&ProcessArgs::default()).unwrap();
    assert_eq!(summary.halt_reason, Some(HaltReason::SelfJump(ENTRY + 0x20)));
    assert_eq!(summary.exit_code, None);
    assert_eq!(summary.pc, ENTRY + 0x20);

    emu.hart().with_state(|hs| {
        assert_eq!(hs.rf().raw(T1), 55);
        assert_eq!(hs.rf().raw(T0), 0);
        assert_eq!(hs.mem().peek::<u64>(DATA_VADDR), Ok(55));
    });
    assert_eq!(emu.hart().execution_state(), ExecutionState::Stopped);
}

#[test]
fn test_write_and_exit() {
    let host = RecordingHost::default();
    let mut text = vec![
        lui(A1, 0x2_0000),
        li(A0, 1),
        li(A2, 6),
        li(A7, SYS_WRITE),
        ecall(),
    ];
    text.extend(exit(3));
    let elf = build_elf(ENTRY, &text, b"hello\n");

    let mut emu = Emulator::from_hart(hart_from_elf(&elf, Box::new(host.clone())));
    let summary = emu.run(&ProcessArgs::new(vec!["hello".into()])).unwrap();

    assert_eq!(summary.halt_reason, Some(HaltReason::Exited(3)));
    assert_eq!(summary.exit_code, Some(3));
    assert_eq!(host.written(), vec![(1, b"hello\n".to_vec())]);
}

#[test]
fn test_process_arguments_on_stack() {
    let elf = build_elf(ENTRY, &exit(0), &[0; 8]);
    let mut emu = Emulator::from_hart(hart_from_elf(&elf, Box::new(UnsupportedHost)));
    let args = ProcessArgs::new(vec!["prog".into(), "first".into()]).env("HOME", "/");
    emu.run(&args).unwrap();

    emu.hart().with_state(|hs| {
        let read_str = |mut addr: u64| {
            let mut bytes = Vec::new();
            loop {
                let b: u8 = hs.mem().peek(addr).unwrap();
                if b == 0 {
                    break String::from_utf8(bytes).unwrap();
                }
                bytes.push(b);
                addr += 1;
            }
        };

        let sp = hs.rf().raw(SP);
        assert_eq!(sp % 16, 0);
        assert_eq!(hs.mem().peek::<u64>(sp), Ok(2));
        let argv0 = hs.mem().peek::<u64>(sp + 8).unwrap();
        let argv1 = hs.mem().peek::<u64>(sp + 16).unwrap();
        assert_eq!(read_str(argv0), "prog");
        assert_eq!(read_str(argv1), "first");
        assert_eq!(hs.mem().peek::<u64>(sp + 24), Ok(0));
        let envp0 = hs.mem().peek::<u64>(sp + 32).unwrap();
        assert_eq!(read_str(envp0), "HOME=/");
        assert_eq!(hs.mem().peek::<u64>(sp + 40), Ok(0));
    });
}

#[test]
fn test_illegal_instruction_faults() {
    let elf = build_elf(ENTRY, &[li(T0, 1), 0xFFFF_FFFF], &[0; 8]);
    let mut emu = Emulator::from_hart(hart_from_elf(&elf, Box::new(UnsupportedHost)));

    let fault = Fault::IllegalInstruction {
        word: 0xFFFF_FFFF,
        pc: ENTRY + 4,
    };
    assert_eq!(emu.run(&ProcessArgs::default()), Err(fault));
    assert_eq!(emu.hart().execution_state(), ExecutionState::InvalidState);
    emu.hart().with_state(|hs| {
        assert_eq!(hs.fault(), Some(fault));
        assert_eq!(hs.rf().raw(T0), 1);
    });
}

#[test]
fn test_store_outside_memory_faults() {
    let elf = build_elf(ENTRY, &[lui(A1, 0x4000_0000), sd(T0, A1, 0)], &[0; 8]);
    let mut emu = Emulator::from_hart(hart_from_elf(&elf, Box::new(UnsupportedHost)));
    assert_eq!(
        emu.run(&ProcessArgs::default()),
        Err(Fault::OutOfBounds(0x4000_0000))
    );
}

#[test]
fn test_pause_resume_stop() {
    let elf = build_elf(ENTRY, &[addi(T0, T0, 1), jal(ZERO, -4)], &[0; 8]);
    let mut hart = hart_from_elf(&elf, Box::new(UnsupportedHost));
    hart.init(&ProcessArgs::default()).unwrap();
    assert!(hart.init(&ProcessArgs::default()).is_err());

    thread::sleep(Duration::from_millis(20));
    hart.pause().unwrap();
    assert_eq!(hart.execution_state(), ExecutionState::Paused);

    // let an in-flight step land
    thread::sleep(Duration::from_millis(20));
    let counted = hart.with_state(|hs| hs.rf().raw(T0));
    thread::sleep(Duration::from_millis(20));
    assert_eq!(hart.with_state(|hs| hs.rf().raw(T0)), counted);
    assert!(counted > 0);

    hart.resume().unwrap();
    thread::sleep(Duration::from_millis(20));
    hart.stop().unwrap();
    assert_eq!(hart.wait_till_done(), Ok(()));
    assert_eq!(hart.execution_state(), ExecutionState::Stopped);
    assert!(hart.with_state(|hs| hs.rf().raw(T0)) > counted);

    // a stopped hart cannot be resumed
    assert_eq!(hart.resume(), Err(Fault::InvalidState));
}

#[test]
fn test_debugger_breakpoint_and_step() {
    let elf = build_elf(ENTRY, &sum_program(), &[0; 8]);
    let mut hart = hart_from_elf(&elf, Box::new(UnsupportedHost));
    let mut debugger = Debugger::attach(&mut hart).unwrap();
    hart.init_paused(&ProcessArgs::default()).unwrap();

    assert_eq!(debugger.read_pc(), ENTRY);
    assert!(debugger.set_breakpoint(ENTRY + 0x1c));
    assert_eq!(
        debugger.continue_run(),
        Ok(DebugEvent::BreakpointHit { pc: ENTRY + 0x1c })
    );
    assert_eq!(debugger.read_reg(T1), 55);
    assert_eq!(debugger.read_mem::<u64>(DATA_VADDR), Ok(0));

    assert_eq!(
        debugger.step(),
        Ok(DebugEvent::StepCompleted { pc: ENTRY + 0x20 })
    );
    assert_eq!(debugger.read_mem::<u64>(DATA_VADDR), Ok(55));
    assert_eq!(debugger.pc_history().last(), Some(&(ENTRY + 0x1c)));

    assert_eq!(debugger.continue_run(), Err(DebugError::Finished));
    assert_eq!(hart.wait_till_done(), Ok(()));
}

#[test]
fn test_ebreak_pauses_under_debugger() {
    let mut text = vec![li(T0, 7), ebreak()];
    text.extend(exit(0));
    let elf = build_elf(ENTRY, &text, &[0; 8]);
    let mut hart = hart_from_elf(&elf, Box::new(UnsupportedHost));
    let mut debugger = Debugger::attach(&mut hart).unwrap();
    hart.init_paused(&ProcessArgs::default()).unwrap();

    assert_eq!(
        debugger.continue_run(),
        Ok(DebugEvent::BreakpointHit { pc: ENTRY + 8 })
    );
    assert_eq!(debugger.read_reg(T0), 7);
    assert_eq!(debugger.continue_run(), Err(DebugError::Finished));
    assert_eq!(hart.wait_till_done(), Ok(()));
    assert_eq!(
        hart.with_state(|hs| hs.halt_reason()),
        Some(HaltReason::Exited(0))
    );
}

#[test]
fn test_ebreak_ends_plain_run() {
    let mut text = vec![li(T0, 7), ebreak()];
    text.extend(exit(0));
    let elf = build_elf(ENTRY, &text, &[0; 8]);
    let mut emu = Emulator::from_hart(hart_from_elf(&elf, Box::new(UnsupportedHost)));

    let (done, finished) = std::sync::mpsc::channel();
    let runner = thread::spawn(move || {
        let summary = emu.run(&ProcessArgs::new(vec!["prog".into()]));
        let _ = done.send(());
        summary
    });
    finished
        .recv_timeout(Duration::from_secs(5))
        .expect("run returns after a guest ebreak");

    let summary = runner.join().unwrap().unwrap();
    assert_eq!(summary.halt_reason, Some(HaltReason::Breakpoint(ENTRY + 4)));
    assert_eq!(summary.exit_code, None);
}

#[test]
fn test_hooks_and_stats() {
    let elf = build_elf(ENTRY, &sum_program(), &[0; 8]);
    let mut hart = hart_from_elf(&elf, Box::new(UnsupportedHost));

    let stores = Arc::new(Mutex::new(Vec::new()));
    {
        let stores = stores.clone();
        hart.on_memory_write(move |w| stores.lock().unwrap().push((w.addr, w.new, w.width)))
            .unwrap();
    }
    let stats = Stats::install(&mut hart).unwrap();

    let mut emu = Emulator::from_hart(hart);
    emu.run(&ProcessArgs::default()).unwrap();

    assert_eq!(*stores.lock().unwrap(), vec![(DATA_VADDR, 55, 8)]);
    assert_eq!(stats.count_of(RiscvInstr::ADD), 10);
    assert_eq!(stats.count_of(RiscvInstr::BEQ), 11);
    assert_eq!(stats.count_of(RiscvInstr::SD), 1);
    assert!(stats.dump().contains("Instruction Mix"));

    // hooks cannot be added once running
    assert!(emu.hart_mut().on_memory_read(|_| {}).is_err());
}

#[test]
fn test_instruction_trace() {
    let elf = build_elf(ENTRY, &[li(T0, 5), jal(ZERO, 0)], &[0; 8]);
    let mut hart = hart_from_elf(&elf, Box::new(UnsupportedHost));

    let buf = Arc::new(Mutex::new(Vec::<u8>::new()));
    let sink: TraceSink = buf.clone();
    Tracer::install(&mut hart, TraceMode::INSTRUCTION, sink).unwrap();
    Emulator::from_hart(hart).run(&ProcessArgs::default()).unwrap();

    let trace = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
    let lines: Vec<&str> = trace.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("0x00010000: 00500293"));
    assert!(lines[1].starts_with("0x00010004: 0000006f"));
}
