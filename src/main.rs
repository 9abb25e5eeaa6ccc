mod dbg_repl;
mod logging;

use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
    process::ExitCode,
    sync::{Arc, Mutex},
    time::Instant,
};

use clap::Parser;
use hartsim::{
    Emulator, RunSummary,
    config::HartConfig,
    debugger::Debugger,
    hart::{bootstrap::ProcessArgs, executor::HaltReason},
    trace::{Stats, TraceMode, TraceSink, Tracer},
};

use crate::{dbg_repl::DebugREPL, logging::LogLevel};

#[derive(Debug, Copy, Clone, PartialEq, Eq, clap::ValueEnum)]
enum TargetFormat {
    Auto,
    Elf,
    Bin,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path of the target executable file (elf/bin).
    path: PathBuf,

    /// Arguments passed to the guest program.
    #[arg(last = true)]
    guest_args: Vec<String>,

    /// Specify target executable file format.
    #[arg(value_enum, short, long, default_value_t = TargetFormat::Auto)]
    format: TargetFormat,

    /// Load address of a raw binary.
    #[arg(long, default_value = "0x10000", value_parser = dbg_repl::parse_u64)]
    base: u64,

    /// Enable debugger REPL.
    #[arg(short = 'g', long = "debug", default_value_t = false)]
    debug: bool,

    /// Trace events, comma separated: instruction, memory, register.
    #[arg(long, value_parser = TraceMode::parse_list)]
    trace: Option<TraceMode>,

    /// Write the trace here instead of stderr.
    #[arg(long)]
    trace_file: Option<PathBuf>,

    /// Print execution statistics at exit.
    #[arg(long, default_value_t = false)]
    stats: bool,

    /// Guest environment variable, KEY=VALUE. Repeatable.
    #[arg(long = "env", value_parser = parse_env)]
    env: Vec<(String, String)>,

    /// Byte budget of guest memory.
    #[arg(long, value_parser = dbg_repl::parse_u64)]
    arena_size: Option<u64>,

    /// Seed of the guest's randomness (AT_RANDOM, getrandom).
    #[arg(long)]
    seed: Option<u64>,

    /// Switch log level.
    #[arg(value_enum, long = "loglevel", default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

fn parse_env(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got `{}`", s))
}

fn is_elf(path: &Path) -> bool {
    let mut magic = [0u8; 4];
    File::open(path)
        .and_then(|mut f| std::io::Read::read_exact(&mut f, &mut magic))
        .is_ok()
        && magic == [0x7f, b'E', b'L', b'F']
}

fn hart_config(args: &Args) -> HartConfig {
    let mut config = HartConfig::default();
    if let Some(arena_size) = args.arena_size {
        config.arena_size = arena_size;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    config
}

fn trace_sink(args: &Args) -> std::io::Result<TraceSink> {
    let sink: TraceSink = match &args.trace_file {
        Some(path) => Arc::new(Mutex::new(BufWriter::new(File::create(path)?))),
        None => Arc::new(Mutex::new(std::io::stderr())),
    };
    Ok(sink)
}

fn report(summary: &RunSummary) -> ExitCode {
    match summary.halt_reason {
        Some(HaltReason::Exited(code)) => {
            log::info!("guest exited with code {}", code);
            ExitCode::from(code as u8)
        }
        Some(HaltReason::Breakpoint(pc)) => {
            log::warn!("guest hit ebreak at {:#x}", pc);
            ExitCode::FAILURE
        }
        Some(reason) => {
            log::info!("guest halted: {:?}", reason);
            ExitCode::SUCCESS
        }
        None => ExitCode::SUCCESS,
    }
}

fn run(args: &Args) -> Result<ExitCode, String> {
    let config = hart_config(args);

    let elf = match args.format {
        TargetFormat::Elf => true,
        TargetFormat::Bin => false,
        TargetFormat::Auto => is_elf(&args.path),
    };
    let mut emulator = if elf {
        Emulator::from_elf(&args.path, config)
    } else {
        Emulator::from_binary(&args.path, args.base, config)
    }
    .map_err(|e| format!("failed to load {}: {}", args.path.display(), e))?;

    let mut argv = vec![args.path.display().to_string()];
    argv.extend(args.guest_args.iter().cloned());
    let process = ProcessArgs {
        argv,
        envp: args.env.clone(),
    };

    let sink = match args.trace {
        Some(mode) => {
            let sink = trace_sink(args).map_err(|e| format!("cannot open trace file: {}", e))?;
            Tracer::install(emulator.hart_mut(), mode, sink.clone()).map_err(|e| e.to_string())?;
            Some(sink)
        }
        None => None,
    };

    let stats = if args.stats || args.debug {
        Some(Stats::install(emulator.hart_mut()).map_err(|e| e.to_string())?)
    } else {
        None
    };

    let now = Instant::now();
    let result = if args.debug {
        let dbg = Debugger::attach(emulator.hart_mut()).map_err(|e| e.to_string())?;
        let hart = emulator.hart_mut();
        hart.init_paused(&process).map_err(|e| e.to_string())?;

        DebugREPL::new(dbg, stats.clone())
            .map_err(|e| format!("failed to create line editor: {}", e))?
            .run();

        // quitting the debugger ends the program
        let _ = hart.stop();
        emulator.wait()
    } else {
        emulator.run(&process)
    };
    log::info!("used time: {}s", now.elapsed().as_secs_f32());

    if let Some(sink) = sink {
        let _ = sink.lock().map(|mut sink| sink.flush());
    }
    if args.stats {
        if let Some(stats) = &stats {
            eprint!("{}", stats.dump());
        }
    }

    result
        .map(|summary| report(&summary))
        .map_err(|fault| format!("hart fault: {}", fault))
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _logger_handle = match logging::init(args.log_level) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("logging disabled: {}", e);
            None
        }
    };

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
