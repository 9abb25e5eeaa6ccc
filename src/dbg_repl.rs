use clap::{Parser, Subcommand};
use crossterm::style::Stylize;
use hartsim::{
    config::arch_config::{REG_NAME, REGFILE_CNT, WordType, parse_reg_name},
    debugger::{DebugEvent, Debugger},
    isa::disasm::disassemble,
    trace::Stats,
};
use lazy_static::lazy_static;
use rustyline::error::ReadlineError;

#[derive(Debug, Parser)]
#[command(multicall = true)]
enum Cli {
    /// Print items such as registers, the PC, or memory.
    #[command(alias = "p", subcommand)]
    Print(PrintCmd),

    /// Display a given item each time the program stops.
    #[command(alias = "d", subcommand)]
    Display(PrintCmd),

    /// Cancel a display request.
    #[command(subcommand)]
    Undisplay(PrintCmd),

    /// List assembly around the current position.
    #[command(aliases = ["l", "ls"])]
    List,

    /// Show historical PC values.
    #[command(alias = "his")]
    History {
        #[arg(default_value_t = 20)]
        count: usize,
    },

    /// Step a single instruction.
    #[command(aliases = ["s", "step"])]
    Si,

    /// Continue running, at most `steps` instructions.
    #[command(name = "continue", aliases = ["c"])]
    Continue { steps: Option<u64> },

    /// Set or delete a breakpoint.
    #[command(name = "break", alias = "b")]
    Breakpoint {
        #[arg(short = 'd', long = "delete")]
        delete: bool,
        /// Address to set/delete the breakpoint; decimal by default, or hex if prefixed with `0x`.
        addr: String,
    },

    /// Show information such as breakpoints.
    #[command(subcommand)]
    Info(InfoCmd),

    /// Show execution statistics.
    Stats,

    /// Quit the debugger
    #[command(name = "quit", aliases = ["q", "exit"])]
    Quit,
}

#[derive(Debug, Subcommand)]
enum PrintCmd {
    /// Program counter
    Pc,
    /// General-purpose register
    Reg {
        /// Register name
        reg: String,
    },
    /// Some general-purpose registers
    Regs {
        /// Starting register index
        #[arg(long, default_value_t = 0)]
        start: u8,
        /// Number of registers
        #[arg(short, long, default_value_t = REGFILE_CNT as u8)]
        len: u8,
    },
    /// Memory
    Mem {
        addr: String,
        #[arg(short, long, default_value_t = 16)]
        len: u32,
    },
}

#[derive(Debug, Subcommand)]
enum InfoCmd {
    #[command(aliases = ["b", "bp", "break"])]
    Breakpoints,
}

const PROMPT: &str = "(hsdb) ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrintObject {
    Pc,
    Reg(u8),
    Regs(u8, u8),
    Mem(WordType, u32),
}

impl PrintObject {
    fn from_cmd(cmd: PrintCmd) -> Result<Self, String> {
        Ok(match cmd {
            PrintCmd::Pc => PrintObject::Pc,
            PrintCmd::Reg { reg } => PrintObject::Reg(parse_reg(&reg)?),
            PrintCmd::Regs { start, len } => PrintObject::Regs(start, len),
            PrintCmd::Mem { addr, len } => PrintObject::Mem(parse_word(&addr)?, len),
        })
    }
}

pub struct DebugREPL {
    dbg: Debugger,
    stats: Option<Stats>,
    watch_list: Vec<PrintObject>,
    editor: rustyline::DefaultEditor,
}

impl DebugREPL {
    pub fn new(dbg: Debugger, stats: Option<Stats>) -> Result<Self, ReadlineError> {
        Ok(DebugREPL {
            dbg,
            stats,
            watch_list: Vec::new(),
            editor: rustyline::DefaultEditor::new()?,
        })
    }

    pub fn run(&mut self) {
        println!(
            "{}: {}",
            format_addr(self.dbg.read_pc()),
            self.current_asm_formatted()
        );

        let mut last_line = String::new();
        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    let mut line = line.trim();

                    if line.is_empty() {
                        if last_line.is_empty() {
                            continue;
                        } else {
                            line = last_line.as_str();
                        }
                    } else {
                        last_line = line.to_string();
                        let _ = self.editor.add_history_entry(line);
                    }

                    match self.respond(line) {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(err) => eprintln!("{}", err),
                    }
                }

                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    break;
                }

                Err(ex) => {
                    eprintln!("Error occurred while reading line: {}", ex);
                }
            }
        }
    }

    fn handle_continue(&mut self, steps: Option<u64>) -> Result<(), String> {
        let rst = match steps {
            Some(steps) => self.dbg.continue_until(steps),
            None => self.dbg.continue_run(),
        };

        match rst {
            Ok(DebugEvent::StepCompleted { pc }) => {
                println!("{}: {}", format_addr(pc), self.current_asm_formatted());
            }
            Ok(DebugEvent::BreakpointHit { pc }) => {
                println!(
                    "breakpoint hit at pc = {}: {}",
                    format_addr(pc),
                    self.current_asm_formatted()
                );
            }
            Err(e) => return Err(format!("step failed: {}", e)),
        }

        for item in self.watch_list.clone() {
            self.print_object(item)?;
        }

        Ok(())
    }

    fn respond(&mut self, line: &str) -> Result<bool, String> {
        let argv = line.split_whitespace().map(|s| s.to_string());
        let cli = Cli::try_parse_from(argv).map_err(|e| e.to_string())?;

        match cli {
            Cli::Print(cmd) => self.print_object(PrintObject::from_cmd(cmd)?)?,
            Cli::Display(cmd) => {
                let item = PrintObject::from_cmd(cmd)?;
                if !self.watch_list.contains(&item) {
                    self.watch_list.push(item);
                }
            }
            Cli::Undisplay(cmd) => {
                let item = PrintObject::from_cmd(cmd)?;
                self.watch_list.retain(|&watched| watched != item);
            }

            Cli::History { count } => {
                let history = self.dbg.pc_history();
                let skip_len = history.len().saturating_sub(count);
                for (idx, addr) in history.into_iter().skip(skip_len).enumerate() {
                    println!(
                        "{}: pc = {}, {}",
                        format_idx(idx),
                        format_addr(addr),
                        self.asm_formatted_at(addr)
                    );
                }
            }

            Cli::List => {
                const LIST_INSTR: WordType = 10;

                let pc = self.dbg.read_pc();
                let mut curr_addr = pc.saturating_sub(LIST_INSTR / 2 * 4);
                for _ in 0..LIST_INSTR {
                    if curr_addr == pc {
                        print!("{} ", palette.arrow(">"));
                    } else {
                        print!("  ");
                    }

                    println!(
                        "{}: {} {}",
                        format_addr(curr_addr),
                        self.raw_formatted_at(curr_addr),
                        self.asm_formatted_at(curr_addr)
                    );
                    curr_addr += 4;
                }
            }

            Cli::Info(InfoCmd::Breakpoints) => {
                println!("Breakpoints:");
                for (idx, bp) in self.dbg.breakpoints().into_iter().enumerate() {
                    println!(
                        "{}: {}, {}",
                        format_idx(idx),
                        format_addr(bp),
                        self.asm_formatted_at(bp),
                    );
                }
            }

            Cli::Stats => match &self.stats {
                Some(stats) => print!("{}", stats.dump()),
                None => println!("statistics are not collected in this session."),
            },

            Cli::Si => {
                self.handle_continue(Some(1))?;
            }

            Cli::Continue { steps } => {
                self.handle_continue(steps)?;
            }

            Cli::Breakpoint { delete, addr } => {
                let addr = parse_word(&addr)?;
                if delete {
                    if !self.dbg.clear_breakpoint(addr) {
                        return Err(format!("no breakpoint at {}", format_addr(addr)));
                    }
                    println!(
                        "cleared breakpoint at {}: {}",
                        format_addr(addr),
                        self.asm_formatted_at(addr)
                    );
                } else {
                    self.dbg.set_breakpoint(addr);
                    println!(
                        "set breakpoint at {}: {}",
                        format_addr(addr),
                        self.asm_formatted_at(addr)
                    );
                }
            }
            Cli::Quit => return Ok(true),
        }

        Ok(false)
    }

    fn print_object(&self, item: PrintObject) -> Result<(), String> {
        match item {
            PrintObject::Pc => println!("pc = {}", format_addr(self.dbg.read_pc())),
            PrintObject::Reg(idx) => self.print_reg(idx),
            PrintObject::Regs(start, len) => self.print_regs(start, len)?,
            PrintObject::Mem(addr, len) => self.print_mem(addr, len),
        }
        Ok(())
    }

    fn print_reg(&self, idx: u8) {
        let val = self.dbg.read_reg(idx);
        println!(
            "{} = {}",
            palette.reg(REG_NAME[idx as usize], 5),
            format_data(val)
        );
    }

    fn print_regs(&self, start: u8, len: u8) -> Result<(), String> {
        for i in start..start.saturating_add(len) {
            if i as usize >= REGFILE_CNT {
                return Err(String::from("register index out of range."));
            }
            print!("{:<4} ", format!("x{}.", i));
            self.print_reg(i);
        }
        Ok(())
    }

    fn print_mem(&self, addr: WordType, len: u32) {
        const BYTE_PER_LINE: u32 = 16;

        for i in 0..len {
            let curr_addr = addr + i as WordType;
            if i % BYTE_PER_LINE == 0 {
                if i != 0 {
                    println!();
                }
                print!("{}: ", format_addr(curr_addr));
            }
            let byte = self
                .dbg
                .read_mem::<u8>(curr_addr)
                .map(|b| format!("{:02x}", b))
                .unwrap_or("**".into());
            print!("{} ", byte);
        }

        if len > 0 {
            println!();
        }
    }

    fn raw_formatted_at(&self, addr: WordType) -> impl std::fmt::Display {
        match self.dbg.read_mem::<u32>(addr) {
            Ok(raw) => palette.data(&format!("0x{:08x}", raw)).to_string(),
            Err(_) => palette.invalid("<invalid>").to_string(),
        }
    }

    fn asm_formatted_at(&self, addr: WordType) -> impl std::fmt::Display {
        match self.dbg.read_mem::<u32>(addr) {
            Ok(raw) => palette.instr(&disassemble(raw, addr)).to_string(),
            Err(_) => palette.invalid("<unmapped>").to_string(),
        }
    }

    fn current_asm_formatted(&self) -> impl std::fmt::Display {
        self.asm_formatted_at(self.dbg.read_pc())
    }
}

lazy_static! {
    static ref palette: OutputPalette = OutputPalette {};
}

struct OutputPalette;

impl OutputPalette {
    fn index(&self, index: &str) -> impl std::fmt::Display {
        index.yellow()
    }

    fn addr(&self, addr: &str) -> impl std::fmt::Display {
        addr.blue()
    }

    fn reg(&self, reg: &str, padding: usize) -> impl std::fmt::Display {
        format!("{:<width$}", reg, width = padding).magenta()
    }

    fn instr(&self, instr: &str) -> impl std::fmt::Display {
        instr.green()
    }

    fn arrow(&self, ch: &str) -> impl std::fmt::Display {
        ch.cyan()
    }

    fn data(&self, value: &str) -> impl std::fmt::Display {
        value.yellow()
    }

    fn invalid(&self, value: &str) -> impl std::fmt::Display {
        value.red()
    }
}

// helpers

pub fn parse_u64(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).map_err(|e| e.to_string())
    } else {
        s.parse::<u64>().map_err(|e| e.to_string())
    }
}

fn parse_word(s: &str) -> Result<WordType, String> {
    parse_u64(s).map(|v| v as WordType)
}

fn parse_reg(s: &str) -> Result<u8, String> {
    parse_reg_name(s).ok_or_else(|| format!("invalid register: {}", s))
}

fn format_idx(idx: usize) -> impl std::fmt::Display {
    palette.index(&idx.to_string()).to_string()
}

fn format_addr(word: WordType) -> impl std::fmt::Display {
    palette.addr(&format!("0x{:08x}", word)).to_string()
}

fn format_data(data: WordType) -> impl std::fmt::Display {
    palette.data(&format!("0x{:016x}", data)).to_string()
}
