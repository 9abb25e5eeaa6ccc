use std::{
    collections::BTreeMap,
    fmt::Write,
    sync::{Arc, Mutex},
};

use crate::{
    hart::{Hart, fault::Fault, state::HartState},
    isa::RiscvInstr,
    utils::lock,
};

#[derive(Debug, Default, Clone)]
struct Counters {
    instructions: u64,
    loads: u64,
    stores: u64,
    reg_reads: u64,
    reg_writes: u64,
    /// Instructions after which the pc did not simply advance by 4.
    taken_transfers: u64,
    per_instr: BTreeMap<RiscvInstr, u64>,
}

/// Execution counters collected from the hart's listener channels.
#[derive(Clone, Default)]
pub struct Stats {
    counters: Arc<Mutex<Counters>>,
}

impl Stats {
    pub fn install(hart: &mut Hart) -> Result<Self, Fault> {
        let stats = Self::default();

        let counters = stats.counters.clone();
        hart.on_after_execute(move |hs: &HartState| {
            let Some(last) = hs.last_executed() else {
                return;
            };
            let mut c = lock(&counters);
            c.instructions += 1;
            *c.per_instr.entry(last.instr).or_default() += 1;
            if hs.pc.read() != last.pc.wrapping_add(4) {
                c.taken_transfers += 1;
            }
        })?;

        let counters = stats.counters.clone();
        hart.on_memory_read(move |_| lock(&counters).loads += 1)?;
        let counters = stats.counters.clone();
        hart.on_memory_write(move |_| lock(&counters).stores += 1)?;
        let counters = stats.counters.clone();
        hart.on_register_read(move |_| lock(&counters).reg_reads += 1)?;
        let counters = stats.counters.clone();
        hart.on_register_write(move |_| lock(&counters).reg_writes += 1)?;

        Ok(stats)
    }

    pub fn instructions(&self) -> u64 {
        lock(&self.counters).instructions
    }

    pub fn count_of(&self, instr: RiscvInstr) -> u64 {
        lock(&self.counters)
            .per_instr
            .get(&instr)
            .copied()
            .unwrap_or(0)
    }

    pub fn dump(&self) -> String {
        let c = lock(&self.counters).clone();
        let per_instr = |n: u64| n as f64 / c.instructions.max(1) as f64;

        let mut out = String::from("Statistics\n Raw Counts\n");
        row(&mut out, "instructions", c.instructions);
        row(&mut out, "loads", c.loads);
        row(&mut out, "stores", c.stores);
        row(&mut out, "register reads", c.reg_reads);
        row(&mut out, "register writes", c.reg_writes);
        row(&mut out, "taken control transfers", c.taken_transfers);

        out.push_str(" Computed\n");
        row(&mut out, "loads/instruction", format_args!("{:.4}", per_instr(c.loads)));
        row(&mut out, "stores/instruction", format_args!("{:.4}", per_instr(c.stores)));
        row(
            &mut out,
            "transfers/instruction",
            format_args!("{:.4}", per_instr(c.taken_transfers)),
        );

        out.push_str(" Instruction Mix\n");
        let mut mix: Vec<_> = c.per_instr.iter().collect();
        mix.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        for (instr, count) in mix {
            row(
                &mut out,
                &instr.mnemonic(),
                format_args!("{} ({:.1}%)", count, 100.0 * per_instr(*count)),
            );
        }

        out
    }
}

fn row(out: &mut String, label: &str, value: impl std::fmt::Display) {
    let _ = writeln!(out, "  {:.<32} {}", format!("{} ", label), value);
}
