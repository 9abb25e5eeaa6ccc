use criterion::{Criterion, black_box, criterion_group, criterion_main};

use hartsim::{
    Emulator,
    config::HartConfig,
    hart::{Hart, bootstrap::ProcessArgs, syscall::UnsupportedHost},
    isa::{DECODER, bits::set_i_imm, disasm},
    mem::MemoryImage,
};

const BASE: u64 = 0x1_0000;

/// Counts t0 down from `n`, accumulating into t1, then exits.
fn countdown(n: u32) -> Vec<u32> {
    vec![
        set_i_imm(0x00000293, n), // addi t0, zero, n
        0x00000313,               // addi t1, zero, 0
        0x00028863,               // beq t0, zero, +16
        0x00530333,               // add t1, t1, t0
        0xfff28293,               // addi t0, t0, -1
        0xff5ff06f,               // jal zero, -12
        0x00000513,               // addi a0, zero, 0
        0x05d00893,               // addi a7, zero, 93
        0x00000073,               // ecall
    ]
}

fn image(program: &[u32]) -> MemoryImage {
    let mut mem = MemoryImage::default();
    mem.allocate(BASE, 0x1000).unwrap();
    for (i, word) in program.iter().enumerate() {
        mem.poke(BASE + 4 * i as u64, *word).unwrap();
    }
    mem
}

fn bench_emulator_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("emulator_run");
    group.sample_size(50);

    for n in [1_000u32, 2_000] {
        let program = countdown(n);
        group.bench_function(format!("countdown_{}", n), |b| {
            b.iter(|| {
                let hart = Hart::with_host(
                    image(&program),
                    BASE,
                    HartConfig::default(),
                    Box::new(UnsupportedHost),
                );
                let mut emu = Emulator::from_hart(hart);
                black_box(emu.run(&ProcessArgs::default()).unwrap());
            })
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let program = countdown(1);
    c.bench_function("decode_and_disassemble", |b| {
        b.iter(|| {
            for &word in &program {
                let decoded = DECODER.decode_instr(black_box(word)).unwrap();
                black_box(disasm::disassemble(word, BASE));
                black_box(decoded);
            }
        })
    });
}

criterion_group!(benches, bench_emulator_run, bench_decode);
criterion_main!(benches);
