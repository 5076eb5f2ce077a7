use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use emu_core::chip::{pins, Chip};
use emu_core::via_6522::Via6522;

fn bench_via_idle_ticks(c: &mut Criterion) {
    let mut group = c.benchmark_group("via_6522_ticks");

    for tick_count in [100, 1_000, 10_000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(tick_count),
            tick_count,
            |b, &count| {
                b.iter(|| {
                    let mut via = Via6522::new();
                    let mut p = pins::set_port_a(0, 0xFF);
                    for _ in 0..count {
                        p = via.tick(p);
                    }
                    black_box(p);
                });
            },
        );
    }

    group.finish();
}

fn bench_via_free_running_timer(c: &mut Criterion) {
    c.bench_function("via_6522_timer1_continuous", |b| {
        let mut via = Via6522::new();
        // ACR: T1 continuous, IER: T1, latch $0040
        via.tick(pins::set_data(pins::VIA_CS1 | 0x0B, 0x40));
        via.tick(pins::set_data(pins::VIA_CS1 | 0x0E, 0xC0));
        via.tick(pins::set_data(pins::VIA_CS1 | 0x04, 0x40));
        via.tick(pins::set_data(pins::VIA_CS1 | 0x05, 0x00));
        b.iter(|| {
            let mut irqs = 0u32;
            for _ in 0..1_000 {
                if via.tick(0) & pins::IRQ != 0 {
                    irqs += 1;
                    via.tick(pins::VIA_CS1 | pins::RW | 0x04);
                }
            }
            black_box(irqs);
        });
    });
}

criterion_group!(benches, bench_via_idle_ticks, bench_via_free_running_timer);
criterion_main!(benches);
