use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use multiboot_protocol::core::checksum::update_checksum;
use multiboot_protocol::core::image::Image;
use multiboot_protocol::protocol::encoder::encode_word;
use multiboot_protocol::protocol::session::{KeyMaterial, SessionState};
use multiboot_protocol::transport::emulated::{DeviceSettings, EmulatedDevice};
use multiboot_protocol::Multiboot;

fn keyed_session() -> SessionState {
    let mut session = SessionState::new();
    for _ in 0..0x5F {
        session.advance_header();
    }
    session.key(&KeyMaterial::from_response(0x73A5_63D1));
    session
}

fn bench_checksum(c: &mut Criterion) {
    c.bench_function("checksum_update", |b| {
        let mut acc = 0xC387;
        let mut word = 0u32;
        b.iter(|| {
            word = word.wrapping_add(0x9E37_79B9);
            acc = update_checksum(black_box(acc), black_box(word));
        })
    });
}

#[allow(clippy::unwrap_used)]
fn bench_payload_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("payload_encode");
    let sizes = [1024usize, 16 * 1024, 256 * 1024];

    for &size in &sizes {
        let words: Vec<u32> = (0..size / 4).map(|i| i as u32).collect();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("encode_{size}b"), |b| {
            b.iter_batched(
                keyed_session,
                |mut session| {
                    for &w in &words {
                        black_box(encode_word(&mut session, w));
                    }
                    session
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_emulated_session(c: &mut Criterion) {
    let mut group = c.benchmark_group("emulated_session");
    let image = Image::from_bytes(vec![0x5Au8; 64 * 1024]).unwrap();
    let settings = DeviceSettings {
        discovery_delay: 0,
        crc_delay: 0,
        ..DeviceSettings::default()
    };

    group.throughput(Throughput::Bytes(image.transfer_size() as u64));
    group.bench_function("full_session_64k", |b| {
        b.iter(|| {
            let mut session = Multiboot::new(EmulatedDevice::new(settings));
            session.run(&image).unwrap()
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_checksum,
    bench_payload_encode,
    bench_emulated_session
);
criterion_main!(benches);
