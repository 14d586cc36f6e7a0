use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tdf_dataclasses::binutils::BitValue;
use tdf_dataclasses::fieldspec::ObjectFamily;
use tdf_dataclasses::settings::Settings;
use tdf_dataclasses::images::{
    AlgorithmSnapshot,
    ObjectSnapshot,
};
use tdf_dataclasses::testvector::TestVector;

fn filled_objects(settings : &Settings) -> ObjectSnapshot {
  let mut snapshot = ObjectSnapshot::new(settings).unwrap();
  snapshot.fill_random();
  snapshot
}

fn bench_extract_muons(c: &mut Criterion) {
  let settings = Settings::default();
  let snapshot = filled_objects(&settings);
  c.bench_function("extract 8 muons (full orbit)", |b| b.iter(|| {
    for k in 0..8 {
      black_box(snapshot.value(ObjectFamily::Muon, k, 100));
    }
    black_box(snapshot.memory().extract(0, 2));
  }));
}

fn bench_dump_read(c: &mut Criterion) {
  let settings = Settings::default();
  let snapshot = filled_objects(&settings);
  let text     = snapshot.dump();
  c.bench_function("object snapshot dump", |b| b.iter(|| {
    black_box(snapshot.dump());
  }));
  c.bench_function("object snapshot read", |b| b.iter(|| {
    let back = ObjectSnapshot::from_dump(&settings, black_box(&text), "bench").unwrap();
    black_box(back);
  }));
}

fn bench_compare(c: &mut Criterion) {
  let settings = Settings::default();
  let snapshot = filled_objects(&settings);
  let mut algos = AlgorithmSnapshot::new(&settings).unwrap();
  algos.set_decisions(&vec![BitValue::from(0xf0f0_f0f0_0000_0001u64); 3564]);
  let empty = ObjectSnapshot::new(&settings).unwrap();
  let finor = tdf_dataclasses::images::FinorSnapshot::new(&settings).unwrap();
  let vector = TestVector::from_images(&settings, &snapshot, &algos, &finor).unwrap();
  c.bench_function("compare objects against vector", |b| b.iter(|| {
    black_box(snapshot.compare(&vector, black_box(17), None));
  }));
  c.bench_function("compare empty objects against vector", |b| b.iter(|| {
    black_box(empty.compare(&vector, 0, None));
  }));
  c.bench_function("compare algorithms against vector", |b| b.iter(|| {
    black_box(algos.compare(&vector, 0, None));
  }));
}

criterion_group!(benches, bench_extract_muons, bench_dump_read, bench_compare);
criterion_main!(benches);
