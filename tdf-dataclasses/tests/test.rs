#[cfg(test)]
pub mod tests {

  extern crate rand;
  use rand::Rng;
  use std::path::Path;

  use tdf_dataclasses::binutils::{
    bitjoin,
    bitsplit,
    BitValue,
  };
  use tdf_dataclasses::fieldspec::ObjectFamily;
  use tdf_dataclasses::settings::Settings;
  use tdf_dataclasses::memory::ColumnMemoryImage;
  use tdf_dataclasses::images::{
    rotate,
    AlgorithmSnapshot,
    FinorSnapshot,
    FinorVetoMask,
    ObjectSnapshot,
    ObjectSource,
    PrescaleTable,
    RangeMaskImage,
  };
  use tdf_dataclasses::testvector::TestVector;
  use tdf_dataclasses::hardware::{
    read_image,
    write_verified,
    MemoryDevice,
    RegisterDevice,
  };
  use tdf_dataclasses::io::read_text;

  fn test_settings() -> Settings {
    Settings::from_toml(Path::new("test-data/settings.toml")).unwrap()
  }

  /// A vector with some muons, jets, an energy sum and decisions
  fn random_vector(settings : &Settings) -> TestVector {
    let mut rng    = rand::thread_rng();
    let mut vector = TestVector::new(settings);
    let bs = vector.blocksize();
    vector.menu_uuid = Some(String::from("0b9a1d4e-menu"));
    for k in 0..3 {
      let muons : Vec<BitValue> = (0..bs).map(|_| BitValue::from(rng.gen::<u64>())).collect();
      vector.set_sequence(ObjectFamily::Muon, k, &muons);
    }
    let jets : Vec<BitValue> = (0..bs).map(|bx| BitValue::from(if bx % 3 == 0 { 0 } else { rng.gen::<u32>() | 1 })).collect();
    vector.set_sequence(ObjectFamily::Jet, 0, &jets);
    let ett : Vec<BitValue> = (0..bs as u32).map(|bx| BitValue::from(bx + 1)).collect();
    vector.set_sequence(ObjectFamily::Ett, 0, &ett);
    let algos : Vec<BitValue> = (0..bs).map(|_| {
      let limbs : Vec<u32> = (0..16).map(|_| rng.gen::<u32>()).collect();
      BitValue::from_limbs(limbs)
    }).collect();
    vector.set_sequence(ObjectFamily::Algorithm, 0, &algos);
    let finor : Vec<BitValue> = (0..bs).map(|bx| BitValue::from((bx % 2) as u32)).collect();
    vector.set_sequence(ObjectFamily::Finor, 0, &finor);
    vector
  }

  /// Emulate the readout latency: what the reference has
  /// at BX i shows up in the measured memory at BX i + offset
  fn delayed(vector : &TestVector, settings : &Settings, offset : usize) -> ObjectSnapshot {
    let mut snapshot = ObjectSnapshot::new(settings).unwrap();
    let bs = snapshot.blocksize();
    for family in ObjectFamily::OBJECTS {
      let sequences = vector.occurrences(family, 0).unwrap();
      for (k, values) in sequences.iter().enumerate() {
        snapshot.set_occurrence(family, k, &rotate(values, bs - offset % bs));
      }
    }
    snapshot
  }

  #[test]
  fn settings_from_file() {
    let settings = test_settings();
    assert_eq!(settings.orbit_length(), 16);
    assert_eq!(settings.gap_marker(), "badc0de");
    assert_eq!(settings.spec(ObjectFamily::Eg).coding().len(), 4);
  }

  #[test]
  fn vector_to_snapshots_and_back() {
    let settings = test_settings();
    let vector   = random_vector(&settings);
    let text     = vector.render();
    let parsed   = TestVector::parse(&text, "rendered", &settings).unwrap();
    assert_eq!(parsed, vector);

    let mut objects = ObjectSnapshot::new(&settings).unwrap();
    let mut algos   = AlgorithmSnapshot::new(&settings).unwrap();
    let mut finor   = FinorSnapshot::new(&settings).unwrap();
    objects.read_from_vector(&parsed).unwrap();
    algos.read_from_vector(&parsed).unwrap();
    finor.read_from_vector(&parsed).unwrap();
    assert_eq!(finor.n_fired(), 8);
    assert_eq!(algos.decisions(), parsed.algorithms());

    let rebuilt = TestVector::from_images(&settings, &objects, &algos, &finor).unwrap();
    assert_eq!(rebuilt.sequence(ObjectFamily::Muon, 2), vector.sequence(ObjectFamily::Muon, 2));
    assert_eq!(rebuilt.finor(), vector.finor());

    assert!(objects.compare(&vector, 0, None).is_success());
    assert!(algos.compare(&vector, 0, None).is_success());
    assert!(finor.compare(&vector, 0, None).is_success());
  }

  #[test]
  fn latency_is_found_by_the_offset() {
    let settings = test_settings();
    let vector   = random_vector(&settings);
    let measured = delayed(&vector, &settings, 5);
    let report = measured.compare(&vector, 5, None);
    assert!(report.is_success(), "{}", report);
    // 16 BX of 3 muons, 2/3 of the jet BX, every ett BX
    assert!(report.n_ok() >= 3 * 16 + 16);
    let report = measured.compare(&vector, 0, None);
    assert!(!report.is_success());
    let ett = report.stats(ObjectFamily::Ett, 0).unwrap();
    assert_eq!(ett.errors, 16);
    // offsets wrap around the orbit
    assert!(measured.compare(&vector, 5 + 16 * 3, None).is_success());
  }

  #[test]
  fn empty_occurrences_are_flagged() {
    let settings = test_settings();
    let vector   = random_vector(&settings);
    let measured = delayed(&vector, &settings, 0);
    let report   = measured.compare(&vector, 0, None);
    let tau = report.family(ObjectFamily::Tau).unwrap();
    assert!(tau.occurrences.iter().all(|s| s.is_empty()));
    assert_eq!(tau.total().ignored, 12 * 16);
    assert!(report.to_string().contains("tau[11]: no objects in pattern"));
    assert!(report.to_string().contains("SUCCESS"));
  }

  #[test]
  fn resync_gaps_in_a_dump() {
    let settings = test_settings();
    let vector   = random_vector(&settings);
    let measured = delayed(&vector, &settings, 0);
    let dump     = measured.dump();
    let mut lines : Vec<String> = dump.lines().map(|l| l.to_string()).collect();
    // ett is the first column after muons, eg, tau and jets
    let mut fields : Vec<String> = lines[4].split(' ').map(|f| f.to_string()).collect();
    fields[8 + 36] = String::from("0badc0de");
    lines[4] = fields.join(" ");
    let text = format!("# spy memory\n{}\n", lines.join("\n"));
    let from_dump = ObjectSnapshot::from_dump(&settings, &text, "spy.dump").unwrap();
    let report = from_dump.compare(&vector, 0, None);
    assert!(report.is_success());
    assert_eq!(report.n_gaps(), 1);
    let strict = tdf_dataclasses::compare::Comparator::with_gap_marker("");
    assert_eq!(strict.compare(&from_dump, &vector, 0, None).n_errors(), 1);
  }

  #[test]
  fn words_through_a_device() {
    let settings = test_settings();
    let vector   = random_vector(&settings);
    let mut objects = ObjectSnapshot::new(&settings).unwrap();
    objects.read_from_vector(&vector).unwrap();
    let mut device = MemoryDevice::new().with_item("spy", objects.size());
    assert!(write_verified(&mut device, "spy", &objects.serialize()).unwrap().is_ok());
    let mut back = ObjectSnapshot::new(&settings).unwrap();
    read_image(&mut device, "spy", &mut back).unwrap();
    assert_eq!(back, objects);
    assert_eq!(device.read_block("spy", 16).unwrap(), objects.serialize()[..16].to_vec());
  }

  #[test]
  fn column_round_trip() {
    let mut memory = ColumnMemoryImage::new(5, 7).unwrap();
    memory.fill_random();
    let words = memory.serialize();
    let mut other = ColumnMemoryImage::new(5, 7).unwrap();
    other.deserialize(&words);
    assert_eq!(other, memory);
    let merged = memory.merged();
    other.clear(0);
    other.inject_merged(&merged);
    assert_eq!(other.serialize(), words);
  }

  #[test]
  fn split_and_join() {
    let value  = BitValue::from(0x1234_5678_9abc_def0u64);
    let chunks = bitsplit(&value, 2, 32);
    assert_eq!(chunks, vec![BitValue::from(0x9abc_def0u32), BitValue::from(0x1234_5678u32)]);
    assert_eq!(bitjoin(&chunks, 32), value);
    let nibbles = bitsplit(&value, 3, 4);
    assert_eq!(bitjoin(&nibbles, 4), BitValue::from(0xef0u32));
  }

  #[test]
  fn bx_mask_from_file() {
    let settings = test_settings();
    let text = read_text(Path::new("test-data/algo_bx_mask.txt")).unwrap();
    let mut mask = RangeMaskImage::algo_bx_mask(&settings).unwrap();
    mask.load_definition(&text, "algo_bx_mask.txt").unwrap();
    assert_eq!(mask.units(), 16);
    for bx in 0..16 {
      assert_eq!(mask.is_set(bx, 0), !(bx <= 3 || bx == 15));
      assert_eq!(mask.is_set(bx, 17), bx != 8);
      assert_eq!(mask.is_set(bx, 511), bx != 2);
      assert!(mask.is_set(bx, 100));
    }
    assert_eq!(mask.serialize().len(), 16 * 16);
  }

  #[test]
  fn finor_veto_from_file() {
    let settings = test_settings();
    let text = read_text(Path::new("test-data/finor_veto.txt")).unwrap();
    let mut mask = FinorVetoMask::for_algorithms(&settings).unwrap();
    mask.load_definition(&text, "finor_veto.txt").unwrap();
    assert_eq!(mask.units(), 512);
    let words = mask.serialize();
    assert_eq!(&words[..7], &[1, 0, 1, 1, 0, 2, 1]);
    assert_eq!(words[100], 3);
    assert_eq!(words.iter().filter(|w| **w == 1).count(), 512 - 4);
  }

  #[test]
  fn prescales_from_file() {
    let settings = test_settings();
    let text = read_text(Path::new("test-data/prescale.txt")).unwrap();
    let mut table = PrescaleTable::for_algorithms(&settings).unwrap();
    table.load_definition(&text, "prescale.txt").unwrap();
    assert_eq!(table.prescale(0), 10);
    assert_eq!(table.prescale(1), 1);
    assert_eq!(table.prescale(3), 0);
    assert_eq!(table.prescale(511), 1000);
  }
}
