//! Integration test: full-entity serialization across every value kind.
//!
//! Randomized (seeded) live values go through `serialize_all` on one
//! companion and `deserialize_init_all` on another.

use std::sync::Arc;

use fieldsync_networking::protocol::{DELTA_INTEGER, QUANTIZED_VECTOR, SMALLEST_THREE_QUATERNION};
use fieldsync_networking::{
    BitReader, BitWriter, CodecRegistry, CompanionRegistry, FieldSpec, FieldTable, SchemaBuilder, SchemaDescriptor,
    SkipRegistry, SyncCompanion, SyncConfig, SyncError, SyncValue, ValueKind,
};
use fieldsync_shared::{Quaternion, Vec2, Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const POSITION_STEP: f32 = 200.0 / 262_143.0;
const SPEED_STEP: f32 = 20.0 / 65_535.0;

fn full_schema() -> Arc<SchemaDescriptor> {
    let codecs = CodecRegistry::with_defaults().unwrap();
    Arc::new(
        SchemaBuilder::new("everything")
            .with_identity()
            .field(FieldSpec::new("alive", ValueKind::Bool))
            .field(FieldSpec::new("ammo", ValueKind::U8).packed(5))
            .field(FieldSpec::new("lean", ValueKind::I8))
            .field(FieldSpec::new("kills", ValueKind::U16))
            .field(FieldSpec::new("karma", ValueKind::I16))
            .field(FieldSpec::new("gold", ValueKind::U32))
            .field(
                FieldSpec::new("score", ValueKind::I32)
                    .codec(DELTA_INTEGER)
                    .baseline(SyncValue::I32(1_000)),
            )
            .field(FieldSpec::new("xp", ValueKind::U64))
            .field(FieldSpec::new("ledger", ValueKind::I64))
            .field(FieldSpec::new("speed", ValueKind::F32).quantize(-10.0, 10.0, 16))
            .field(FieldSpec::new("clock", ValueKind::F64))
            .field(FieldSpec::new("aim", ValueKind::Vec2))
            .field(
                FieldSpec::new("position", ValueKind::Vec3)
                    .codec(QUANTIZED_VECTOR)
                    .quantize(-100.0, 100.0, 18),
            )
            .field(FieldSpec::new("tint", ValueKind::Vec4))
            .field(FieldSpec::new("rotation", ValueKind::Quaternion).codec(SMALLEST_THREE_QUATERNION))
            .field(FieldSpec::new("height", ValueKind::F32).blend().unreliable())
            .build(&codecs, &SkipRegistry::new())
            .unwrap(),
    )
}

fn random_values(rng: &mut StdRng) -> Vec<SyncValue> {
    let rotation = Quaternion::new(
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-1.0..1.0),
        rng.gen_range(0.1..1.0),
    )
    .normalized();

    vec![
        SyncValue::Identity(rng.gen()),
        SyncValue::Bool(rng.gen()),
        SyncValue::U8(rng.gen_range(0..32)),
        SyncValue::I8(rng.gen()),
        SyncValue::U16(rng.gen()),
        SyncValue::I16(rng.gen()),
        SyncValue::U32(rng.gen()),
        SyncValue::I32(rng.gen_range(-5_000..5_000)),
        SyncValue::U64(rng.gen()),
        SyncValue::I64(rng.gen()),
        SyncValue::F32(rng.gen_range(-10.0..10.0)),
        SyncValue::F64(rng.gen_range(-1e9..1e9)),
        SyncValue::Vec2(Vec2::new(rng.gen(), rng.gen())),
        SyncValue::Vec3(Vec3::new(
            rng.gen_range(-100.0..100.0),
            rng.gen_range(-100.0..100.0),
            rng.gen_range(-100.0..100.0),
        )),
        SyncValue::Vec4(Vec4::new(rng.gen(), rng.gen(), rng.gen(), rng.gen())),
        SyncValue::Quaternion(rotation),
        SyncValue::F32(rng.gen_range(0.0..50.0)),
    ]
}

fn blank_values(schema: &SchemaDescriptor) -> Vec<SyncValue> {
    schema.fields().iter().map(|f| SyncValue::zero(f.kind())).collect()
}

fn companion(schema: &Arc<SchemaDescriptor>, values: Vec<SyncValue>) -> (SyncCompanion, FieldTable) {
    let table = FieldTable::new(values);
    let companion = SyncCompanion::new(Arc::clone(schema), Box::new(table.clone()), 1, &SyncConfig::default());
    (companion, table)
}

fn assert_received(sent: &[SyncValue], received: &[SyncValue]) {
    for (index, (sent, received)) in sent.iter().zip(received).enumerate() {
        match index {
            // Identity is not part of the full payload; blended goes to history.
            0 | 16 => {}
            10 => {
                let (a, b) = (sent.as_f32().unwrap(), received.as_f32().unwrap());
                assert!((a - b).abs() <= SPEED_STEP, "speed {a} vs {b}");
            }
            13 => {
                let (SyncValue::Vec3(a), SyncValue::Vec3(b)) = (sent, received) else {
                    panic!("position kind");
                };
                assert!((a.x - b.x).abs() <= POSITION_STEP);
                assert!((a.y - b.y).abs() <= POSITION_STEP);
                assert!((a.z - b.z).abs() <= POSITION_STEP);
            }
            15 => {
                let (SyncValue::Quaternion(a), SyncValue::Quaternion(b)) = (sent, received) else {
                    panic!("rotation kind");
                };
                assert!(a.approx_same_rotation(*b, 1e-3), "{a:?} vs {b:?}");
            }
            _ => assert_eq!(sent, received, "field {index}"),
        }
    }
}

#[test]
fn test_randomized_full_roundtrip() {
    let schema = full_schema();
    let mut rng = StdRng::seed_from_u64(0x5EED);

    for round in 0..64 {
        let sent = random_values(&mut rng);
        let (sender, _) = companion(&schema, sent.clone());
        let (mut receiver, table) = companion(&schema, blank_values(&schema));

        let mut writer = BitWriter::new();
        let bits = sender.serialize_all(&mut writer).unwrap();
        assert_eq!(bits, writer.bit_len());

        let mut reader = BitReader::new(writer.as_bytes());
        receiver.deserialize_init_all(&mut reader, round).unwrap();

        let received = table.snapshot();
        assert_received(&sent, &received);

        let history = receiver.history(16).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.latest().unwrap().value, sent[16]);
        assert_eq!(received[16], SyncValue::F32(0.0));
    }
}

#[test]
fn test_quantized_encoding_is_idempotent() {
    let schema = full_schema();
    let mut rng = StdRng::seed_from_u64(42);
    let sent = random_values(&mut rng);

    let (sender, _) = companion(&schema, sent);
    let (mut middle, middle_table) = companion(&schema, blank_values(&schema));
    let mut first = BitWriter::new();
    sender.serialize_all(&mut first).unwrap();
    middle
        .deserialize_init_all(&mut BitReader::new(first.as_bytes()), 0)
        .unwrap();

    // Re-encoding decoded values must reproduce the decoded values.
    let (mut last, last_table) = companion(&schema, blank_values(&schema));
    let mut second = BitWriter::new();
    middle.serialize_all(&mut second).unwrap();
    last.deserialize_init_all(&mut BitReader::new(second.as_bytes()), 0)
        .unwrap();

    let once = middle_table.snapshot();
    let twice = last_table.snapshot();
    assert_eq!(once[10], twice[10]);
    assert_eq!(once[13], twice[13]);
}

#[test]
fn test_every_truncation_is_rejected_cleanly() {
    let schema = full_schema();
    let mut rng = StdRng::seed_from_u64(7);
    let (sender, _) = companion(&schema, random_values(&mut rng));

    let mut writer = BitWriter::new();
    sender.serialize_all(&mut writer).unwrap();
    let bytes = writer.as_bytes();

    for len in 0..bytes.len() - 1 {
        let blank = blank_values(&schema);
        let (mut receiver, table) = companion(&schema, blank.clone());
        let err = receiver
            .deserialize_init_all(&mut BitReader::new(&bytes[..len]), 0)
            .unwrap_err();
        assert!(matches!(err, SyncError::DecodeUnderrun { .. }), "len {len}: {err}");
        assert_eq!(table.snapshot(), blank);
        assert!(receiver.history(16).unwrap().is_empty());
    }
}

#[test]
fn test_single_field_updates_through_registry() {
    let schema = full_schema();
    let mut rng = StdRng::seed_from_u64(99);
    let sent = random_values(&mut rng);
    let (sender, _) = companion(&schema, sent.clone());

    let mut registry = CompanionRegistry::new(SyncConfig::default()).unwrap();
    let table = FieldTable::new(blank_values(&schema));
    registry
        .spawn(500, Arc::clone(&schema), Box::new(table.clone()), 2)
        .unwrap();

    for index in [0u8, 1, 7, 9, 15] {
        let mut writer = BitWriter::new();
        sender.serialize_single(&mut writer, index).unwrap();
        registry
            .get_mut(500)
            .unwrap()
            .deserialize_init_single_from(&mut BitReader::new(writer.as_bytes()), index, 10, 2)
            .unwrap();
    }

    assert_eq!(table.get(0), Some(sent[0]));
    assert_eq!(table.get(1), Some(sent[1]));
    assert_eq!(table.get(7), Some(sent[7]));
    assert_eq!(table.get(9), Some(sent[9]));
    assert_eq!(registry.get(500).unwrap().tracker(9).unwrap().last_set_by(), 2);

    let mut writer = BitWriter::new();
    assert_eq!(
        sender.serialize_single(&mut writer, 17).unwrap_err(),
        SyncError::UnknownFieldIndex { index: 17, field_count: 17 }
    );
}
