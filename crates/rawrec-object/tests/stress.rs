//! Randomized mutation stress: a seeded walk over every operation the
//! model synthesizes, with the guarded allocator proving that no
//! sequence of mutations leaks or double-frees.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rawrec_alloc::DebugAllocator;
use rawrec_core::{FieldId, RawType, RecordId, SchemaBuilder};
use rawrec_object::{ObjectModel, Value};

const WORDS: &[&str] = &[
    "",
    "a",
    "ledger",
    "crate of parts",
    "a considerably longer label that spans a few words",
];

fn stress_model() -> ObjectModel {
    let mut builder = SchemaBuilder::new();
    let entry = builder.declare("Entry");
    let bundle = builder.declare("Bundle");

    builder.field(entry, &["label"], RawType::named("string"));
    builder.field(entry, &["count"], RawType::named("uint32"));

    builder.field(bundle, &["title"], RawType::named("string"));
    builder.field(
        bundle,
        &["serial"],
        RawType::pointer(RawType::named("uint64")),
    );
    builder.field(bundle, &["note"], RawType::pointer(RawType::named("string")));
    builder.field(bundle, &["primary"], RawType::named("Entry"));
    builder.field(bundle, &["backup"], RawType::pointer(RawType::named("Entry")));
    builder.field(bundle, &["entries"], RawType::slice(RawType::named("Entry")));
    builder.field(
        bundle,
        &["links"],
        RawType::slice(RawType::pointer(RawType::named("Entry"))),
    );
    builder.field(
        bundle,
        &["names"],
        RawType::array(3, RawType::named("string")),
    );
    builder.field(
        bundle,
        &["slots"],
        RawType::pointer(RawType::array(2, RawType::named("Entry"))),
    );
    builder.field(
        bundle,
        &["stream"],
        RawType::pointer(RawType::slice(RawType::named("uint8"))),
    );

    let (schema, errors) = builder.build();
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    ObjectModel::emit(schema)
}

fn f(model: &ObjectModel, record: RecordId, name: &str) -> FieldId {
    model.schema().record(record).field_named(name).unwrap()
}

fn word(rng: &mut ChaCha8Rng) -> &'static str {
    WORDS[rng.random_range(0..WORDS.len())]
}

#[test]
fn random_mutation_walks_never_leak() {
    let model = stress_model();
    let entry = model.schema().id_of("Entry").unwrap();
    let bundle = model.schema().id_of("Bundle").unwrap();

    let title = f(&model, bundle, "title");
    let serial = f(&model, bundle, "serial");
    let note = f(&model, bundle, "note");
    let primary = f(&model, bundle, "primary");
    let backup = f(&model, bundle, "backup");
    let entries = f(&model, bundle, "entries");
    let links = f(&model, bundle, "links");
    let names = f(&model, bundle, "names");
    let slots = f(&model, bundle, "slots");
    let stream = f(&model, bundle, "stream");
    let label = f(&model, entry, "label");
    let count = f(&model, entry, "count");

    for seed in 0..8u64 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let alloc = DebugAllocator::new();
        let mut rec = model.construct(bundle, &alloc);

        for _ in 0..400 {
            assert!(alloc.usage() > 0, "live record accounts for its block");
            match rng.random_range(0..13u8) {
                0 => model.set(&mut rec, title, word(&mut rng)),
                1 => model.set(&mut rec, serial, rng.random::<u64>()),
                2 => {
                    if rng.random_bool(0.25) {
                        model.set(&mut rec, note, Value::Null);
                    } else {
                        model.set(&mut rec, note, word(&mut rng));
                    }
                }
                3 => {
                    let mut donor = model.construct(entry, &alloc);
                    model.set(&mut donor, label, word(&mut rng));
                    model.set(&mut donor, count, rng.random::<u32>());
                    model.set(&mut rec, primary, donor);
                }
                4 => {
                    if rng.random_bool(0.25) {
                        model.set(&mut rec, backup, Value::Null);
                    } else {
                        let mut donor = model.construct(entry, &alloc);
                        model.set(&mut donor, label, word(&mut rng));
                        model.set(&mut rec, backup, donor);
                    }
                }
                5 => {
                    let len = rng.random_range(0..6);
                    model.set_capacity(&mut rec, entries, len, rng.random_bool(0.5));
                }
                6 => {
                    let len = model.len_of(&rec, entries);
                    if len > 0 {
                        let idx = rng.random_range(0..len);
                        let mut view = model.record_at(&rec, entries, idx);
                        model.set(&mut view, label, word(&mut rng));
                    }
                }
                7 => {
                    let len = rng.random_range(0..5);
                    model.set_capacity(&mut rec, links, len, rng.random_bool(0.5));
                }
                8 => {
                    let len = model.len_of(&rec, links);
                    if len > 0 {
                        let idx = rng.random_range(0..len);
                        if rng.random_bool(0.3) {
                            model.set_at(&mut rec, links, idx, Value::Null);
                        } else {
                            let mut donor = model.construct(entry, &alloc);
                            model.set(&mut donor, label, word(&mut rng));
                            model.set_at(&mut rec, links, idx, donor);
                        }
                    }
                }
                9 => model.set_at(&mut rec, names, rng.random_range(0..3), word(&mut rng)),
                10 => {
                    if rng.random_bool(0.4) {
                        model.destroy_array(&mut rec, slots);
                    } else {
                        model.create_array(&mut rec, slots);
                        let mut view = model.record_at(&rec, slots, rng.random_range(0..2));
                        model.set(&mut view, label, word(&mut rng));
                    }
                }
                11 => {
                    let len = rng.random_range(0..32);
                    model.set_capacity(&mut rec, stream, len, rng.random_bool(0.5));
                }
                _ => {
                    // Full teardown mid-walk: every byte must come back
                    // before the next generation starts.
                    model.free(&mut rec);
                    assert!(rec.is_freed());
                    assert_eq!(alloc.usage(), 0);
                    rec = model.construct(bundle, &alloc);
                }
            }
        }

        model.free(&mut rec);
        assert_eq!(alloc.usage(), 0, "seed {seed} leaked");
    }
}
