// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Fuzz target for indexed fact maps.
// Run with: cargo +nightly fuzz run fuzz_factmap_ops
//
// Each input byte pair is an insert or a removal of `p(a, b)`. After every
// operation the indexes must hold exactly the facts of the map, and a keyed
// lookup must agree with a scan.

#![no_main]

use factql_store::{CompareOp, Fact, FactMap, FieldKind, RecordType, Root, Value};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(ty) = RecordType::builder("p")
        .field("a", FieldKind::Integer)
        .field("b", FieldKind::Integer)
        .build()
    else {
        return;
    };
    let root = Root::new(&ty);
    let (Ok(a), Ok(b)) = (root.field("a"), root.field("b")) else {
        return;
    };
    let Ok(mut map) = FactMap::new(&ty, [a.clone(), b]) else {
        return;
    };

    for pair in data.chunks_exact(2).take(512) {
        let (op, value) = (pair[0], pair[1]);
        let values = vec![Value::Int(i64::from(op & 0x0f)), Value::Int(i64::from(value % 8))];
        let Ok(fact) = Fact::new(&ty, values) else {
            return;
        };
        if op & 0x80 == 0 {
            if map.add(fact).is_err() {
                return;
            }
        } else {
            map.discard(&fact);
        }
        for index in map.indexes() {
            assert_eq!(index.len(), map.len());
        }
    }

    if let Some(index) = map.index(&a) {
        let probe = Value::Int(3);
        let found = index.find(CompareOp::Le, &probe, false).count();
        let scanned = map
            .facts()
            .iter()
            .filter(|f| f.value(0).is_some_and(|v| *v <= probe))
            .count();
        assert_eq!(found, scanned);
    }
});
