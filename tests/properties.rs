use proptest::prelude::*;
use sealbox::{EntryDescriptor, Store, StoreOptions};
use std::collections::HashMap;
use tempfile::tempdir;

#[derive(Debug, Clone)]
enum Op {
    Write(usize, Vec<u8>),
    Delete(usize),
}

const NAMES: [&str; 4] = ["a", "bb", "ccc", "dddd"];

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..NAMES.len(), prop::collection::vec(any::<u8>(), 0..1800))
            .prop_map(|(i, data)| Op::Write(i, data)),
        1 => (0..NAMES.len()).prop_map(Op::Delete),
    ]
}

fn by_position(store: &Store) -> Vec<EntryDescriptor> {
    let mut entries = store.list();
    entries.sort_by_key(|e| e.position);
    entries
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn write_then_read_returns_same_bytes(data in prop::collection::vec(any::<u8>(), 0..5000)) {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("p.sbx"), StoreOptions::with_key_blocks(2)).unwrap();
        store.write("blob", &data).unwrap();
        prop_assert_eq!(store.read("blob").unwrap().unwrap(), data);
    }

    #[test]
    fn random_operations_keep_entries_packed(ops in prop::collection::vec(op(), 1..24)) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p.sbx");
        let store = Store::open(&path, StoreOptions::with_key_blocks(2)).unwrap();
        let mut model: HashMap<&str, Vec<u8>> = HashMap::new();

        for op in &ops {
            match op {
                Op::Write(i, data) => {
                    store.write(NAMES[*i], data).unwrap();
                    model.insert(NAMES[*i], data.clone());
                }
                Op::Delete(i) => {
                    let existed = store.delete(NAMES[*i]).unwrap();
                    prop_assert_eq!(existed, model.remove(NAMES[*i]).is_some());
                }
            }
        }

        // Regions tile the entry area exactly
        let mut expected = store.entry_region_start();
        for entry in by_position(&store) {
            prop_assert_eq!(entry.position, expected);
            expected = entry.end();
        }
        prop_assert_eq!(store.file_len().unwrap(), expected);

        for (name, data) in &model {
            prop_assert_eq!(&store.read(name).unwrap().unwrap(), data);
        }
        prop_assert_eq!(store.len(), model.len());

        let live = by_position(&store);
        drop(store);
        let reopened = Store::open(&path, StoreOptions::with_key_blocks(2)).unwrap();
        prop_assert_eq!(by_position(&reopened), live);
    }
}
