#![no_main]

use libfuzzer_sys::fuzz_target;

use zookeeper_core::protocol::{Catalog, Record};

const CLASSES: [(&str, &str); 8] = [
    ("data", "Stat"),
    ("data", "ACL"),
    ("protocol", "ReplyHeader"),
    ("protocol", "GetDataResponse"),
    ("protocol", "GetChildren2Response"),
    ("protocol", "GetACLResponse"),
    ("protocol", "SetWatches"),
    ("protocol", "WatcherEvent"),
];

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let catalog = Catalog::standard();
    let (module, class) = CLASSES[data[0] as usize % CLASSES.len()];
    let mut record: Record = match catalog.record(module, class) {
        Ok(record) => record,
        Err(_) => return,
    };
    record.set_chroot_path(Some("/fuzz".to_string()));

    if let Ok(read) = record.deserialize(data, 1) {
        assert!(read <= data.len() - 1);
        if let Ok(len) = record.byte_length() {
            let mut out = vec![0u8; len.max(1)];
            let _ = record.serialize(&mut out, 0);
        }
    }
});
