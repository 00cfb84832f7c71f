#![no_main]

use libfuzzer_sys::fuzz_target;

use zookeeper_core::protocol::TransactionResponse;

fuzz_target!(|data: &[u8]| {
    if let Ok((response, read)) = TransactionResponse::deserialize(data, 0, Some("/fuzz")) {
        assert!(read <= data.len());
        let _ = response.first_failure();
        let _ = response.results().len();
    }
});
