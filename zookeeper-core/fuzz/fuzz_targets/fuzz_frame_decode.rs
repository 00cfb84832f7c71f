#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

use zookeeper_core::protocol::{JuteCodec, Request};

fuzz_target!(|data: &[u8]| {
    let mut codec = JuteCodec::new().with_max_frame_length(64 * 1024);
    let mut buf = BytesMut::from(data);

    while let Ok(Some(frame)) = codec.decode(&mut buf) {
        if let Ok(request) = Request::decode(&frame) {
            let _ = request.op_code();
            let _ = request.path();
            let _ = request.to_bytes();
        }
    }
});
