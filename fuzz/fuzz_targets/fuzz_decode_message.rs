#![no_main]

use arbor_remote_proto::framing::decode_framed_message;
use arbor_remote_proto::{Request, Response};
use libfuzzer_sys::fuzz_target;

mod utils;

fuzz_target!(|data: &[u8]| {
    let data = utils::capped(data);
    if let Ok(request) = decode_framed_message::<Request>(data) {
        let _ = request.validate();
    }
    let _ = decode_framed_message::<Response>(data);
});
