#![no_main]

use libfuzzer_sys::fuzz_target;

mod utils;

fuzz_target!(|data: &[u8]| {
    let data = utils::capped(data);
    if let Ok(asset) = arbor_core::codec::decode_asset(data) {
        // Decoding never trusts the embedded checksum; verification must not panic.
        let _ = asset.is_consistent();
        let _ = asset.children();
        let reencoded = arbor_core::codec::encode_asset(&asset).expect("decoded asset re-encodes");
        let again = arbor_core::codec::decode_asset(&reencoded).expect("re-encoded asset decodes");
        assert_eq!(asset, again);
    }
});
