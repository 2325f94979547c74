#![no_main]

use bytes::BytesMut;
use ftp_conn::protocol::decode_reply;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut buf = BytesMut::from(data);

    // Several replies may arrive in one read
    while !buf.is_empty() {
        match decode_reply(&buf) {
            Ok((_, consumed)) => {
                assert!(consumed <= buf.len());
                if consumed == 0 {
                    break;
                }
                let _ = buf.split_to(consumed);
            }
            Err(_) => break,
        }
    }
});
