#![no_main]

use ftp_conn::protocol::listing::{parse_list, parse_mlsd};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);

    let _ = parse_list(&text);
    let _ = parse_mlsd(&text);
});
