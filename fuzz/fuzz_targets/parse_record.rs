#![no_main]

use libfuzzer_sys::fuzz_target;
use marc_engine::Record;

fuzz_target!(|data: &[u8]| {
    let mut record = Record::new();
    if record.load_record(data).is_err() {
        return;
    }
    // Anything that loads must walk and reassemble without panicking.
    while record.next_item().is_ok() {}
    let _ = record.get_record();
});
