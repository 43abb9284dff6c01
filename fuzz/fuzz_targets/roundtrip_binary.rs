#![no_main]

use libfuzzer_sys::fuzz_target;
use marc_engine::Record;

fuzz_target!(|data: &[u8]| {
    let Ok(mut record) = Record::from_bytes(data) else {
        return;
    };
    let Ok(first) = record.get_record().map(<[u8]>::to_vec) else {
        return;
    };
    let mut reparsed = Record::from_bytes(&first).expect("assembled record must parse");
    let second = reparsed.get_record().expect("reparsed record must assemble");
    assert_eq!(first, second);
});
