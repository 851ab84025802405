#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Whatever parses must render back to the same 12 values.
    if let Ok(values) = sorter_config::parse_background(data) {
        let bytes = sorter_config::render_background(&values).expect("render");
        let text = String::from_utf8(bytes).expect("utf8");
        let again = sorter_config::parse_background(&text).expect("reparse");
        assert_eq!(values, again);
    }
});
