#![no_main]

use boundview_core::handles::{bind_attribute, click_attribute, parse_index};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    if let Some(index) = parse_index(raw) {
        let digits: String = raw.trim_start().chars().take_while(char::is_ascii_digit).collect();
        assert_eq!(digits.parse::<usize>().ok(), Some(index));
        assert!(click_attribute(index).ends_with(&format!("'{index}'")));
        assert!(bind_attribute(index).ends_with(&format!("'{index}'")));
    }
});
