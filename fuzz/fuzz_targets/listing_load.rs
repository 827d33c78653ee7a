#![no_main]
use libfuzzer_sys::fuzz_target;
use xrefsel::{collect_forward_targets, AddressSet, AddressSpaces, ListingSnapshot};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(spaces) = AddressSpaces::standard(32) else {
        return;
    };
    let Ok(listing) = ListingSnapshot::from_json(&spaces, text) else {
        return;
    };
    let Some(ram) = spaces.get("ram") else {
        return;
    };
    let Ok(start) = xrefsel::Address::new(ram.clone(), 0) else {
        return;
    };
    let Ok(end) = xrefsel::Address::new(ram, 0xffff_ffff) else {
        return;
    };
    let mut input = AddressSet::new();
    if input.add_range(&start, &end).is_ok() {
        for range in collect_forward_targets(&listing, &input).ranges() {
            assert!(range.start.is_memory());
        }
    }
});
