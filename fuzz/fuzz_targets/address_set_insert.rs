#![no_main]
use libfuzzer_sys::fuzz_target;
use xrefsel::{Address, AddressSet, AddressSpaces};

fuzz_target!(|data: &[u8]| {
    let Ok(spaces) = AddressSpaces::standard(16) else {
        return;
    };
    let Some(ram) = spaces.get("ram") else {
        return;
    };
    let mut set = AddressSet::new();
    for chunk in data.chunks_exact(3) {
        let start = u16::from_le_bytes([chunk[0], chunk[1]]) as u64;
        let end = start.saturating_add(chunk[2] as u64).min(0xffff);
        let (Ok(a), Ok(b)) = (Address::new(ram.clone(), start), Address::new(ram.clone(), end))
        else {
            continue;
        };
        if set.add_range(&a, &b).is_err() {
            continue;
        }
        assert!(set.contains(&a) && set.contains(&b));

        let ranges: Vec<_> = set.ranges().collect();
        for pair in ranges.windows(2) {
            assert!(pair[0].end.offset + 1 < pair[1].start.offset);
        }
    }
});
