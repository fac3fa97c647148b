#![no_main]

use libfuzzer_sys::fuzz_target;
use snp_matcher::{InputFormat, chunk::ChunkedRows, extract::extract};
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // First byte picks the chunk size so boundaries land everywhere.
    let Some((&size, body)) = data.split_first() else {
        return;
    };
    let chunk_size = usize::from(size).max(1);

    for format in [InputFormat::TwentyThreeAndMe, InputFormat::Ancestry, InputFormat::Vcf] {
        let reader =
            ChunkedRows::with_chunk_size(Cursor::new(body), format.delimiter(), chunk_size);
        // Must never panic, and never yield an empty batch.
        for batch in reader.take(1000) {
            let Ok(batch) = batch else {
                break;
            };
            assert!(!batch.rows.is_empty());
            for row in &batch.rows {
                if let Some(variant) = extract(format, row) {
                    let _ = variant.to_string();
                }
            }
        }
    }
});
