//! Fuzz target: `FrameDecoder::feed`
//!
//! The first byte picks a split point; the rest is fed as two chunks and
//! then as one.  Both runs must agree, nothing may panic, and pending bytes
//! must never contain the delimiter.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use ubitlink::link::FrameDecoder;

fuzz_target!(|data: &[u8]| {
    let Some((&split, stream)) = data.split_first() else {
        return;
    };
    let split = (split as usize).min(stream.len());

    let mut chunked = FrameDecoder::new();
    let mut messages = chunked.feed(&stream[..split]);
    messages.extend(chunked.feed(&stream[split..]));
    assert!(!chunked.pending().contains(&b'\n'));

    let mut whole = FrameDecoder::new();
    assert_eq!(whole.feed(stream), messages);
    assert_eq!(whole.pending(), chunked.pending());
    assert_eq!(whole.malformed_count(), chunked.malformed_count());

    // After a reset the decoder must accept bytes cleanly again.
    whole.reset();
    assert!(whole.pending().is_empty());
    let _ = whole.feed(stream);
});
