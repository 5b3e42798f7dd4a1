// Copyright (c) 2026 Amunchain
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;
use pubsub_router_base::message::Message;

fuzz_target!(|data: &[u8]| {
    // Best-effort: ensure message decoding never panics on arbitrary bytes.
    if let Ok(msg) = Message::decode(data) {
        let _ = msg.encode();
    }
});
