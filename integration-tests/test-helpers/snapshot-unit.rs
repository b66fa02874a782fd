// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A test program that takes snapshots, run end to end by the integration tests.

use trellis_harness::{Suite, expect};

fn register(s: &mut Suite) {
    s.describe("greetings", |s| {
        s.case("alpha", |cx| Ok(expect("alpha value").to_match_snapshot(cx)?));
        s.case("beta", |cx| {
            // Left unterminated on purpose: the next protocol line follows on the same line.
            print!("progress...");
            Ok(expect("beta value").to_match_snapshot(cx)?)
        });
        s.case("gamma", |cx| {
            expect(vec![1.5, 0.1 + 0.2]).to_match_snapshot(cx)?;
            expect(f64::NAN).to_equal(f64::NAN)?;
            Ok(())
        });
    });
}

trellis_harness::main!(name = "snapshots", register);
