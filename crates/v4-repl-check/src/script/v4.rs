//! The V4 REPL smoke test.

use super::definition::{Script, Step};

/// Banner printed by the REPL when it starts.
pub const BANNER: &str = "V4 REPL";

/// Printed once the device has been reset and the prompt is live.
pub const READY: &str = "Device ready";

/// Acknowledgement after every evaluated line.
pub const OK: &str = "ok";

/// Reply to `.ping`.
pub const PING_REPLY: &str = "Device is responsive";

/// Printed on `bye`.
pub const FAREWELL: &str = "Goodbye!";

/// Build the fixed V4 REPL script.
///
/// Step 0 waits for start-up; steps 1 to 7 each send one line. The last step
/// also requires the REPL to exit.
#[must_use]
pub fn repl_smoke_test() -> Script {
    Script::named("v4-repl")
        .step(
            Step::new("REPL start-up")
                .expect(BANNER)
                .expect(READY)
                .on_pass("REPL started successfully"),
        )
        .step(
            Step::new("Simple arithmetic: 1 2 +")
                .send("1 2 +")
                .expect(OK)
                .on_pass("Simple arithmetic works"),
        )
        .step(
            Step::new("Define word: : sq dup * ;")
                .send(": sq dup * ;")
                .expect(OK)
                .on_pass("Word definition works"),
        )
        .step(
            Step::new("Use defined word: 5 sq")
                .send("5 sq")
                .expect(OK)
                .on_pass("Defined word execution works"),
        )
        .step(
            Step::new("Define another word: : double 2 * ;")
                .send(": double 2 * ;")
                .expect(OK)
                .on_pass("Multiple word definitions work"),
        )
        .step(
            Step::new("Use both words: 3 double sq")
                .send("3 double sq")
                .expect(OK)
                .on_pass("Multiple words work together"),
        )
        .step(
            Step::new("Meta command: .ping")
                .send(".ping")
                .expect(PING_REPLY)
                .on_pass(".ping command works"),
        )
        .step(
            Step::new("Exit REPL")
                .send("bye")
                .expect(FAREWELL)
                .expect_exit()
                .on_pass("Exit works"),
        )
}
