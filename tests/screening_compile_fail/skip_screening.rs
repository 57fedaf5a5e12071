/// This test should FAIL to compile
/// Only the screener can produce a ScreenedSubmission

use plotgrade::screen::{ScreenedSubmission, Submission, Verdict};

fn main() {
    let submission = Submission::from_source("evil.py", "import os\n");

    // This should fail: ScreenedSubmission fields are private
    let _screened = ScreenedSubmission {
        submission,
        verdict: Verdict::default(),
    };
}
