/// This test should FAIL to compile
/// Sandboxes accept screened submissions only

use plotgrade::exec::Sandbox;
use plotgrade::screen::Submission;

fn run_unscreened(sandbox: &dyn Sandbox) {
    let submission = Submission::from_source("evil.py", "import os\n");

    // This should fail: expected ScreenedSubmission, found Submission
    let _ = sandbox.execute(submission);
}

fn main() {}
