/// This test should FAIL to compile
/// A screened submission is consumed by its first execution

use plotgrade::exec::Sandbox;
use plotgrade::screen::ScreenedSubmission;

fn run_twice(sandbox: &dyn Sandbox, screened: ScreenedSubmission) {
    let _ = sandbox.execute(screened);

    // This should fail: screened was moved into the first execute
    let _ = sandbox.execute(screened);
}

fn main() {}
