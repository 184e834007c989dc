use std::path::PathBuf;

use ve_core::VeError;
use ve_tool::assert_case;

use crate::simulation::print_event;
use crate::{map_tool_error, resolve_dir, CheckArgs};

pub(crate) fn run_check(args: CheckArgs) -> Result<i32, VeError> {
    let case_dir = resolve_dir(&args.case_dir, "case-dir")?;
    let case_path = args
        .case_file
        .map(PathBuf::from)
        .unwrap_or_else(|| case_dir.join("testcase.json"));
    let report = assert_case(&case_dir, &case_path).map_err(map_tool_error)?;

    for event in &report.observed_events {
        print_event(event);
    }
    for state in report.states.values() {
        println!("ENTITY:{}", state);
    }
    println!("RESULT:OK");
    Ok(0)
}
