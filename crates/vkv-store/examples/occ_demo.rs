use std::process::ExitCode;
use vkv_store::demo::run_conflict_retry_demo;

fn main() -> ExitCode {
    match run_conflict_retry_demo() {
        Ok(result) => {
            for line in result.output_lines() {
                println!("{line}");
            }
            if result.lost_update_prevented {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(error) => {
            eprintln!("occ_demo failed: {error}");
            ExitCode::FAILURE
        }
    }
}
