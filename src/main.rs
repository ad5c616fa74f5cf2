use std::process::ExitCode;

use barracks_epi::runner::run;

fn main() -> ExitCode {
    match run() {
        Ok(summary) => {
            println!(
                "{} meeting records in {}",
                summary.meeting_records,
                summary.meeting_log_path.display()
            );
            if let Some(replay) = summary.replay {
                println!(
                    "{} meetings replayed, {} avoided",
                    replay.processed, replay.dropped
                );
            }
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}
