//! preoomkiller
//!
//! Runs a command inside the current memory-limited cgroup and sends it
//! SIGTERM once usage crosses a percentage of the limit, before the
//! kernel OOM killer gets involved.
//!
//! Usage:
//!     preoomkiller [-h <one-line-shell>] [-s <one-line-shell>] [-p <percent>] -- <cmd> [args...]
//!
//! Examples:
//!     # Heap dump on pre-OOM, then clean up after the JVM is gone
//!     preoomkiller -p 85 \
//!         -h 'jcmd $PREOOM_PID GC.heap_dump /tmp/heap.hprof' \
//!         -s 'rm -rf /tmp/scratch' \
//!         -- java -jar app.jar
//!
//! Exit status is the command's own (128 + N when killed by signal N).
//! 125 means the supervisor failed, 126/127 that the command could not
//! be executed or found.

use clap::{ArgAction, CommandFactory, Parser};
use preoom_core::config::parse_percent;
use preoom_core::Config;
use preoom_runtime::init_logging;
use tracing::error;

#[derive(Debug, Parser)]
#[command(
    name = "preoomkiller",
    version,
    about = "Terminate a command cleanly before it hits the cgroup memory limit",
    disable_help_flag = true
)]
struct Cli {
    /// One-line shell run when the pre-OOM threshold is crossed
    #[arg(short = 'h', long, env = "PREOOM_HOOK", value_name = "ONE_LINE_SHELL")]
    hook: Option<String>,

    /// One-line shell run after the command exits, only if pre-OOM fired
    #[arg(short = 's', long, env = "PREOOM_STOP_HOOK", value_name = "ONE_LINE_SHELL")]
    stop_hook: Option<String>,

    /// Pre-OOM threshold as a percentage of the memory limit [default: 90]
    #[arg(short = 'p', long, env = "PREOOM_PERCENT", value_parser = parse_percent)]
    percent: Option<f64>,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,

    /// Command to run
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true, num_args = 1..)]
    command: Vec<String>,
}

impl Cli {
    /// Layer flags over env/defaults.
    fn into_config(self) -> Config {
        let base = Config::from_env();
        let percent = self.percent.unwrap_or(base.threshold_percent);
        base.command(self.command)
            .threshold_percent(percent)
            .on_preoom_hook(self.hook)
            .on_stop_hook(self.stop_hook)
    }
}

fn main() {
    let config = Cli::parse().into_config();
    if let Err(e) = config.validate() {
        Cli::command()
            .error(clap::error::ErrorKind::ValueValidation, e)
            .exit();
    }

    init_logging(&config.log_level);

    let code = match preoom_runtime::run(&config) {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            e.exit_code()
        }
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_full() {
        let cli = Cli::try_parse_from([
            "preoomkiller", "-p", "80", "-h", "echo hook", "-s", "echo stop", "--", "java", "-Xmx1g",
        ])
        .unwrap();
        let config = cli.into_config();
        assert_eq!(config.threshold_percent, 80.0);
        assert_eq!(config.on_preoom_hook.as_deref(), Some("echo hook"));
        assert_eq!(config.on_stop_hook.as_deref(), Some("echo stop"));
        assert_eq!(config.command, vec!["java".to_string(), "-Xmx1g".to_string()]);
    }

    #[test]
    fn test_long_flags() {
        let cli = Cli::try_parse_from([
            "preoomkiller", "--percent=75%", "--hook", "true", "--", "sleep", "1",
        ])
        .unwrap();
        assert_eq!(cli.percent, Some(75.0));
        assert_eq!(cli.hook.as_deref(), Some("true"));
    }

    #[test]
    fn test_rejects_bad_percent() {
        assert!(Cli::try_parse_from(["preoomkiller", "-p", "100", "--", "true"]).is_err());
        assert!(Cli::try_parse_from(["preoomkiller", "-p", "abc", "--", "true"]).is_err());
    }

    #[test]
    fn test_requires_command() {
        assert!(Cli::try_parse_from(["preoomkiller", "-p", "50"]).is_err());
    }
}
