use std::{path::PathBuf, process::ExitCode, str::FromStr};

use detclock_proto::DetectorClocks;
use tracing::{info, warn};
use tracing_subscriber::util::SubscriberInitExt;

use crate::{
    cli::CliArg,
    config::{load_record, Config, ConfigError},
    exitcode,
    tracing::LogLevel,
};

const USAGE_MSG: &str = "\
usage: detclock-ctl validate -c PATH [-i RECORD]
       detclock-ctl report -c PATH
       detclock-ctl record -c PATH
       detclock-ctl convert -c PATH [-t TRIGGER] [-b BEAM] TICK...
       detclock-ctl -h | detclock-ctl -v";

const DESCRIPTOR: &str = "detclock-ctl - detector electronics clock configuration";

const HELP_MSG: &str = "Options:
  -c, --config=PATH                    clock configuration .toml file
  -i, --inherit=RECORD                 clock configuration record of a previous job (.json)
  -t, --trigger-time=TIME              hardware trigger time of the event [us]
  -b, --beam-time=TIME                 beam gate opening time of the event [us]
  -l, --log-level=LOG_LEVEL            change the log level
  -h, --help                           display this help text
  -v, --version                        display version information";

pub fn long_help_message() -> String {
    format!("{DESCRIPTOR}\n\n{USAGE_MSG}\n\n{HELP_MSG}")
}

#[derive(Debug, Default, PartialEq, Eq)]
pub enum DetclockCtlAction {
    #[default]
    Help,
    Version,
    Validate,
    Report,
    Record,
    Convert,
}

#[derive(Debug, Default)]
pub(crate) struct DetclockCtlOptions {
    config: Option<PathBuf>,
    inherit: Option<PathBuf>,
    log_level: Option<LogLevel>,
    trigger_time: Option<f64>,
    beam_time: Option<f64>,
    ticks: Vec<f64>,
    help: bool,
    version: bool,
    command: Option<DetclockCtlAction>,
    action: DetclockCtlAction,
}

fn parse_number(option: &str, value: &str) -> Result<f64, String> {
    value
        .parse()
        .map_err(|_| format!("invalid number for {option}: {value}"))
}

impl DetclockCtlOptions {
    const TAKES_ARGUMENT: &'static [&'static str] = &[
        "--config",
        "--inherit",
        "--trigger-time",
        "--beam-time",
        "--log-level",
    ];
    const TAKES_ARGUMENT_SHORT: &'static [char] = &['c', 'i', 't', 'b', 'l'];

    /// parse an iterator over command line arguments
    pub fn try_parse_from<I, T>(iter: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str> + Clone,
    {
        let mut options = DetclockCtlOptions::default();

        let it = iter.into_iter().map(|x| x.as_ref().to_string());

        let arg_iter =
            CliArg::normalize_arguments(Self::TAKES_ARGUMENT, Self::TAKES_ARGUMENT_SHORT, it)?;

        for arg in arg_iter {
            match arg {
                CliArg::Flag(flag) => match flag.as_str() {
                    "-h" | "--help" => {
                        options.help = true;
                    }
                    "-v" | "--version" => {
                        options.version = true;
                    }
                    option => {
                        Err(format!("invalid option provided: {option}"))?;
                    }
                },
                CliArg::Argument(option, value) => match option.as_str() {
                    "-c" | "--config" => {
                        options.config = Some(PathBuf::from(value));
                    }
                    "-i" | "--inherit" => {
                        options.inherit = Some(PathBuf::from(value));
                    }
                    "-t" | "--trigger-time" => {
                        options.trigger_time = Some(parse_number(&option, &value)?);
                    }
                    "-b" | "--beam-time" => {
                        options.beam_time = Some(parse_number(&option, &value)?);
                    }
                    "-l" | "--log-level" => {
                        options.log_level =
                            Some(LogLevel::from_str(&value).map_err(|e| e.to_string())?);
                    }
                    option => {
                        Err(format!("invalid option provided: {option}"))?;
                    }
                },
                CliArg::Rest(rest) => {
                    let mut rest = rest.into_iter();
                    if let Some(command) = rest.next() {
                        options.command = Some(match command.as_str() {
                            "validate" => DetclockCtlAction::Validate,
                            "report" => DetclockCtlAction::Report,
                            "record" => DetclockCtlAction::Record,
                            "convert" => DetclockCtlAction::Convert,
                            unknown => Err(format!("unknown command: {unknown}"))?,
                        });
                    }

                    for tick in rest {
                        options.ticks.push(parse_number("tick", &tick)?);
                    }
                }
            }
        }

        if !options.ticks.is_empty() && options.command != Some(DetclockCtlAction::Convert) {
            Err("only the convert command takes ticks")?;
        }

        options.resolve_action();

        Ok(options)
    }

    /// from the arguments resolve which action should be performed
    fn resolve_action(&mut self) {
        if self.help {
            self.action = DetclockCtlAction::Help;
        } else if self.version {
            self.action = DetclockCtlAction::Version;
        } else {
            self.action = self.command.take().unwrap_or_default();
        }
    }
}

// initializes the logger so that logs during config parsing are reported. Then it overrides the
// log level based on the config if required.
fn initialize_logging_parse_config(
    initial_log_level: Option<LogLevel>,
    config_path: Option<PathBuf>,
) -> Result<Config, ConfigError> {
    let mut log_level = initial_log_level.unwrap_or_default();

    let config_path = config_path.ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "no configuration path specified",
        )
    })?;

    let config_tracing = crate::tracing::tracing_init(log_level);
    let config = ::tracing::subscriber::with_default(config_tracing, || {
        Config::from_file(&config_path)
    })?;

    if let Some(config_log_level) = config.observability.log_level {
        if initial_log_level.is_none() {
            log_level = config_log_level;
        }
    }

    // Late completion not needed, so ignore result.
    let _ = crate::tracing::tracing_init(log_level).try_init();

    Ok(config)
}

fn load_clocks(options: &DetclockCtlOptions) -> Result<DetectorClocks, ConfigError> {
    let config = initialize_logging_parse_config(options.log_level, options.config.clone())?;
    config.check()?;
    Ok(DetectorClocks::new(config.clocks)?)
}

fn validate(options: &DetclockCtlOptions) -> ExitCode {
    let clocks = match load_clocks(options) {
        Ok(clocks) => clocks,
        Err(e) => {
            eprintln!("Error: Could not load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match (&options.inherit, clocks.inherit_clock_config()) {
        (Some(path), true) => {
            let record = match load_record(path) {
                Ok(record) => record,
                Err(e) => {
                    eprintln!("Error: Could not load inherited configuration: {e}");
                    return ExitCode::FAILURE;
                }
            };

            if let Err(e) = clocks.check_inherited(&record) {
                eprintln!("Error: {e}");
                return ExitCode::from(exitcode::CONFIG);
            }

            info!("clock configuration matches the inherited record");
        }
        (Some(_), false) => {
            warn!("InheritClockConfig is disabled, ignoring the inherited configuration record");
        }
        (None, true) => {
            info!("no inherited configuration record given, using the configuration as is");
        }
        (None, false) => {}
    }

    eprintln!("Config looks good");
    ExitCode::SUCCESS
}

fn run_with_clocks(
    options: &DetclockCtlOptions,
    f: impl FnOnce(&mut DetectorClocks) -> Result<(), ConfigError>,
) -> ExitCode {
    let mut clocks = match load_clocks(options) {
        Ok(clocks) => clocks,
        Err(e) => {
            eprintln!("Error: Could not load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match f(&mut clocks) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(exitcode::SOFTWARE)
        }
    }
}

fn print_conversions(clocks: &mut DetectorClocks, options: &DetclockCtlOptions) {
    let trigger_time = options.trigger_time.unwrap_or(clocks.trigger_time());
    let beam_time = options.beam_time.unwrap_or(clocks.beam_gate_time());
    clocks.set_trigger_time(trigger_time, beam_time);

    println!(
        "trigger time: {} us, beam gate time: {} us, TPC start time: {} us",
        clocks.trigger_time(),
        clocks.beam_gate_time(),
        clocks.tpc_time()
    );
    for &tick in &options.ticks {
        println!(
            "tick {tick}: time {} us, trigger {:+} us, beam {:+} us, tdc {}",
            clocks.tpc_tick_to_time(tick),
            clocks.tpc_tick_to_trig_time(tick),
            clocks.tpc_tick_to_beam_time(tick),
            clocks.tpc_tick_to_tdc(tick),
        );
    }
}

const VERSION: &str = env!("CARGO_PKG_VERSION");
const GIT_REV: &str = env!("DETCLOCK_GIT_REV");
const GIT_DATE: &str = env!("DETCLOCK_GIT_DATE");

pub fn main() -> std::io::Result<ExitCode> {
    let options = match DetclockCtlOptions::try_parse_from(std::env::args()) {
        Ok(options) => options,
        Err(msg) => return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, msg)),
    };

    let code = match options.action {
        DetclockCtlAction::Help => {
            println!("{}", long_help_message());
            ExitCode::SUCCESS
        }
        DetclockCtlAction::Version => {
            eprintln!("detclock-ctl {VERSION} ({GIT_REV}, {GIT_DATE})");
            ExitCode::SUCCESS
        }
        DetclockCtlAction::Validate => validate(&options),
        DetclockCtlAction::Report => run_with_clocks(&options, |clocks| {
            println!("{}", clocks.debug_report());
            Ok(())
        }),
        DetclockCtlAction::Record => run_with_clocks(&options, |clocks| {
            println!("{}", serde_json::to_string_pretty(&clocks.config_record())?);
            Ok(())
        }),
        DetclockCtlAction::Convert => run_with_clocks(&options, |clocks| {
            print_conversions(clocks, &options);
            Ok(())
        }),
    };

    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_no_arguments() {
        let arguments: [String; 0] = [];
        let parsed_empty = DetclockCtlOptions::try_parse_from(arguments).unwrap();

        assert!(parsed_empty.config.is_none());
        assert_eq!(parsed_empty.action, DetclockCtlAction::Help);
    }

    #[test]
    fn cli_validate() {
        let arguments = &[
            "/usr/bin/detclock-ctl",
            "validate",
            "-c",
            "clocks.toml",
            "--inherit",
            "previous.json",
        ];
        let parsed = DetclockCtlOptions::try_parse_from(arguments).unwrap();

        assert_eq!(parsed.action, DetclockCtlAction::Validate);
        assert_eq!(parsed.config, Some("clocks.toml".into()));
        assert_eq!(parsed.inherit, Some("previous.json".into()));
        assert!(parsed.log_level.is_none());
    }

    #[test]
    fn cli_convert() {
        let arguments = &[
            "/usr/bin/detclock-ctl",
            "--config=clocks.toml",
            "-t",
            "100",
            "-b50.5",
            "convert",
            "0",
            "10.5",
        ];
        let parsed = DetclockCtlOptions::try_parse_from(arguments).unwrap();

        assert_eq!(parsed.action, DetclockCtlAction::Convert);
        assert_eq!(parsed.trigger_time, Some(100.0));
        assert_eq!(parsed.beam_time, Some(50.5));
        assert_eq!(parsed.ticks, vec![0.0, 10.5]);
    }

    #[test]
    fn cli_negative_ticks() {
        let arguments = &[
            "/usr/bin/detclock-ctl",
            "convert",
            "-c",
            "clocks.toml",
            "-t",
            "-1600",
            "-5",
            "-0.25",
        ];
        let parsed = DetclockCtlOptions::try_parse_from(arguments).unwrap();

        assert_eq!(parsed.action, DetclockCtlAction::Convert);
        assert_eq!(parsed.trigger_time, Some(-1600.0));
        assert_eq!(parsed.ticks, vec![-5.0, -0.25]);
    }

    #[test]
    fn cli_help_wins() {
        let arguments = &["/usr/bin/detclock-ctl", "report", "-h"];
        let parsed = DetclockCtlOptions::try_parse_from(arguments).unwrap();
        assert_eq!(parsed.action, DetclockCtlAction::Help);

        let arguments = &["/usr/bin/detclock-ctl", "report", "-v", "-l", "debug"];
        let parsed = DetclockCtlOptions::try_parse_from(arguments).unwrap();
        assert_eq!(parsed.action, DetclockCtlAction::Version);
        assert_eq!(parsed.log_level, Some(LogLevel::Debug));
    }

    #[test]
    fn cli_invalid() {
        assert!(DetclockCtlOptions::try_parse_from(["detclock-ctl", "frobnicate"]).is_err());
        assert!(DetclockCtlOptions::try_parse_from(["detclock-ctl", "record", "12"]).is_err());
        assert!(
            DetclockCtlOptions::try_parse_from(["detclock-ctl", "convert", "-t", "soon"]).is_err()
        );
        assert!(DetclockCtlOptions::try_parse_from(["detclock-ctl", "-l", "loud"]).is_err());
        assert!(DetclockCtlOptions::try_parse_from(["detclock-ctl", "-x"]).is_err());
    }
}
