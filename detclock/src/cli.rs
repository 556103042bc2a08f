/// A command line argument after combined flags and attached values are split
#[derive(Debug, PartialEq, Eq)]
pub enum CliArg {
    Flag(String),
    Argument(String, String),
    Rest(Vec<String>),
}

/// Ticks and times may be negative, so `-5`, `-1.5` and `-.5` are values,
/// not short flags.
fn is_negative_number(arg: &str) -> bool {
    arg.strip_prefix('-')
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_digit() || c == '.')
}

fn expect_value(option: &str, args: &mut impl Iterator<Item = String>) -> Result<String, String> {
    args.next()
        .ok_or_else(|| format!("'{option}' expects an argument"))
}

impl CliArg {
    /// Split command line arguments (program name first) into flags, options
    /// with their value and the remaining positional arguments.
    ///
    /// Options named in `takes_argument`/`takes_argument_short` take a value,
    /// either attached (`--config=x.toml`, `-cx.toml`) or as the next argument.
    /// Everything after `--` is positional.
    pub fn normalize_arguments<I>(
        takes_argument: &[&str],
        takes_argument_short: &[char],
        iter: I,
    ) -> Result<Vec<Self>, String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = iter.into_iter().skip(1);
        let mut processed = vec![];
        let mut positional = vec![];

        while let Some(arg) = args.next() {
            if arg == "--" {
                positional.extend(args.by_ref());
                break;
            } else if arg == "-" || !arg.starts_with('-') || is_negative_number(&arg) {
                positional.push(arg);
            } else if let Some(long) = arg.strip_prefix("--") {
                processed.push(Self::long_option(long, takes_argument, &mut args)?);
            } else {
                Self::short_options(&arg[1..], takes_argument_short, &mut args, &mut processed)?;
            }
        }

        if !positional.is_empty() {
            processed.push(CliArg::Rest(positional));
        }

        Ok(processed)
    }

    fn long_option(
        long: &str,
        takes_argument: &[&str],
        args: &mut impl Iterator<Item = String>,
    ) -> Result<Self, String> {
        let (option, attached) = match long.split_once('=') {
            Some((name, value)) => (format!("--{name}"), Some(value.to_string())),
            None => (format!("--{long}"), None),
        };

        match (takes_argument.contains(&option.as_str()), attached) {
            (true, Some(value)) => Ok(CliArg::Argument(option, value)),
            (true, None) => {
                let value = expect_value(&option, args)?;
                Ok(CliArg::Argument(option, value))
            }
            (false, None) => Ok(CliArg::Flag(option)),
            (false, Some(_)) => Err(format!("'{option}' does not take an argument")),
        }
    }

    fn short_options(
        flags: &str,
        takes_argument_short: &[char],
        args: &mut impl Iterator<Item = String>,
        processed: &mut Vec<Self>,
    ) -> Result<(), String> {
        for (index, flag) in flags.char_indices() {
            let option = format!("-{flag}");
            if !takes_argument_short.contains(&flag) {
                processed.push(CliArg::Flag(option));
                continue;
            }

            // the rest of the group is the value: -t100
            let attached = &flags[index + flag.len_utf8()..];
            let value = if attached.starts_with('=') {
                return Err(format!("'{option}' does not accept '=', use '{option} VALUE'"));
            } else if attached.is_empty() {
                expect_value(&option, args)?
            } else {
                attached.to_string()
            };
            processed.push(CliArg::Argument(option, value));
            break;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(args: &[&str]) -> Result<Vec<CliArg>, String> {
        CliArg::normalize_arguments(
            &["--config", "--trigger-time"],
            &['c', 't'],
            args.iter().map(|s| s.to_string()),
        )
    }

    #[test]
    fn long_arguments() {
        assert_eq!(
            normalize(&["detclock-ctl", "--config=a.toml", "--trigger-time", "100"]).unwrap(),
            vec![
                CliArg::Argument("--config".into(), "a.toml".into()),
                CliArg::Argument("--trigger-time".into(), "100".into()),
            ]
        );
        assert_eq!(
            normalize(&["detclock-ctl", "--help"]).unwrap(),
            vec![CliArg::Flag("--help".into())]
        );
        assert!(normalize(&["detclock-ctl", "--help=yes"]).is_err());
        assert!(normalize(&["detclock-ctl", "--config"]).is_err());
    }

    #[test]
    fn short_arguments() {
        assert_eq!(
            normalize(&["detclock-ctl", "-hc", "a.toml", "-t100"]).unwrap(),
            vec![
                CliArg::Flag("-h".into()),
                CliArg::Argument("-c".into(), "a.toml".into()),
                CliArg::Argument("-t".into(), "100".into()),
            ]
        );
        assert!(normalize(&["detclock-ctl", "-c=a.toml"]).is_err());
        assert!(normalize(&["detclock-ctl", "-t"]).is_err());
    }

    #[test]
    fn negative_values() {
        assert_eq!(
            normalize(&["detclock-ctl", "-t", "-1600", "-t-5"]).unwrap(),
            vec![
                CliArg::Argument("-t".into(), "-1600".into()),
                CliArg::Argument("-t".into(), "-5".into()),
            ]
        );
        assert_eq!(
            normalize(&["detclock-ctl", "convert", "-5", "-1.5", "-c", "a.toml", "-.5"]).unwrap(),
            vec![
                CliArg::Argument("-c".into(), "a.toml".into()),
                CliArg::Rest(vec![
                    "convert".into(),
                    "-5".into(),
                    "-1.5".into(),
                    "-.5".into()
                ]),
            ]
        );
    }

    #[test]
    fn rest_arguments() {
        assert_eq!(
            normalize(&["detclock-ctl", "convert", "10", "--", "-x", "-"]).unwrap(),
            vec![CliArg::Rest(vec![
                "convert".into(),
                "10".into(),
                "-x".into(),
                "-".into()
            ])]
        );
    }
}
