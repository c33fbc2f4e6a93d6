//! Command line.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgAction, Parser};

/// httpfs - mount the file tree served by an HTTP backend
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "httpfs")]
#[command(version, about, long_about = None, disable_version_flag = true)]
pub struct Args {
    /// Directory to mount the backend's tree at
    #[arg(long, value_name = "PATH")]
    pub mount: PathBuf,

    /// Print version
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    pub version: Option<bool>,

    /// Backend executable and its arguments; it must serve on $PORT
    #[arg(
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "COMMAND"
    )]
    pub command: Vec<OsString>,
}

impl Args {
    /// Parse a full argv, program name first.
    pub fn parse_from_argv<I, T>(argv: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::try_parse_from(normalize(argv))
    }
}

/// Rewrite single-dash `-mount` into `--mount`.
///
/// Only the flags ahead of the backend command are touched; everything from
/// the first positional argument on is passed through verbatim.
pub fn normalize<I, T>(argv: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut argv = argv.into_iter().map(Into::into);
    let mut out: Vec<OsString> = argv.next().into_iter().collect();
    let mut expect_value = false;

    for arg in argv.by_ref() {
        if expect_value {
            expect_value = false;
            out.push(arg);
            continue;
        }

        let Some(text) = arg.to_str() else {
            out.push(arg);
            break;
        };

        if text == "-mount" || text == "--mount" {
            expect_value = true;
            out.push("--mount".into());
        } else if let Some(value) = text.strip_prefix("-mount=") {
            out.push(format!("--mount={}", value).into());
        } else if text == "--" || !text.starts_with('-') {
            out.push(arg);
            break;
        } else {
            out.push(arg);
        }
    }

    out.extend(argv);
    out
}

#[cfg(test)]
mod tests {
    use clap::error::ErrorKind;

    use super::*;

    fn parse(argv: &[&str]) -> Result<Args, clap::Error> {
        Args::parse_from_argv(argv.iter().copied())
    }

    fn os(values: &[&str]) -> Vec<OsString> {
        values.iter().map(OsString::from).collect()
    }

    #[test]
    fn single_dash_mount_with_equals() {
        let args = parse(&["httpfs", "-mount=/mnt/x", "./server"]).unwrap();
        assert_eq!(args.mount, PathBuf::from("/mnt/x"));
        assert_eq!(args.command, os(&["./server"]));
    }

    #[test]
    fn every_mount_spelling_is_accepted() {
        for argv in [
            vec!["httpfs", "-mount", "/mnt/x", "srv"],
            vec!["httpfs", "--mount=/mnt/x", "srv"],
            vec!["httpfs", "--mount", "/mnt/x", "srv"],
        ] {
            let args = parse(&argv).unwrap();
            assert_eq!(args.mount, PathBuf::from("/mnt/x"));
            assert_eq!(args.command, os(&["srv"]));
        }
    }

    #[test]
    fn backend_arguments_pass_through() {
        let args = parse(&[
            "httpfs",
            "-mount=/mnt/x",
            "python3",
            "app.py",
            "-mount=ignored",
            "--port",
            "9",
        ])
        .unwrap();
        assert_eq!(
            args.command,
            os(&["python3", "app.py", "-mount=ignored", "--port", "9"])
        );
    }

    #[test]
    fn missing_command_is_an_error() {
        let err = parse(&["httpfs", "-mount=/mnt/x"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert!(err.use_stderr());
    }

    #[test]
    fn missing_mount_is_an_error() {
        let err = parse(&["httpfs", "./server"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn short_v_prints_version() {
        let err = parse(&["httpfs", "-v"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
        assert!(!err.use_stderr());
    }

    #[test]
    fn normalize_leaves_backend_flags_alone() {
        let out = normalize(["httpfs", "-mount", "m", "srv", "-mount", "x"]);
        assert_eq!(out, os(&["httpfs", "--mount", "m", "srv", "-mount", "x"]));
    }
}
