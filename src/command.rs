//! Capture utility command line

use crate::params::CaptureParameters;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

pub const DEFAULT_UTILITY: &str = "libcamera-jpeg";
pub const DEFAULT_QUALITY: u8 = 95;

/// Fully materialized invocation of the capture utility.
///
/// Built once per request:
/// `<utility> -n --quality <q> -o <path> [--shutter <µs>] [--gain <g>] [--awbgains <r,b>]`
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureCommand {
    program: PathBuf,
    args: Vec<String>,
    output: PathBuf,
}

impl CaptureCommand {
    pub fn build(
        program: impl AsRef<Path>,
        quality: u8,
        output: impl AsRef<Path>,
        params: &CaptureParameters,
    ) -> Self {
        let output = output.as_ref().to_path_buf();
        let mut args = vec![
            "-n".to_string(),
            "--quality".to_string(),
            quality.to_string(),
            "-o".to_string(),
            output.display().to_string(),
        ];

        if let Some(us) = params.shutter_us {
            args.push("--shutter".to_string());
            args.push(us.to_string());
        }
        if let Some(gain) = params.gain {
            args.push("--gain".to_string());
            args.push(format_gain(gain));
        }
        if let Some(awb) = params.awb_gains {
            args.push("--awbgains".to_string());
            args.push(awb.to_string());
        }

        Self {
            program: program.as_ref().to_path_buf(),
            args,
            output,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Flag value following `flag`, if present.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Render as a single shell-style line for logs.
    pub fn display_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    pub fn to_tokio(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(self.args.iter().map(OsStr::new));
        cmd
    }
}

/// Gains are always written with a decimal point (`4.0`, not `4`).
fn format_gain(gain: f64) -> String {
    if gain.fract() == 0.0 {
        format!("{:.1}", gain)
    } else {
        gain.to_string()
    }
}

/// Resolve the capture utility on the execution path.
pub fn locate_utility(utility: &str) -> Option<PathBuf> {
    match which::which(utility) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!(utility = %utility, error = %e, "Capture utility not found");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{normalize, CaptureRequest};

    fn command_for(shutter: Option<&str>, gain: Option<&str>) -> CaptureCommand {
        let params = normalize(&CaptureRequest::new(shutter, gain)).unwrap();
        CaptureCommand::build(DEFAULT_UTILITY, DEFAULT_QUALITY, "/tmp/capture-abc.jpg", &params)
    }

    #[test]
    fn test_base_flags() {
        let cmd = command_for(None, None);
        assert_eq!(
            cmd.args(),
            ["-n", "--quality", "95", "-o", "/tmp/capture-abc.jpg"]
        );
        assert_eq!(cmd.output(), Path::new("/tmp/capture-abc.jpg"));
        assert_eq!(cmd.program(), Path::new("libcamera-jpeg"));
    }

    #[test]
    fn test_long_exposure_flags() {
        let cmd = command_for(Some("2"), None);
        assert_eq!(
            cmd.display_line(),
            "libcamera-jpeg -n --quality 95 -o /tmp/capture-abc.jpg \
             --shutter 2000000 --gain 4.0 --awbgains 1,0.6"
        );
    }

    #[test]
    fn test_short_exposure_with_gain() {
        let cmd = command_for(Some("100"), Some("2.5"));
        assert_eq!(cmd.value_of("--shutter"), Some("100000"));
        assert_eq!(cmd.value_of("--gain"), Some("2.5"));
        assert_eq!(cmd.value_of("--awbgains"), None);
    }

    #[test]
    fn test_non_positive_values_are_omitted() {
        let cmd = command_for(Some("0"), Some("-3"));
        assert_eq!(cmd.value_of("--shutter"), None);
        assert_eq!(cmd.value_of("--gain"), None);
    }

    #[test]
    fn test_format_gain() {
        assert_eq!(format_gain(4.0), "4.0");
        assert_eq!(format_gain(1.25), "1.25");
        assert_eq!(format_gain(16.0), "16.0");
    }

    #[test]
    fn test_locate_missing_utility() {
        assert!(locate_utility("definitely-not-a-capture-utility-7f3a").is_none());
    }
}
