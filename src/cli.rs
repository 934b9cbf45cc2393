use clap::Parser;
use std::path::Path;

use crate::align::{AlignmentPolicy, parse_alignment};
use crate::error::{AlignError, AlignResult};

#[derive(Parser, Debug)]
#[command(name = "rzipalign")]
#[command(version)]
#[command(about = "Zip alignment utility", long_about = None)]
#[command(after_help = "Examples:\n  \
  rzipalign -f -p 4 app.apk aligned.apk       align stored entries, .so files on pages\n  \
  rzipalign -c -v 4 aligned.apk               check alignment only\n  \
  rzipalign -c 4 https://example.com/app.apk  check a remote archive")]
pub struct Cli {
    /// Alignment in bytes, e.g. '4' provides 32-bit alignment
    #[arg(value_name = "ALIGN", allow_negative_numbers = true)]
    pub alignment: String,

    /// Input ZIP file path or HTTP URL
    #[arg(value_name = "INFILE")]
    pub input: String,

    /// Output ZIP file (not used with -c)
    #[arg(value_name = "OUTFILE")]
    pub output: Option<String>,

    /// Check alignment only (does not modify file)
    #[arg(short = 'c')]
    pub check: bool,

    /// Overwrite existing outfile
    #[arg(short = 'f')]
    pub overwrite: bool,

    /// Memory page alignment for stored shared object files
    #[arg(short = 'p')]
    pub page_align_shared_libs: bool,

    /// Verbose output
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Recompress deflate entries with Zopfli
    #[arg(short = 'z')]
    pub recompress: bool,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.input.starts_with("http://") || self.input.starts_with("https://")
    }

    pub fn policy(&self) -> AlignResult<AlignmentPolicy> {
        let alignment = parse_alignment(&self.alignment)?;
        Ok(AlignmentPolicy::new(alignment)?.with_page_aligned_shared_libs(self.page_align_shared_libs))
    }

    /// Check the argument combination and the output path.
    ///
    /// Returns the output path in rewrite mode, `None` in check mode.
    pub fn validate(&self) -> AlignResult<Option<&str>> {
        if self.check {
            if self.output.is_some() {
                return Err(AlignError::Argument(
                    "check mode takes exactly one archive".to_string(),
                ));
            }
            return Ok(None);
        }

        let Some(output) = self.output.as_deref() else {
            return Err(AlignError::Argument("missing output file".to_string()));
        };

        if self.input == output || same_file(&self.input, output) {
            return Err(AlignError::Argument(
                "Input and output can't be same file".to_string(),
            ));
        }

        if !self.overwrite && Path::new(output).exists() {
            return Err(AlignError::Argument(format!("Output file '{output}' exists")));
        }

        Ok(Some(output))
    }
}

fn same_file(a: &str, b: &str) -> bool {
    match (Path::new(a).canonicalize(), Path::new(b).canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("rzipalign").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn rewrite_mode_needs_an_output() {
        let cli = parse(&["4", "in.zip"]);
        assert!(matches!(cli.validate(), Err(AlignError::Argument(_))));
    }

    #[test]
    fn check_mode_takes_one_archive() {
        assert_eq!(parse(&["-c", "4", "in.zip"]).validate().unwrap(), None);

        let cli = parse(&["-c", "4", "in.zip", "out.zip"]);
        assert!(matches!(cli.validate(), Err(AlignError::Argument(_))));
    }

    #[test]
    fn same_input_and_output_is_rejected() {
        let cli = parse(&["4", "app.apk", "app.apk"]);
        let err = cli.validate().unwrap_err();
        assert_eq!(err.to_string(), "Input and output can't be same file");
    }

    #[test]
    fn existing_output_needs_force() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.zip");
        std::fs::write(&output, b"").unwrap();
        let output = output.to_str().unwrap();

        let cli = parse(&["4", "in.zip", output]);
        assert!(cli.validate().unwrap_err().to_string().contains("exists"));

        let cli = parse(&["-f", "4", "in.zip", output]);
        assert_eq!(cli.validate().unwrap(), Some(output));
    }

    #[test]
    fn flags_build_the_policy() {
        let policy = parse(&["-p", "-c", "4", "app.apk"]).policy().unwrap();
        assert_eq!(policy.base_alignment(), 4);
        assert_eq!(policy.alignment_for(b"lib/x86/libfoo.so"), 4096);
    }

    #[test]
    fn bad_alignment_values() {
        assert!(matches!(
            parse(&["0", "in.zip", "out.zip"]).policy(),
            Err(AlignError::InvalidAlignment(_))
        ));
        assert!(matches!(
            parse(&["-4", "in.zip", "out.zip"]).policy(),
            Err(AlignError::InvalidAlignment(_))
        ));
    }
}
