//! Command-line options.

use anyhow::{bail, Result};
use std::path::PathBuf;

/// Parsed command line.
#[derive(Debug, Clone)]
pub struct Options {
    /// Samples per view; 0 renders forever.
    pub frames: u32,
    /// Initial window / render size.
    pub width: u32,
    pub height: u32,
    /// PNG path for the screenshot button (and for batch mode output).
    pub screenshot: PathBuf,
    /// Render `frames` samples, save the screenshot, exit.
    pub batch: bool,
    /// Filter the image before every presentation.
    pub denoise: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            frames: 0,
            width: 1280,
            height: 720,
            screenshot: PathBuf::from("ember.png"),
            batch: false,
            denoise: false,
        }
    }
}

const USAGE: &str = "Usage: ember_viewer [options]
  --frames N        samples per view, 0 = unbounded (default 0)
  --width N         window width (default 1280)
  --height N        window height (default 720)
  --screenshot PATH output PNG path (default ember.png)
  --batch           render --frames samples, save the screenshot, exit
  --denoise         filter the image before each presentation
  --help            print this help";

impl Options {
    pub fn parse<I: Iterator<Item = String>>(mut args: I) -> Result<Self> {
        let mut options = Self::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--frames" => options.frames = parse_value(&arg, args.next())?,
                "--width" => options.width = parse_value(&arg, args.next())?,
                "--height" => options.height = parse_value(&arg, args.next())?,
                "--screenshot" => {
                    let Some(path) = args.next() else {
                        bail!("{arg} needs a value\n{USAGE}");
                    };
                    options.screenshot = PathBuf::from(path);
                }
                "--batch" => options.batch = true,
                "--denoise" => options.denoise = true,
                "--help" | "-h" => bail!("{USAGE}"),
                other => bail!("unknown option '{other}'\n{USAGE}"),
            }
        }

        if options.width == 0 || options.height == 0 {
            bail!("--width and --height must be nonzero");
        }
        if options.batch && options.frames == 0 {
            bail!("--batch needs a nonzero --frames to know when to stop");
        }
        Ok(options)
    }
}

fn parse_value(flag: &str, value: Option<String>) -> Result<u32> {
    let Some(value) = value else {
        bail!("{flag} needs a value\n{USAGE}");
    };
    match value.parse() {
        Ok(n) => Ok(n),
        Err(_) => bail!("{flag}: '{value}' is not a number"),
    }
}
