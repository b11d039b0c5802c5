use anyhow::{Context, Result, bail, format_err};
use clap::{Arg, ArgAction, ArgMatches, Command};
use dialoguer::Confirm;
use indoc::indoc;

use encoding::all::encodings;
use encoding::types::Encoding;
use even6_binxml::{BinXmlParser, ParserSettings};
use log::{Level, LevelFilter, info};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinXmlOutputFormat {
    Json,
    Xml,
}

struct BinXmlDump {
    parser_settings: ParserSettings,
    inputs: Vec<PathBuf>,
    output_format: BinXmlOutputFormat,
    output: Box<dyn Write>,
    verbosity_level: Option<Level>,
    stop_after_error: bool,
}

impl BinXmlDump {
    pub fn from_cli_matches(matches: &ArgMatches) -> Result<Self> {
        let inputs: Vec<PathBuf> = matches
            .get_many::<String>("INPUT")
            .ok_or_else(|| format_err!("At least one input file is required"))?
            .map(PathBuf::from)
            .collect();

        let output_format = match matches
            .get_one::<String>("output-format")
            .map(String::as_str)
            .unwrap_or("xml")
        {
            "json" => BinXmlOutputFormat::Json,
            _ => BinXmlOutputFormat::Xml,
        };

        let num_threads = matches
            .get_one::<usize>("num-threads")
            .copied()
            .unwrap_or(0);

        let num_threads = match (cfg!(feature = "multithreading"), num_threads) {
            (true, number) => number,
            (false, 0 | 1) => 1,
            (false, _) => {
                eprintln!(
                    "turned on threads, but library was compiled without `multithreading` feature! using fallback sequential decoding"
                );
                1
            }
        };

        let verbosity_level = match matches.get_count("verbose") {
            0 => None,
            1 => Some(Level::Info),
            2 => Some(Level::Debug),
            3 => Some(Level::Trace),
            _ => {
                eprintln!("using more than  -vvv does not affect verbosity level");
                Some(Level::Trace)
            }
        };

        let codec_name = matches
            .get_one::<String>("ansi-codec")
            .map(String::as_str)
            .unwrap_or("windows-1252");

        let ansi_codec = encodings()
            .iter()
            .find(|c| c.name() == codec_name)
            .ok_or_else(|| format_err!("Unknown ansi codec `{}`", codec_name))?;

        let output: Box<dyn Write> = if let Some(path) = matches.get_one::<String>("output-target")
        {
            let file =
                Self::create_output_file(path, !matches.get_flag("no-confirm-overwrite"))
                    .with_context(|| format!("An error occurred while creating output file at `{}`", path))?;
            Box::new(file)
        } else {
            Box::new(io::stdout())
        };

        Ok(BinXmlDump {
            parser_settings: ParserSettings::new()
                .num_threads(num_threads)
                .escape_text(!matches.get_flag("no-escape"))
                .ansi_codec(*ansi_codec),
            inputs,
            output_format,
            output,
            verbosity_level,
            stop_after_error: matches.get_flag("stop-after-error"),
        })
    }

    /// Main entry point for `BinXmlDump`
    pub fn run(&mut self) -> Result<()> {
        self.try_to_initialize_logging();

        let mut paths = Vec::with_capacity(self.inputs.len());
        let mut buffers = Vec::with_capacity(self.inputs.len());
        for path in &self.inputs {
            match fs::read(path) {
                Ok(data) => {
                    paths.push(path);
                    buffers.push(data);
                }
                Err(e) => {
                    let e = format_err!(
                        "Failed to open file {}.\n\tcaused by: {}",
                        path.display(),
                        e
                    );
                    if self.stop_after_error {
                        return Err(e);
                    }
                    eprintln!("{:?}", e);
                }
            }
        }
        info!("Loaded {} of {} inputs", buffers.len(), self.inputs.len());

        let parser = BinXmlParser::new().with_configuration(self.parser_settings.clone());

        let outputs: Vec<_> = match self.output_format {
            BinXmlOutputFormat::Xml => parser
                .render_many(&buffers)
                .into_iter()
                .map(|r| r.map_err(anyhow::Error::from))
                .collect(),
            BinXmlOutputFormat::Json => parser
                .decode_many(&buffers)
                .into_iter()
                .map(|r| r.and_then(|doc| doc.to_json()).map_err(anyhow::Error::from))
                .collect(),
        };

        for (path, output) in paths.into_iter().zip(outputs) {
            match output {
                Ok(text) => writeln!(self.output, "{}", text)?,
                Err(e) => {
                    let e = e.context(format!("Failed to decode {}", path.display()));
                    if self.stop_after_error {
                        return Err(e);
                    }
                    eprintln!("{:?}", e);
                }
            }
        }

        self.output.flush()?;
        Ok(())
    }

    /// If `prompt` is passed, will display a confirmation prompt before overwriting files.
    fn create_output_file(path: impl AsRef<Path>, prompt: bool) -> Result<File> {
        let p = path.as_ref();

        if p.is_dir() {
            bail!(
                "There is a directory at {}, refusing to overwrite",
                p.display()
            );
        }

        if p.exists() {
            if prompt {
                match Confirm::new()
                    .with_prompt(format!(
                        "Are you sure you want to override output file at {}",
                        p.display()
                    ))
                    .default(false)
                    .interact()
                {
                    Ok(true) => Ok(File::create(p)?),
                    Ok(false) => bail!("Cancelled"),
                    Err(e) => bail!(
                        "Failed to write confirmation prompt to term caused by\n{}",
                        e
                    ),
                }
            } else {
                Ok(File::create(p)?)
            }
        } else {
            // Ok to assume p is not an existing directory
            match p.parent() {
                Some(parent) => {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        fs::create_dir_all(parent)?;
                    }
                    Ok(File::create(p)?)
                }
                None => bail!("Output file cannot be root."),
            }
        }
    }

    fn try_to_initialize_logging(&self) {
        if let Some(level) = self.verbosity_level {
            if let Err(e) = TermLogger::init(
                level.to_level_filter(),
                Config::default(),
                TerminalMode::Stderr,
                ColorChoice::Auto,
            ) {
                eprintln!("Failed to initialize logging: {}", e);
            }
        } else {
            log::set_max_level(LevelFilter::Off);
        }
    }
}

fn command() -> Command {
    Command::new("BinXML Dump")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Utility to decode and render MS-EVEN6 BinXML payloads")
        .arg(
            Arg::new("INPUT")
                .required(true)
                .num_args(1..)
                .help("Files holding raw BinXML bytes, one document per file."),
        )
        .arg(
            Arg::new("num-threads")
                .short('t')
                .long("threads")
                .default_value("0")
                .value_parser(clap::value_parser!(usize))
                .help("Sets the number of worker threads, defaults to number of CPU cores."),
        )
        .arg(
            Arg::new("output-format")
                .short('o')
                .long("format")
                .value_parser(["xml", "json"])
                .default_value("xml")
                .help("Sets the output format")
                .long_help(indoc!(
                    r#"
                    Sets the output format:
                        "xml"   - prints the rendered XML, one document per line.
                        "json"  - prints the decoded document tree as JSON.
                    "#
                )),
        )
        .arg(
            Arg::new("output-target")
                .long("output")
                .short('f')
                .action(ArgAction::Set)
                .help(indoc!(
                    "Writes output to the file specified instead of stdout, errors will still be printed to stderr.
                     Will ask for confirmation before overwriting files, to allow overwriting, pass `--no-confirm-overwrite`
                     Will create parent directories if needed."
                )),
        )
        .arg(
            Arg::new("no-confirm-overwrite")
                .long("no-confirm-overwrite")
                .action(ArgAction::SetTrue)
                .help("When set, will not ask for confirmation before overwriting files, useful for automation"),
        )
        .arg(
            Arg::new("no-escape")
                .long("no-escape")
                .action(ArgAction::SetTrue)
                .help("When set, text and attribute values are written without XML escaping."),
        )
        .arg(
            Arg::new("ansi-codec")
                .long("ansi-codec")
                .value_parser(
                    encodings()
                        .iter()
                        .filter(|&e| e.raw_decoder().is_ascii_compatible())
                        .map(|e| e.name())
                        .collect::<Vec<&'static str>>(),
                )
                .default_value(encoding::all::WINDOWS_1252.name())
                .help("When set, controls the codec of ansi encoded strings."),
        )
        .arg(
            Arg::new("stop-after-error")
                .long("stop-after-error")
                .action(ArgAction::SetTrue)
                .help("When set, stops at the first input that fails and exits with an error."),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help(indoc!(
                    r#"
                    -v   - info
                    -vv  - debug
                    -vvv - trace
                    NOTE: trace output is only available in debug builds, as it is extremely verbose."#
                )),
        )
}

fn main() {
    let matches = command().get_matches();

    let result = BinXmlDump::from_cli_matches(&matches).and_then(|mut app| app.run());
    if let Err(e) = result {
        eprintln!("{:?}", e);
        exit(1);
    }
}
