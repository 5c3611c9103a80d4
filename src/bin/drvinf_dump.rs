use std::cell::RefCell;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use dialoguer::Confirm;
use log::LevelFilter;

use drvinf::{DriverPack, ParserSettings, ScanReport};

#[derive(Copy, Clone, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Jsonl,
}

struct DrvinfDump {
    settings: ParserSettings,
    input: PathBuf,
    output_format: OutputFormat,
    // It's ok to rely on interior mutability here,
    // since there is only one code flow writing to output which is trivial to verify.
    output: RefCell<Box<dyn Write>>,
    verbosity_level: u8,
}

impl DrvinfDump {
    fn from_cli_matches(matches: &ArgMatches) -> Result<Self> {
        let input = matches
            .get_one::<PathBuf>("INPUT")
            .expect("This is a required argument")
            .clone();

        let output_format = match matches
            .get_one::<String>("output-format")
            .map(String::as_str)
            .unwrap_or_default()
        {
            "jsonl" => OutputFormat::Jsonl,
            _ => OutputFormat::Json,
        };

        let num_threads = *matches
            .get_one::<usize>("num-threads")
            .expect("has set default");

        let num_threads = if cfg!(feature = "multithreading") {
            num_threads
        } else {
            if num_threads > 1 {
                eprintln!(
                    "turned on threads, but binary was compiled without `multithreading` feature! scanning serially"
                );
            }
            1
        };

        let output: Box<dyn Write> = if let Some(path) = matches.get_one::<PathBuf>("output-target")
        {
            let file = Self::create_output_file(path, !matches.get_flag("no-confirm-overwrite"))
                .with_context(|| {
                    format!(
                        "An error occurred while creating output file at `{}`",
                        path.display()
                    )
                })?;
            Box::new(file)
        } else {
            Box::new(io::stdout())
        };

        Ok(DrvinfDump {
            settings: ParserSettings::new()
                .num_threads(num_threads)
                .list_pnp_ids(matches.get_flag("pnp-ids")),
            input,
            output_format,
            output: RefCell::new(output),
            verbosity_level: matches.get_count("verbose"),
        })
    }

    fn run(&self) -> Result<()> {
        self.try_to_initialize_logging();

        let report = DriverPack::from_path(&self.input)?
            .with_configuration(self.settings.clone())
            .scan()?;

        self.dump_report(&report)?;

        eprintln!("{} driver(s)", report.inf_count);
        Ok(())
    }

    fn dump_report(&self, report: &ScanReport) -> Result<()> {
        let mut output = self.output.borrow_mut();

        match self.output_format {
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *output, &report.records)?;
                writeln!(output)?;
            }
            OutputFormat::Jsonl => {
                for record in &report.records {
                    serde_json::to_writer(&mut *output, record)?;
                    writeln!(output)?;
                }
            }
        }

        Ok(())
    }

    /// If `prompt` is set, will display a confirmation prompt before
    /// overwriting files.
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
                    Err(e) => Err(anyhow!(e)
                        .context("Failed to write confirmation prompt to term")),
                }
            } else {
                Ok(File::create(p)?)
            }
        } else {
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
        let level = match self.verbosity_level {
            0 => return,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        if let Err(e) = simplelog::TermLogger::init(
            level,
            simplelog::Config::default(),
            simplelog::TerminalMode::Stderr,
            simplelog::ColorChoice::Auto,
        ) {
            eprintln!("Failed to initialize logging: {e}");
        }
    }
}

fn main() {
    let matches = Command::new("drvinf_dump")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Utility to inventory Windows driver package INF files")
        .arg(
            Arg::new("INPUT")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Root folder of the driver package(s)"),
        )
        .arg(
            Arg::new("num-threads")
                .short('t')
                .long("threads")
                .default_value("0")
                .value_parser(value_parser!(usize))
                .help("Sets the number of worker threads, defaults to number of CPU cores."),
        )
        .arg(
            Arg::new("output-format")
                .short('o')
                .long("format")
                .value_parser(["json", "jsonl"])
                .default_value("json")
                .help("Sets the output format")
                .long_help(
                    "Sets the output format:\n\
                     \"json\"  - prints a pretty JSON array.\n\
                     \"jsonl\" - prints one record per line.",
                ),
        )
        .arg(
            Arg::new("output-target")
                .short('f')
                .long("output")
                .value_parser(value_parser!(PathBuf))
                .help(
                    "Writes output to the file specified instead of stdout, errors will still be printed to stderr. \
                     Will ask for confirmation before overwriting files, to allow overwriting, pass `--no-confirm-overwrite`. \
                     Will create parent directories if needed.",
                ),
        )
        .arg(
            Arg::new("no-confirm-overwrite")
                .long("no-confirm-overwrite")
                .action(ArgAction::SetTrue)
                .help("When set, will not ask for confirmation before overwriting files, useful for automation"),
        )
        .arg(
            Arg::new("pnp-ids")
                .short('p')
                .long("pnp-ids")
                .action(ArgAction::SetTrue)
                .help("When set, each record lists the supported PNP hardware IDs (reports get large)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("-v - info, -vv - debug, -vvv - trace."),
        )
        .get_matches();

    let app = match DrvinfDump::from_cli_matches(&matches) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("{e:#}");
            exit(1);
        }
    };

    if let Err(e) = app.run() {
        eprintln!("{e:#}");
        exit(1);
    }
}
