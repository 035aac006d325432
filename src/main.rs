//! Purpose: `wtpack` CLI entry point.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Commands emit one JSON document on stdout per successful run.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: All packing goes through `wtpack::api`; this crate only does I/O and JSON.
use std::error::Error as StdError;
use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use clap::{
    CommandFactory, Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;
use wtpack::api::{Error, ErrorKind, TableFormat, pack, to_exit_code, unpack};

mod command_dispatch;
mod value_json;

use value_json::{decode_hex, encode_hex, fields_json, values_from_json, values_json};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint(clap_error_hint(&err)));
            }
        },
    };

    init_tracing(cli.verbose);
    command_dispatch::dispatch_command(cli.command)
}

#[derive(Parser)]
#[command(
    name = "wtpack",
    version,
    about = "Order-preserving struct packing for WiredTiger-style keys and values",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"A format string describes a record field by field; packed bytes of
integer fields sort the same way as the integers they encode.

Common formats:
  q, Q     signed / unsigned varints
  S        NUL-terminated string
  u        length-prefixed bytes (raw remainder when last)
  r        record number
"#,
    after_help = r#"EXAMPLES
  $ wtpack pack Sq '["user", -1]'
  $ wtpack unpack Sq 75736572007f
  $ wtpack inspect 3sQu
  $ wtpack inspect --table 'key_format=r,value_format=SS'

LEARN MORE
  $ wtpack <command> --help"#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Raise log verbosity on stderr (-v debug, -vv trace); RUST_LOG overrides"
    )]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Pack JSON arguments into bytes",
        long_about = r#"Pack a JSON array of arguments according to FORMAT.

Integers go to integer fields, strings to `s`/`S` fields. Byte fields (`u`, `U`)
take either a UTF-8 string or an array of numbers 0..=255."#,
        after_help = r#"EXAMPLES
  $ wtpack pack iSu '[7, "name", [1, 2, 3]]'
  $ wtpack pack Q --args-file args.json --output key.bin"#
    )]
    Pack {
        #[arg(help = "Format descriptor")]
        format: String,
        #[arg(help = "JSON array of arguments", conflicts_with = "args_file")]
        args: Option<String>,
        #[arg(
            long,
            help = "Read the JSON argument array from a file",
            value_hint = ValueHint::FilePath
        )]
        args_file: Option<PathBuf>,
        #[arg(
            long,
            short = 'o',
            help = "Also write the packed bytes to a file",
            value_hint = ValueHint::FilePath
        )]
        output: Option<PathBuf>,
    },
    #[command(
        about = "Unpack bytes into JSON values",
        long_about = r#"Unpack bytes according to FORMAT.

Bytes come from the HEX argument, a raw file via --input, or hex on stdin."#,
        after_help = r#"EXAMPLES
  $ wtpack unpack Sq 75736572007f
  $ wtpack unpack Q --input key.bin"#
    )]
    Unpack {
        #[arg(help = "Format descriptor")]
        format: String,
        #[arg(help = "Packed bytes as hex", conflicts_with = "input")]
        hex: Option<String>,
        #[arg(
            long,
            short = 'i',
            help = "Read raw packed bytes from a file",
            value_hint = ValueHint::FilePath
        )]
        input: Option<PathBuf>,
    },
    #[command(
        about = "Show the fields a format describes",
        after_help = r#"EXAMPLES
  $ wtpack inspect 3sQu
  $ wtpack inspect --table 'key_format=S,value_format=Su'"#
    )]
    Inspect {
        #[arg(
            help = "Format descriptor",
            required_unless_present = "table",
            conflicts_with = "table"
        )]
        format: Option<String>,
        #[arg(long, help = "Table config string with key_format/value_format")]
        table: Option<String>,
    },
    #[command(about = "Print version info as JSON")]
    Version,
    #[command(
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ wtpack completion bash > ~/.local/share/bash-completion/completions/wtpack
  $ wtpack completion zsh > ~/.zfunc/_wtpack
  $ wtpack completion fish > ~/.config/fish/completions/wtpack.fish"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn pack_json(format: &str, args: &Value) -> Result<(Vec<u8>, Value), Error> {
    let values = values_from_json(format, args)?;
    let packed = pack(format, &values)?;
    let receipt = json!({
        "format": format,
        "len": packed.len(),
        "hex": encode_hex(&packed),
    });
    Ok((packed, receipt))
}

fn unpack_json(format: &str, buf: &[u8]) -> Result<Value, Error> {
    let values = unpack(format, buf)?;
    Ok(json!({
        "format": format,
        "values": values_json(&values)?,
    }))
}

fn inspect_json(format: &str) -> Result<Value, Error> {
    Ok(json!({
        "format": format,
        "fields": fields_json(format)?,
    }))
}

fn inspect_table_json(config: &str) -> Result<Value, Error> {
    let table = TableFormat::parse(config)?;
    Ok(json!({
        "key_format": table.key_format(),
        "value_format": table.value_format(),
        "record_keyed": table.is_record_keyed(),
        "key_fields": fields_json(table.key_format())?,
        "value_fields": fields_json(table.value_format())?,
    }))
}

fn parse_inline_json(data: &str) -> Result<Value, Error> {
    serde_json::from_str(data).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid JSON arguments")
            .with_hint("Arguments must be a JSON array, for example '[1, \"a\"]'.")
            .with_source(err)
    })
}

fn read_file(path: &Path) -> Result<Vec<u8>, Error> {
    fs::read(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message(format!("failed to read {}", path.display()))
            .with_source(err)
    })
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    fs::write(path, bytes).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message(format!("failed to write {}", path.display()))
            .with_source(err)
    })
}

fn read_stdin_text() -> Result<String, Error> {
    let mut text = String::new();
    io::stdin().read_to_string(&mut text).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read stdin")
            .with_source(err)
    })?;
    Ok(text)
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_version_output() {
    emit_json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }));
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }

    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::InvalidFormat => "invalid format".to_string(),
        ErrorKind::TypeMismatch => "argument type does not match format".to_string(),
        ErrorKind::ArgumentCountMismatch => "too few arguments for format".to_string(),
        ErrorKind::TruncatedInput => "input ended early".to_string(),
        ErrorKind::InvalidArgument => "invalid argument".to_string(),
        ErrorKind::Corrupt => "corrupt data".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(offset) = err.offset() {
        inner.insert("offset".to_string(), json!(offset));
    }
    if let Some(field) = err.field() {
        inner.insert("field".to_string(), json!(field));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(field) = err.field() {
        lines.push(format!("field: {field}"));
    }
    if let Some(offset) = err.offset() {
        lines.push(format!("offset: {offset}"));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);

    let Some(usage) = usage else {
        return "Try `wtpack --help`.".to_string();
    };

    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "wtpack") else {
        return "Try `wtpack --help`.".to_string();
    };

    let parts: Vec<&str> = tokens
        .iter()
        .skip(pos + 1)
        .take_while(|token| {
            !(token.starts_with('-') || token.starts_with('<') || token.starts_with('['))
        })
        .copied()
        .collect();

    if parts.is_empty() {
        return "Try `wtpack --help`.".to_string();
    }
    format!("Try `wtpack {} --help`.", parts.join(" "))
}
