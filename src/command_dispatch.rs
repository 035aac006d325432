//! Purpose: Hold top-level CLI command dispatch for `wtpack`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Helpers in `main.rs` remain the source of JSON envelopes and I/O.

use super::*;

pub(super) fn dispatch_command(command: Command) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "wtpack", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_version_output();
            Ok(RunOutcome::ok())
        }
        Command::Pack {
            format,
            args,
            args_file,
            output,
        } => {
            let args = match (args, args_file) {
                (Some(args), _) => parse_inline_json(&args)?,
                (None, Some(path)) => {
                    let bytes = read_file(&path)?;
                    let text = String::from_utf8(bytes).map_err(|err| {
                        Error::new(ErrorKind::Usage)
                            .with_message(format!("{} is not UTF-8 text", path.display()))
                            .with_source(err)
                    })?;
                    parse_inline_json(&text)?
                }
                (None, None) => Value::Array(Vec::new()),
            };
            let (packed, receipt) = pack_json(&format, &args)?;
            if let Some(path) = output {
                write_file(&path, &packed)?;
                tracing::debug!(path = %path.display(), len = packed.len(), "wrote packed bytes");
            }
            emit_json(receipt);
            Ok(RunOutcome::ok())
        }
        Command::Unpack { format, hex, input } => {
            let buf = match (hex, input) {
                (Some(hex), _) => decode_hex(&hex)?,
                (None, Some(path)) => read_file(&path)?,
                (None, None) => {
                    if io::stdin().is_terminal() {
                        return Err(Error::new(ErrorKind::Usage)
                            .with_message("unpack requires HEX, --input, or hex on stdin")
                            .with_hint("Example: wtpack unpack Q 81"));
                    }
                    decode_hex(&read_stdin_text()?)?
                }
            };
            emit_json(unpack_json(&format, &buf)?);
            Ok(RunOutcome::ok())
        }
        Command::Inspect { format, table } => {
            let value = match (format, table) {
                (_, Some(config)) => inspect_table_json(&config)?,
                (Some(format), None) => inspect_json(&format)?,
                (None, None) => {
                    return Err(Error::new(ErrorKind::Usage)
                        .with_message("inspect requires FORMAT or --table")
                        .with_hint("Try `wtpack inspect --help`."));
                }
            };
            emit_json(value);
            Ok(RunOutcome::ok())
        }
    }
}
