use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::io::{self, Read, Write};
use std::path::PathBuf;

mod cmd;
mod settings;
mod utils;
mod wheel;

use cmd::{Dispatcher, MinionArg};
use wheel::{LazySaltApiClient, WheelClient};

/// modify-keys - add or delete minion keys on a salt-master
///
/// Runs as (or on behalf of) the salt-master user and talks to salt-api's
/// wheel client. Every invocation prints one JSON line per operation.
///
/// Usage:
///   modify-keys -a web-1                 generate + accept one key  -> [<result>]
///   modify-keys -a web-1 web-2           one call per minion        -> [<r1>, <r2>]
///   modify-keys -d web-1                 async key.delete by match  -> <job>
///   modify-keys -d web-1 web-2           async key.delete_dict      -> <job>
///   modify-keys -r request.json          run a lowstate request (or list)
///   echo '{"fun":"delete","arg":"web-1"}' | modify-keys -r -
///
/// Delete only submits the job: the printed tag/jid acknowledges submission,
/// not completion.
///
/// Config / env:
///   -c / --config        YAML settings (default /etc/salt/modify_keys.yml)
///   SALT_API_URL, SALT_API_TOKEN, SALT_API_VERIFY_TLS override the file
///   -v / -vv, -q         log verbosity (stderr); RUST_LOG overrides
#[derive(Parser, Debug)]
#[command(
    name = "modify-keys",
    version,
    about = "Add or delete minion keys on a salt-master via the wheel API"
)]
pub struct Cli {
    /// Generate keys and add provided minion(s) to the accepted keychain
    #[arg(short = 'a', long = "add", value_name = "MINION", num_args = 0..)]
    add: Option<Vec<String>>,

    /// Delete provided minion(s) from the accepted keychain
    #[arg(short = 'd', long = "delete", value_name = "MINION", num_args = 0..)]
    delete: Option<Vec<String>>,

    /// Run a JSON RPC request (gen_accept / delete) from FILE, or stdin with '-'
    #[arg(short = 'r', long = "request", value_name = "FILE")]
    request: Option<String>,

    /// Settings file (YAML)
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Errors only
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn has_action(&self) -> bool {
        self.add.is_some() || self.delete.is_some() || self.request.is_some()
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = utils::derive_level(cli.verbose, cli.quiet);
    utils::init_logging(level);

    // Settings and the salt-api connection are resolved on the first backend call.
    let dispatcher = Dispatcher::new(LazySaltApiClient::new(cli.config.clone()));
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run(&cli, &dispatcher, &mut out)
}

/// No action prints help. Otherwise add runs before delete, then any RPC
/// request; each writes its own line.
fn run<C: WheelClient>(cli: &Cli, dispatcher: &Dispatcher<C>, out: &mut impl Write) -> Result<()> {
    if !cli.has_action() {
        return write_help(out);
    }

    if let Some(values) = &cli.add {
        let minion = MinionArg::from_values(values.iter().cloned()).context("Invalid --add value")?;
        dispatcher.emit_gen_accept(minion.as_ref(), out)?;
    }

    if let Some(values) = &cli.delete {
        let minion =
            MinionArg::from_values(values.iter().cloned()).context("Invalid --delete value")?;
        dispatcher.emit_delete(minion.as_ref(), out)?;
    }

    if let Some(source) = &cli.request {
        let input = read_request(source)?;
        cmd::execute_request(dispatcher, &input, out)?;
    }

    Ok(())
}

fn write_help(out: &mut impl Write) -> Result<()> {
    Cli::command()
        .write_help(out)
        .context("Failed to write help")?;
    out.flush().context("Failed to flush output")
}

fn read_request(source: &str) -> Result<String> {
    if source == "-" {
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .context("Failed to read request from stdin")?;
        return Ok(input);
    }
    std::fs::read_to_string(source).with_context(|| format!("Failed to read request file: {source}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::dispatch::tests::{Call, RecordingClient};

    fn run_cli(argv: &[&str]) -> (Vec<Call>, String) {
        let cli = Cli::try_parse_from(argv).unwrap();
        let client = RecordingClient::default();
        let d = Dispatcher::new(&client);
        let mut out = Vec::new();
        run(&cli, &d, &mut out).unwrap();
        (client.calls.take(), String::from_utf8(out).unwrap())
    }

    #[test]
    fn no_flags_prints_help() {
        let (calls, out) = run_cli(&["modify-keys"]);
        assert!(calls.is_empty());
        assert!(out.contains("--add"), "help text expected, got: {out}");
        assert!(out.contains("--delete"));

        let (_, out) = run_cli(&["modify-keys", "-v"]);
        assert!(out.contains("Usage"));
    }

    fn run_without_token(argv: &[&str]) -> Result<String> {
        let cli = Cli::try_parse_from(argv).unwrap();
        let client = LazySaltApiClient::with_settings(settings::Settings::default());
        let d = Dispatcher::new(client);
        let mut out = Vec::new();
        run(&cli, &d, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn absent_minion_needs_no_token() {
        assert_eq!(run_without_token(&["modify-keys", "-a"]).unwrap(), "[]\n");
        assert_eq!(run_without_token(&["modify-keys", "-d"]).unwrap(), "{}\n");

        let path = std::env::temp_dir().join("modify_keys_absent_request.json");
        std::fs::write(&path, r#"{"fun":"gen_accept"}"#).unwrap();
        assert_eq!(
            run_without_token(&["modify-keys", "-r", path.to_str().unwrap()]).unwrap(),
            "[]\n"
        );
    }

    #[test]
    fn backend_call_without_token_fails() {
        let err = run_without_token(&["modify-keys", "-a", "node-1"]).unwrap_err();
        assert!(
            format!("{err:#}").contains("no eauth token"),
            "unexpected error: {err:#}"
        );
    }

    #[test]
    fn add_binds_flag_values() {
        let (calls, out) = run_cli(&["modify-keys", "-a", "node-1"]);
        assert_eq!(calls, vec![Call::GenAccept(vec!["node-1".into()])]);
        assert_eq!(out.lines().count(), 1);

        let (calls, _) = run_cli(&["modify-keys", "--add", "node-1", "node-2"]);
        assert_eq!(calls.len(), 2);
    }

    #[test]
    fn delete_binds_flag_values() {
        let (calls, out) = run_cli(&["modify-keys", "-d", "node-1"]);
        assert_eq!(calls, vec![Call::DeleteByMatch("node-1".into())]);
        assert_eq!(out.trim(), r#"{"jid":"1","tag":"salt/wheel/1"}"#);

        let (calls, _) = run_cli(&["modify-keys", "-d", "node-1", "node-2"]);
        assert_eq!(calls, vec![Call::DeleteBySet(vec!["node-1".into(), "node-2".into()])]);
    }

    #[test]
    fn add_then_delete() {
        let (calls, out) = run_cli(&["modify-keys", "-a", "x", "-d", "y"]);
        assert_eq!(
            calls,
            vec![Call::GenAccept(vec!["x".into()]), Call::DeleteByMatch("y".into())]
        );
        assert_eq!(out.lines().count(), 2);
    }

    #[test]
    fn empty_flag_is_absent() {
        let (calls, out) = run_cli(&["modify-keys", "-a"]);
        assert!(calls.is_empty());
        assert_eq!(out, "[]\n");

        let (calls, out) = run_cli(&["modify-keys", "-d"]);
        assert!(calls.is_empty());
        assert_eq!(out, "{}\n");
    }

    #[test]
    fn request_file() {
        let path = std::env::temp_dir().join("modify_keys_request_test.json");
        std::fs::write(&path, r#"{"fun":"modify_keys.gen_accept","arg":"t1"}"#).unwrap();
        let (calls, _) = run_cli(&["modify-keys", "-r", path.to_str().unwrap()]);
        assert_eq!(calls, vec![Call::GenAccept(vec!["t1".into()])]);
    }

    #[test]
    fn blank_minion_rejected() {
        let cli = Cli::try_parse_from(["modify-keys", "-a", ""]).unwrap();
        let client = RecordingClient::default();
        let d = Dispatcher::new(&client);
        let mut out = Vec::new();
        assert!(run(&cli, &d, &mut out).is_err());
        assert!(client.calls.borrow().is_empty());
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
