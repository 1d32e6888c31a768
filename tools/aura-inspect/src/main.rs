//! Aura inspection tool.
//!
//! Runs the Aura codec over raw HTTP messages saved to files: detect Aura
//! traffic, print decoded actions, or apply action edits and write the
//! re-framed message.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use aura_codec::{
    ActionEdit, ActionsEditor, AuraConfig, ParsedResponse, RawHttpAdapter, SessionState,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Inspect and edit Aura traffic captured as raw HTTP messages
#[derive(Parser, Debug)]
#[command(name = "aura-inspect", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Session config file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Payload parameter name (overrides the config)
    #[arg(long, global = true)]
    param: Option<String>,

    /// Skip the endpoint path check
    #[arg(long, global = true)]
    no_endpoint: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report whether a message is Aura traffic
    Detect {
        /// Raw HTTP message file
        file: PathBuf,
        /// Treat the message as a response
        #[arg(long)]
        response: bool,
    },
    /// Print the decoded actions of a message
    Decode {
        /// Raw HTTP message file
        file: PathBuf,
        /// Treat the message as a response
        #[arg(long)]
        response: bool,
    },
    /// Apply action edits to a request and write the result
    Edit {
        /// Raw HTTP request file
        file: PathBuf,
        /// JSON array of edits: [{"id": "1;a", "params": "...", "controller": "...", "method": "..."}]
        #[arg(long)]
        edits: PathBuf,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(args: &Args) {
    let log_level = if args.debug { "debug" } else { &args.log_level };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "aura_codec={},aura_inspect={},warn",
            log_level, log_level
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<AuraConfig> {
    let mut config = match &args.config {
        Some(path) => AuraConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AuraConfig::default(),
    };
    if let Some(param) = &args.param {
        config = config.with_payload_param(param.clone());
    }
    Ok(config)
}

fn read_message(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn editor(args: &Args, config: AuraConfig) -> ActionsEditor<RawHttpAdapter> {
    ActionsEditor::new(RawHttpAdapter::new(), config).with_endpoint_context(!args.no_endpoint)
}

fn run(args: &Args, out: &mut dyn Write) -> Result<()> {
    let config = load_config(args)?;
    tracing::debug!("Using config {:?}", config);

    match &args.command {
        Command::Detect { file, response } => {
            let content = read_message(file)?;
            let verdict = editor(args, config).is_enabled(&content, !response);
            writeln!(out, "{}", if verdict { "aura" } else { "not aura" })?;
        }
        Command::Decode { file, response } => {
            let content = read_message(file)?;
            let mut session = editor(args, config);
            if !session.is_enabled(&content, !response) {
                bail!("{} is not Aura traffic", file.display());
            }
            session.set_message(&content, !response);
            print_state(session.state(), out)?;
        }
        Command::Edit {
            file,
            edits,
            output,
        } => {
            let content = read_message(file)?;
            let edits_text = fs::read_to_string(edits)
                .with_context(|| format!("Failed to read {}", edits.display()))?;
            let edits: Vec<ActionEdit> =
                serde_json::from_str(&edits_text).context("Failed to parse edits")?;

            let mut session = editor(args, config);
            if !session.is_enabled(&content, true) {
                bail!("{} is not an Aura request", file.display());
            }
            session.set_message(&content, true);
            if session.request().is_none() {
                bail!("{} has no decodable Aura payload", file.display());
            }

            let report = session.apply_edits(edits);
            for failure in &report.failures {
                eprintln!("warning: {}", failure);
            }
            tracing::info!("Changed actions: {:?}", report.changed);

            let rebuilt = session.get_message();
            if let Some(notice) = &rebuilt.notice {
                eprintln!("warning: {}", notice);
            }
            match output {
                Some(path) => fs::write(path, &rebuilt.message)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => out.write_all(&rebuilt.message)?,
            }
        }
    }
    Ok(())
}

fn print_state(state: &SessionState, out: &mut dyn Write) -> Result<()> {
    match state {
        SessionState::Empty => writeln!(out, "(no payload)")?,
        SessionState::Request(message) => {
            for action in message.actions() {
                writeln!(out, "== {}::{}", action.id(), action.method())?;
                writeln!(out, "controller: {}", action.controller())?;
                writeln!(out, "method: {}", action.method())?;
                writeln!(out, "descriptor: {}", action.descriptor())?;
                writeln!(out, "params:\n{}", action.params_pretty())?;
            }
        }
        SessionState::Undecodable { text, error } => {
            writeln!(out, "== Invalid JSON ({})", error)?;
            writeln!(out, "{}", text)?;
        }
        SessionState::Response(ParsedResponse::Message(message)) => {
            for action in message.actions() {
                writeln!(out, "== {} [{}]", action.id(), action.state().unwrap_or("-"))?;
                writeln!(out, "{}", action.to_pretty_string())?;
            }
        }
        SessionState::Response(ParsedResponse::RawFallback(raw)) => {
            writeln!(out, "== Invalid JSON")?;
            writeln!(out, "{}", raw.text)?;
            for action in &raw.salvaged {
                writeln!(out, "== {} (salvaged)", action.id())?;
                writeln!(out, "{}", action.to_pretty_string())?;
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run(&args, &mut out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aura_codec::wire::{url_decode, url_encode};
    use aura_codec::WireAdapter;

    const PAYLOAD: &str = r#"{"actions":[{"id":"5;a","descriptor":"apex://LeadController/ACTION$convert","callingDescriptor":"UNKNOWN","params":{"leadId":"00Q1"}}]}"#;

    fn request(path: &str) -> Vec<u8> {
        let body = format!("message={}&aura.token=t", url_encode(PAYLOAD));
        format!(
            "POST {} HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{}",
            path,
            body.len(),
            body
        )
        .into_bytes()
    }

    fn write_temp(dir: &tempfile::TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn run_args(argv: &[&str]) -> Result<String> {
        let args = Args::try_parse_from(argv)?;
        let mut out = Vec::new();
        run(&args, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let args =
            Args::try_parse_from(["aura-inspect", "decode", "req.txt", "--param", "x", "--debug"])
                .unwrap();
        assert_eq!(args.param.as_deref(), Some("x"));
        assert!(args.debug);
        assert!(matches!(args.command, Command::Decode { response: false, .. }));
    }

    #[test]
    fn detect_request() {
        let dir = tempfile::tempdir().unwrap();
        let aura = write_temp(&dir, "aura.txt", &request("/s/sfsites/aura"));
        let other = write_temp(&dir, "other.txt", &request("/api/lead"));

        let aura = aura.to_str().unwrap();
        let other = other.to_str().unwrap();
        assert_eq!(run_args(&["aura-inspect", "detect", aura]).unwrap(), "aura\n");
        assert_eq!(run_args(&["aura-inspect", "detect", other]).unwrap(), "not aura\n");
        assert_eq!(
            run_args(&["aura-inspect", "detect", other, "--no-endpoint"]).unwrap(),
            "aura\n"
        );
    }

    #[test]
    fn decode_request_lists_actions() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_temp(&dir, "req.txt", &request("/aura"));
        let out = run_args(&["aura-inspect", "decode", file.to_str().unwrap()]).unwrap();
        assert!(out.starts_with("== 5;a::convert\n"));
        assert!(out.contains("controller: LeadController\n"));
        assert!(out.contains("\"leadId\": \"00Q1\""));
    }

    #[test]
    fn decode_rejects_non_aura() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_temp(&dir, "req.txt", &request("/api/lead"));
        assert!(run_args(&["aura-inspect", "decode", file.to_str().unwrap()]).is_err());
    }

    #[test]
    fn decode_raw_response() {
        let dir = tempfile::tempdir().unwrap();
        let body = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\nwhile(1);\n{\"actions\":[],\"x\":function(){}}";
        let file = write_temp(&dir, "resp.txt", body.as_bytes());
        let out =
            run_args(&["aura-inspect", "decode", file.to_str().unwrap(), "--response"]).unwrap();
        assert!(out.starts_with("== Invalid JSON\nwhile(1);"));
    }

    #[test]
    fn edit_writes_patched_request() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_temp(&dir, "req.txt", &request("/aura"));
        let edits = write_temp(
            &dir,
            "edits.json",
            br#"[{"id":"5;a","method":"delete","params":"{\"leadId\": \"00Q2\"}"}]"#,
        );
        let output = dir.path().join("out.txt");

        run_args(&[
            "aura-inspect",
            "edit",
            file.to_str().unwrap(),
            "--edits",
            edits.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .unwrap();

        let written = fs::read(&output).unwrap();
        let param = RawHttpAdapter::new()
            .request_parameter(&written, "message")
            .unwrap();
        let payload = url_decode(&param.value);
        assert!(payload.contains("apex://LeadController/ACTION$delete"));
        assert!(payload.contains(r#""leadId":"00Q2""#));
    }

    #[test]
    fn missing_file_has_context() {
        let err = run_args(&["aura-inspect", "detect", "/nonexistent/req.txt"]).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
