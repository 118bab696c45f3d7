use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use npipe_transport::PipeName;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ResolvedOutput<'a> {
    short_name: &'a str,
    visibility: String,
    path: String,
}

pub fn print_resolved(name: &PipeName, format: OutputFormat) {
    let path = name.path().display().to_string();
    match format {
        OutputFormat::Json => {
            let out = ResolvedOutput {
                short_name: name.short_name(),
                visibility: name.visibility().to_string(),
                path,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["NAME", "VISIBILITY", "PATH"])
                .add_row(vec![
                    name.short_name().to_string(),
                    name.visibility().to_string(),
                    path,
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{} ({}) -> {path}", name.short_name(), name.visibility());
        }
        OutputFormat::Raw => println!("{path}"),
    }
}

/// Where a received message came from.
pub struct MessageMeta<'a> {
    pub pipe: &'a PipeName,
    pub connection: usize,
    pub sequence: usize,
    pub peer_pid: Option<u32>,
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    pipe: &'a str,
    connection: usize,
    sequence: usize,
    peer_pid: Option<u32>,
    size: usize,
    payload: String,
    timestamp: String,
}

pub fn print_message(payload: &[u8], meta: &MessageMeta<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                pipe: meta.pipe.short_name(),
                connection: meta.connection,
                sequence: meta.sequence,
                peer_pid: meta.peer_pid,
                size: payload.len(),
                payload: payload_preview(payload),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PIPE", "CONN", "SEQ", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    meta.pipe.short_name().to_string(),
                    meta.connection.to_string(),
                    meta.sequence.to_string(),
                    payload.len().to_string(),
                    payload_preview(payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "pipe={} conn={} seq={} size={} peer_pid={} payload={}",
                meta.pipe.short_name(),
                meta.connection,
                meta.sequence,
                payload.len(),
                meta.peer_pid
                    .map_or_else(|| "-".to_string(), |pid| pid.to_string()),
                payload_preview(payload)
            );
        }
        OutputFormat::Raw => print_raw(payload),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_keeps_text_and_summarizes_binary() {
        assert_eq!(payload_preview(b"hi"), "hi");
        assert_eq!(payload_preview(&[0xff, 0xfe]), "<binary 2 bytes>");
    }
}
