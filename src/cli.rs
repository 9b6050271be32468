//! Minimal CLI: schema + JSON payloads → (decoded records | schema check)
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::Value;

use softboiled::{Collector, Decoder, LogSink, Record, Registry, Schema, Shape, Warning};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// leniently decode JSON payloads into declared record shapes
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    /// log at debug level (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// decode inputs against a record shape and print the records as JSON
    Decode(DecodeOut),
    /// list the shapes of a schema and any record references that do not resolve
    Check(CheckOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/users)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document.
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct DecodeOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// schema document declaring the record shapes
    #[arg(long, short)]
    schema: PathBuf,

    /// record shape to decode each document into
    #[arg(long, short)]
    record: String,

    /// decode each element of an array document separately
    #[arg(long)]
    each: bool,

    /// print per-document warning counts to stderr
    #[arg(long)]
    summary: bool,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct CheckOut {
    /// schema document declaring the record shapes
    #[arg(long, short)]
    schema: PathBuf,
}

/// One document to decode, labelled for the summary.
struct Document {
    label: String,
    value: Value,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_process(&self, mut apply: impl FnMut(String, Value)) -> Result<()> {
        let source_paths = resolve_file_path_patterns(&self.input)?;
        for source_path in source_paths {
            let source_path_str = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file {source_path_str}"))?;

            let documents = if self.ndjson {
                source
                    .lines()
                    .enumerate()
                    .filter(|(_, line)| !line.trim().is_empty())
                    .map(|(i, line)| {
                        serde_json::from_str::<Value>(line)
                            .map(|value| (format!("{source_path_str}:{}", i + 1), value))
                            .with_context(|| format!("failed to parse JSON line {} of {source_path_str}", i + 1))
                    })
                    .collect::<Result<Vec<_>>>()?
            } else {
                let value = serde_json::from_str::<Value>(&source)
                    .with_context(|| format!("failed to parse JSON source file ({source_path_str})"))?;
                vec![(source_path_str.clone(), value)]
            };

            for (label, value) in documents {
                let value = match self.json_pointer.as_deref() {
                    None => value,
                    Some(pointer) => value
                        .pointer(pointer)
                        .cloned()
                        .ok_or_else(|| anyhow!("JSON pointer {pointer} selects nothing in {label}"))?,
                };
                match self.jq_expr.as_ref() {
                    None => apply(label, value),
                    Some(jq_expr) => {
                        let outputs = crate::jq_exec::run_jaq(jq_expr, &value)
                            .with_context(|| format!("failed to apply jq expression to {label}"))?;
                        for value in outputs {
                            apply(label.clone(), value);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn init_logging(&self) {
        let default_filter = if self.verbose { "debug" } else { "warn" };
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
            .format_timestamp_millis()
            .try_init();
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Decode(target) => target.run(),
            Command::Check(target) => target.run(),
        }
    }
}

impl DecodeOut {
    fn run(&self) -> Result<()> {
        let registry = Registry::global();
        Schema::from_path(&self.schema)?.declare_into(registry);
        let shape = registry.resolve(&self.record).ok_or_else(|| {
            anyhow!("record '{}' is not declared in {}", self.record, self.schema.display())
        })?;

        let mut documents = Vec::new();
        self.input_settings.load_process(|label, value| match value {
            Value::Array(items) if self.each => {
                documents.extend(items.into_iter().enumerate().map(|(i, value)| Document {
                    label: format!("{label}[{i}]"),
                    value,
                }));
            }
            value => documents.push(Document { label, value }),
        })?;

        // the registry is read-only from here on
        let decoded: Vec<(String, Record, Vec<Warning>)> = documents
            .par_iter()
            .map(|doc| decode_one(registry, &shape, doc))
            .collect();

        if self.summary {
            for (label, _, warnings) in &decoded {
                print_summary(label, warnings);
            }
        }

        let records: Vec<&Record> = decoded.iter().map(|(_, record, _)| record).collect();
        let rendered = serde_json::to_string_pretty(&records)?;
        write_output(self.out.as_deref(), &rendered)
    }
}

impl CheckOut {
    fn run(&self) -> Result<()> {
        let registry = Registry::new();
        let shapes = Schema::from_path(&self.schema)?.declare_into(&registry);
        for shape in &shapes {
            println!("{}", describe(shape));
        }

        let unresolved = registry.unresolved();
        for dangling in &unresolved {
            eprintln!("{} {dangling}", "unresolved".red().bold());
        }
        if !unresolved.is_empty() {
            bail!("{} unresolved record reference(s) in {}", unresolved.len(), self.schema.display());
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn decode_one(registry: &Registry, shape: &Arc<Shape>, doc: &Document) -> (String, Record, Vec<Warning>) {
    let decoder = Decoder::with_sink(registry, (LogSink, Collector::new()));
    let record = decoder.decode_value(shape, &doc.value);
    let (_, collector) = decoder.into_sink();
    (doc.label.clone(), record, collector.into_warnings())
}

fn print_summary(label: &str, warnings: &[Warning]) {
    if warnings.is_empty() {
        eprintln!("{} {label}", "ok".green());
        return;
    }
    let fields: Vec<String> = warnings.iter().map(|w| format!("{}.{}", w.record, w.field)).collect();
    eprintln!(
        "{} {label}: {} missing required field(s): {}",
        "warn".yellow(),
        warnings.len(),
        fields.join(", ")
    );
}

fn describe(shape: &Shape) -> String {
    let mut out = format!("{}", shape.name().bold());
    for field in shape.fields() {
        let marker = if field.is_required() { "*" } else { " " };
        out.push_str(&format!("\n  {marker} {}: {}", field.name(), field.ty()));
        if let Some(default) = field.default() {
            out.push_str(&format!(" = {default}"));
        }
    }
    out
}

fn write_output(out: Option<&Path>, rendered: &str) -> Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, rendered).with_context(|| format!("failed to write {}", out.display()))
        }
        None => {
            println!("{rendered}");
            Ok(())
        }
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
