use anyhow::{Context, Result, bail};
use spanmark_config::Config;
use spanmark_engine::anchoring::serializer::scope_root;
use spanmark_engine::{
    Document, EngineConfig, Restorer, SerializedSpan, Serializer, Span, SpanId, TreeAdapter,
    VolatileIdFilter, check_overlaps, find_matches,
};
use std::path::{Path, PathBuf};
use std::{env, process};

const DEFAULT_STORE: &str = "spans.json";

#[derive(Debug, PartialEq)]
enum Command {
    Save {
        document: PathBuf,
        text: String,
        kind: Option<String>,
    },
    Restore {
        document: PathBuf,
    },
    Overlaps {
        document: PathBuf,
        text: String,
    },
}

#[derive(Debug, PartialEq)]
struct Invocation {
    store: Option<PathBuf>,
    command: Command,
}

fn parse_args(args: &[String]) -> Option<Invocation> {
    let mut store = None;
    let mut rest = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--store" {
            store = Some(PathBuf::from(iter.next()?));
        } else {
            rest.push(arg.as_str());
        }
    }
    let command = match rest.as_slice() {
        ["save", document, text] => Command::Save {
            document: PathBuf::from(document),
            text: text.to_string(),
            kind: None,
        },
        ["save", document, text, kind] => Command::Save {
            document: PathBuf::from(document),
            text: text.to_string(),
            kind: Some(kind.to_string()),
        },
        ["restore", document] => Command::Restore {
            document: PathBuf::from(document),
        },
        ["overlaps", document, text] => Command::Overlaps {
            document: PathBuf::from(document),
            text: text.to_string(),
        },
        _ => return None,
    };
    Some(Invocation { store, command })
}

fn usage(program: &str) {
    eprintln!("Usage: {program} [--store <spans.json>] save <document.json> <text> [type]");
    eprintln!("       {program} [--store <spans.json>] restore <document.json>");
    eprintln!("       {program} [--store <spans.json>] overlaps <document.json> <text>");
}

fn load_document(path: &Path) -> Result<Document> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document {}", path.display()))?;
    Document::from_json(&json).with_context(|| format!("Failed to parse document {}", path.display()))
}

fn load_store(path: &Path) -> Result<Vec<SerializedSpan>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read span store {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse span store {}", path.display()))
}

fn save_store(path: &Path, spans: &[SerializedSpan]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(spans)?)?;
    Ok(())
}

/// First case-insensitive occurrence of `text` inside the configured scope
fn locate(doc: &Document, config: &EngineConfig, text: &str) -> Result<Span> {
    let scope = scope_root(doc, &config.anchor)?;
    match find_matches(doc, scope, text, &[]).into_iter().next() {
        Some(candidate) => Ok(candidate.span),
        None => bail!("Text {text:?} not found in document"),
    }
}

fn save(store: &Path, config: &EngineConfig, document: &Path, text: &str, kind: Option<String>) -> Result<SpanId> {
    let doc = load_document(document)?;
    let span = locate(&doc, config, text)?;
    let filter = VolatileIdFilter::from_config(&config.anchor)?;
    let serialized = Serializer::new(&config.anchor, &filter)
        .with_chain_depth(config.restore.fingerprint.parent_chain_depth)
        .try_serialize(&doc, &span, None, kind)?;
    let id = serialized.id.clone();

    let mut spans = load_store(store)?;
    spans.push(serialized);
    save_store(store, &spans)?;
    log::info!("Saved span {id} to {}", store.display());
    Ok(id)
}

fn restore(store: &Path, config: &EngineConfig, document: &Path) -> Result<Vec<String>> {
    let doc = load_document(document)?;
    let mut spans = load_store(store)?;
    let report = Restorer::new(config).restore_batch(&doc, &mut spans);
    log::info!(
        "Restored {} of {} spans",
        report.success_count(),
        report.success_count() + report.failure_count()
    );

    let mut lines = Vec::new();
    for (id, result) in &report.restored {
        let text = result
            .span
            .and_then(|span| doc.span_text(&span).ok())
            .unwrap_or_default();
        lines.push(format!("{id}\t{}\t{text}", result.layer_name()));
    }
    for failure in &report.failures {
        lines.push(format!("{}\tfailed\t{failure}", failure.span_id));
    }
    Ok(lines)
}

fn overlaps(store: &Path, config: &EngineConfig, document: &Path, text: &str) -> Result<Vec<String>> {
    let doc = load_document(document)?;
    let span = locate(&doc, config, text)?;
    let spans = load_store(store)?;
    let report = check_overlaps(&doc, &span, &spans, config);
    for failure in &report.errors {
        log::warn!("Could not resolve saved span {}", failure.span_id);
    }
    Ok(report
        .records
        .iter()
        .map(|record| {
            format!(
                "{}\t{:?}\t{}",
                record.selection_id, record.overlap_type, record.overlapped_text
            )
        })
        .collect())
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("spanmark-cli");
    let Some(invocation) = parse_args(args.get(1..).unwrap_or_default()) else {
        usage(program);
        process::exit(1);
    };

    let config = match Config::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            process::exit(1);
        }
    };
    let store = invocation
        .store
        .or(config.store_path)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE));
    let engine = config.engine;

    match invocation.command {
        Command::Save {
            document,
            text,
            kind,
        } => {
            let id = save(&store, &engine, &document, &text, kind)?;
            println!("{id}");
        }
        Command::Restore { document } => {
            for line in restore(&store, &engine, &document)? {
                println!("{line}");
            }
        }
        Command::Overlaps { document, text } => {
            for line in overlaps(&store, &engine, &document, &text)? {
                println!("{line}");
            }
        }
    }

    Ok(())
}
