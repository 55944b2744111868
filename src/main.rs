use std::collections::BTreeSet;
use std::env;
use std::fmt::Write as FmtWrite;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use mapress_core::orchestrator::{Adapters, ProgressEvent, StreamRequest};
use mapress_core::config::max_nodes_from_env;
use mapress_core::url_utils::source_domain;
use mapress_core::{
    MapExport, MapressConfig, MindMap, NodePayload, export_filename, outline_to_graph,
    parse_outline, prune_outline,
};
use tokio::sync::mpsc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const APP_NAME: &str = "mapress";
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq)]
enum OutputMode {
    Json,
    Mermaid,
    Summary,
    Export,
}

impl OutputMode {
    fn extension(self) -> &'static str {
        match self {
            OutputMode::Json | OutputMode::Export => "json",
            OutputMode::Mermaid | OutputMode::Summary => "md",
        }
    }
}

#[derive(Debug, PartialEq)]
enum Input {
    /// Outline file path, or `-` for stdin.
    Outline(String),
    Query { query: String, mock: bool },
}

#[derive(Debug)]
struct CliOptions {
    input: Input,
    mode: OutputMode,
    max_nodes: Option<usize>,
    save_target: Option<PathBuf>,
}

#[derive(Debug)]
enum CliCommand {
    Run(CliOptions),
    Help,
    Version,
}

fn parse_arguments(args: &[String]) -> Result<CliCommand> {
    if args.is_empty() {
        return Ok(CliCommand::Help);
    }

    let mut path: Option<String> = None;
    let mut query: Option<String> = None;
    let mut mock = false;
    let mut mode = OutputMode::Json;
    let mut max_nodes: Option<usize> = None;
    let mut save_target: Option<PathBuf> = None;
    let mut i = 0;

    while i < args.len() {
        let arg = &args[i];

        if matches!(arg.as_str(), "-h" | "--help") {
            return Ok(CliCommand::Help);
        }

        if matches!(arg.as_str(), "-v" | "--version") {
            return Ok(CliCommand::Version);
        }

        let selected = match arg.as_str() {
            "-m" | "--mermaid" => Some(OutputMode::Mermaid),
            "-S" | "--summary" => Some(OutputMode::Summary),
            "-e" | "--export" => Some(OutputMode::Export),
            _ => None,
        };
        if let Some(selected) = selected {
            if mode != OutputMode::Json {
                return Err(anyhow!("conflicting output options supplied"));
            }
            mode = selected;
            i += 1;
            continue;
        }

        if arg == "--mock" {
            mock = true;
            i += 1;
            continue;
        }

        if matches!(arg.as_str(), "-q" | "--query") {
            if query.is_some() {
                return Err(anyhow!("--query specified multiple times"));
            }
            let value = args
                .get(i + 1)
                .ok_or_else(|| anyhow!("--query requires a value"))?;
            query = Some(value.clone());
            i += 2;
            continue;
        }

        if let Some(value) = arg.strip_prefix("--max-nodes=") {
            max_nodes = Some(parse_max_nodes(value)?);
            i += 1;
            continue;
        }

        if matches!(arg.as_str(), "-n" | "--max-nodes") {
            let value = args
                .get(i + 1)
                .ok_or_else(|| anyhow!("--max-nodes requires a value"))?;
            max_nodes = Some(parse_max_nodes(value)?);
            i += 2;
            continue;
        }

        if let Some(value) = arg
            .strip_prefix("--save=")
            .or_else(|| arg.strip_prefix("-s="))
        {
            if save_target.is_some() {
                return Err(anyhow!("--save specified multiple times"));
            }
            save_target = Some(if value.is_empty() {
                PathBuf::from(".")
            } else {
                PathBuf::from(value)
            });
            i += 1;
            continue;
        }

        if matches!(arg.as_str(), "-s" | "--save") {
            if save_target.is_some() {
                return Err(anyhow!("--save specified multiple times"));
            }
            let next_is_path = (path.is_some() || query.is_some())
                && args
                    .get(i + 1)
                    .map(|next| !next.starts_with('-'))
                    .unwrap_or(false);

            if next_is_path {
                save_target = Some(PathBuf::from(args[i + 1].clone()));
                i += 2;
            } else {
                save_target = Some(PathBuf::from("."));
                i += 1;
            }

            continue;
        }

        if arg.starts_with('-') && arg != "-" {
            return Err(anyhow!("unknown flag: {arg}"));
        }

        if path.is_none() {
            path = Some(arg.clone());
        } else {
            return Err(anyhow!("unexpected additional argument: {}", arg));
        }

        i += 1;
    }

    let input = match (path, query) {
        (Some(_), Some(_)) => {
            return Err(anyhow!("an outline file and --query cannot be combined"));
        }
        (None, Some(query)) => Input::Query { query, mock },
        (Some(_), None) if mock => return Err(anyhow!("--mock requires --query")),
        (Some(path), None) => Input::Outline(path),
        (None, None) => return Err(anyhow!("missing <OUTLINE.json> argument")),
    };

    Ok(CliCommand::Run(CliOptions {
        input,
        mode,
        max_nodes,
        save_target,
    }))
}

fn parse_max_nodes(value: &str) -> Result<usize> {
    value
        .parse()
        .with_context(|| format!("invalid --max-nodes value {value:?}"))
}

fn print_help() {
    println!("{APP_NAME} - news outlines as citation-backed mind maps");
    println!("Usage: {APP_NAME} [OPTIONS] <OUTLINE.json | ->");
    println!("       {APP_NAME} [OPTIONS] --query <TEXT> [--mock]\n");
    println!("Options:");
    println!("  -m, --mermaid           Output a Mermaid flowchart");
    println!("  -S, --summary           Output a readable outline summary");
    println!("  -e, --export            Output the export document (nodes, edges, version)");
    println!("  -n, --max-nodes N       Node budget for pruning (default 16)");
    println!("  -q, --query TEXT        Run search, fetch and clustering for TEXT");
    println!("      --mock              Use bundled sample sources instead of live services");
    println!("  -s, --save [PATH]       Also write the output to a file");
    println!("  -v, --version           Show version information");
    println!("  -h, --help              Show this help message");
}

fn print_version() {
    println!("{APP_NAME} {VERSION}");
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let raw_args = env::args().skip(1).collect::<Vec<_>>();
    let options = match parse_arguments(&raw_args)? {
        CliCommand::Run(options) => options,
        CliCommand::Help => {
            print_help();
            return Ok(());
        }
        CliCommand::Version => {
            print_version();
            return Ok(());
        }
    };

    let (title, graph) = match &options.input {
        Input::Outline(path) => {
            let max_nodes = match options.max_nodes {
                Some(max_nodes) => max_nodes,
                None => max_nodes_from_env()?,
            };
            let raw = read_input(path)?;
            let outline =
                parse_outline(&raw).with_context(|| format!("rejected outline {path}"))?;
            let pruned = prune_outline(&outline, max_nodes);
            debug!(
                before = outline.node_count(),
                after = pruned.node_count(),
                "pruned outline"
            );
            (outline.query.clone(), outline_to_graph(&pruned))
        }
        Input::Query { query, mock } => {
            let config = MapressConfig::from_env()?;
            let max_nodes = options.max_nodes.unwrap_or(config.max_nodes);
            let graph = run_query(query, *mock, max_nodes, &config).await?;
            (query.clone(), graph)
        }
    };

    let output = match options.mode {
        OutputMode::Json => serde_json::to_string_pretty(&graph)?,
        OutputMode::Mermaid => graph_to_mermaid(&graph),
        OutputMode::Summary => render_summary(&title, &graph),
        OutputMode::Export => serde_json::to_string_pretty(&MapExport::new(graph, Utc::now()))?,
    };

    println!("{}", output.trim_end());

    if let Some(save_base) = options.save_target {
        let output_path = build_output_path(&save_base, options.mode.extension());
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create output directory {}", parent.display())
            })?;
        }

        fs::write(&output_path, output.as_bytes())
            .with_context(|| format!("failed to write output file {}", output_path.display()))?;

        eprintln!("Wrote output to {}", output_path.display());
    }

    Ok(())
}

fn read_input(path: &str) -> Result<String> {
    if path == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read outline from stdin")?;
        return Ok(raw);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {path}"))
}

async fn run_query(
    query: &str,
    mock: bool,
    max_nodes: usize,
    config: &MapressConfig,
) -> Result<MindMap> {
    let adapters = if mock {
        Adapters::mock()
    } else {
        Adapters::live(config)?
    };
    let pipeline = adapters.pipeline(config);

    let mut request = StreamRequest::new(query);
    request.max_nodes = Some(max_nodes);
    request.mock = mock;

    let (tx, mut rx) = mpsc::channel(16);
    let progress = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            report_progress(&event);
        }
    });

    let result = pipeline.run(&request, &tx).await;
    drop(tx);
    let _ = progress.await;

    Ok(result?)
}

fn report_progress(event: &ProgressEvent) {
    match event {
        ProgressEvent::Status { step } => eprintln!("→ {step:?}"),
        ProgressEvent::Sources { urls } => eprintln!("  {} sources", urls.len()),
        ProgressEvent::PartialOutline { categories } => {
            let titles = categories
                .iter()
                .map(|c| c.title.as_str())
                .collect::<Vec<_>>();
            eprintln!("  categories: {}", titles.join(", "));
        }
        ProgressEvent::Graph { nodes, edges } => {
            eprintln!("  {} nodes, {} edges", nodes.len(), edges.len())
        }
        ProgressEvent::Error { message } => eprintln!("✗ {message}"),
    }
}

const DIVIDER: &str = "─────────────────────────────────────────────────────────────";
const LABEL_WIDTH: usize = 16;

fn push_section_header(buf: &mut String, icon: &str, title: &str) {
    let _ = writeln!(buf, "{DIVIDER}");
    let _ = writeln!(buf, "{icon} {title}");
    let _ = writeln!(buf, "{DIVIDER}");
}

fn push_key_value(buf: &mut String, label: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    let _ = writeln!(buf, "• {:<width$} : {}", label, value, width = LABEL_WIDTH);
}

/// Category sections with their facts, bullets and source domains.
fn render_summary(title: &str, graph: &MindMap) -> String {
    let mut buf = String::new();
    let categories = graph.nodes.iter().filter(|n| n.is_category()).count();
    let domains = graph
        .nodes
        .iter()
        .flat_map(|n| n.sources())
        .map(|s| source_domain(&s.url))
        .collect::<BTreeSet<_>>();

    let heading = if title.trim().is_empty() {
        "Mind Map"
    } else {
        title
    };
    push_section_header(&mut buf, "🗺️", heading);
    push_key_value(&mut buf, "Categories", &categories.to_string());
    push_key_value(
        &mut buf,
        "Facts",
        &(graph.nodes.len() - categories).to_string(),
    );
    push_key_value(&mut buf, "Source Domains", &domains.len().to_string());
    let _ = writeln!(&mut buf);

    for node in &graph.nodes {
        match &node.payload {
            NodePayload::Category(data) => {
                push_section_header(&mut buf, "🗂️", &data.title);
            }
            NodePayload::Fact(data) => {
                let _ = writeln!(&mut buf, "• {}", data.title);
                for bullet in &data.bullets {
                    let _ = writeln!(&mut buf, "    - {bullet}");
                }
                let cited = data
                    .sources
                    .iter()
                    .map(|s| source_domain(&s.url))
                    .collect::<BTreeSet<_>>();
                if !cited.is_empty() {
                    let list = cited.into_iter().collect::<Vec<_>>().join(", ");
                    let _ = writeln!(&mut buf, "    ↳ {list}");
                }
            }
        }
    }

    buf
}

fn graph_to_mermaid(graph: &MindMap) -> String {
    if graph.nodes.is_empty() {
        return "graph LR\n  Empty[\"No data\"]".to_string();
    }

    let mut lines = Vec::new();
    lines.push("graph LR".to_string());

    let mut id_map = std::collections::HashMap::new();
    for (idx, node) in graph.nodes.iter().enumerate() {
        let mermaid_id = format!("N{idx}");
        id_map.insert(node.id.as_str(), mermaid_id.clone());

        let shape = if node.is_category() {
            format!("[\"{}\"]", escape_mermaid_label(node.title()))
        } else {
            format!("(\"{}\")", escape_mermaid_label(node.title()))
        };
        lines.push(format!("  {mermaid_id}{shape}"));
    }

    for edge in &graph.edges {
        if let (Some(from), Some(to)) = (
            id_map.get(edge.source.as_str()),
            id_map.get(edge.target.as_str()),
        ) {
            lines.push(format!("  {from} --> {to}"));
        }
    }

    lines.join("\n")
}

fn escape_mermaid_label(label: &str) -> String {
    label.replace('"', "#quot;")
}

fn build_output_path(base: &Path, extension: &str) -> PathBuf {
    let has_extension = base
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false);

    if has_extension {
        base.to_path_buf()
    } else {
        base.join(export_filename(Utc::now().date_naive(), extension))
    }
}
