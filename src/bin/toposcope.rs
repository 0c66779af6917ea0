/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{debug, info};
use std::collections::BTreeMap;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use toposcope::{generate_demo_graph, ContainerConfig, Graph, ServiceContainer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GraphFormat {
    Json,
    Toml,
}

impl GraphFormat {
    /// `.toml` files are TOML, everything else JSON
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => GraphFormat::Toml,
            _ => GraphFormat::Json,
        }
    }
}

impl std::str::FromStr for GraphFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "JSON" => Ok(GraphFormat::Json),
            "TOML" => Ok(GraphFormat::Toml),
            _ => Err("Graph format must be either 'json' or 'toml'".to_string()),
        }
    }
}

impl std::fmt::Display for GraphFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            GraphFormat::Json => write!(f, "JSON"),
            GraphFormat::Toml => write!(f, "TOML"),
        }
    }
}

#[derive(Parser)]
#[command(name = "toposcope", version, about = "Hardware topology inventory for Linux hosts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect the hardware graph and write it to a file
    Scan {
        /// Output file
        #[arg(long, default_value = "graph.json")]
        out: PathBuf,

        /// Write the built-in demo graph instead of scanning this host
        #[arg(long)]
        demo: bool,

        /// Output file format (json or toml)
        #[arg(long, default_value = "json")]
        format: GraphFormat,

        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Log every command and stage
        #[arg(short, long)]
        verbose: bool,
    },
    /// Check a saved graph against the structural invariants
    Validate {
        /// Graph file to check
        #[arg(long)]
        graph: PathBuf,

        /// File format, guessed from the extension when omitted
        #[arg(long)]
        format: Option<GraphFormat>,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();
}

fn print_summary(graph: &Graph) {
    let mut kinds: BTreeMap<String, usize> = BTreeMap::new();
    for node in &graph.nodes {
        *kinds.entry(node.kind.to_string()).or_default() += 1;
    }

    println!("Topology Summary:");
    println!("=================");
    if let Some(root) = graph.nodes.first() {
        println!("Host: {}", root.label);
    }
    for (kind, count) in &kinds {
        println!("  {kind}: {count}");
    }
}

async fn scan(
    out: PathBuf,
    demo: bool,
    format: GraphFormat,
    config: Option<PathBuf>,
    verbose: bool,
) -> Result<ExitCode, Box<dyn Error>> {
    let mut config = match config {
        Some(path) => ContainerConfig::from_toml_file(&path)?,
        None => ContainerConfig::default(),
    };
    config.verbose |= verbose;
    init_logging(config.verbose);

    let container = ServiceContainer::new(config);
    let graph = if demo {
        info!("Generating demo graph");
        generate_demo_graph()
    } else {
        if !container.is_supported_platform() {
            eprintln!(
                "Live collection is only supported on Linux (this is {}); use --demo",
                container.get_platform_name()
            );
            return Ok(ExitCode::from(2));
        }

        let missing = container.missing_tools().await;
        if !missing.is_empty() {
            info!("Tools not found, their stages are skipped: {}", missing.join(", "));
        }

        let outcome = container
            .create_topology_service()
            .collect_with_diagnostics()
            .await;
        for diagnostic in &outcome.diagnostics {
            debug!("[{}] {}: {}", diagnostic.stage, diagnostic.tool, diagnostic.message);
        }
        outcome.graph
    };

    let repository = container.create_graph_repository();
    match format {
        GraphFormat::Json => repository.save_json(&graph, &out).await?,
        GraphFormat::Toml => repository.save_toml(&graph, &out).await?,
    }

    print_summary(&graph);
    println!(
        "\nWrote {} nodes and {} edges to {} ({format})",
        graph.nodes.len(),
        graph.edges.len(),
        out.display()
    );
    Ok(ExitCode::SUCCESS)
}

async fn validate(path: PathBuf, format: Option<GraphFormat>) -> Result<ExitCode, Box<dyn Error>> {
    init_logging(false);

    let repository = ServiceContainer::default().create_graph_repository();
    let graph = match format.unwrap_or_else(|| GraphFormat::from_path(&path)) {
        GraphFormat::Json => repository.load_json(&path).await?,
        GraphFormat::Toml => repository.load_toml(&path).await?,
    };

    match graph.validate() {
        Ok(()) => {
            println!(
                "{}: valid ({} nodes, {} edges)",
                path.display(),
                graph.nodes.len(),
                graph.edges.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}: invalid: {e}", path.display());
            Ok(ExitCode::FAILURE)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scan {
            out,
            demo,
            format,
            config,
            verbose,
        } => scan(out, demo, format, config, verbose).await,
        Commands::Validate { graph, format } => validate(graph, format).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
