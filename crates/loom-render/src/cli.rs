use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::schema::{AppSpec, NodeSpec};

#[derive(Parser)]
#[command(name = "loom")]
#[command(about = "loom - mount a declarative widget tree and render it as markup")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging (shortcut for a debug log level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (TOML or JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a tree or application and print its markup
    Render {
        /// Tree or application description (JSON)
        file: PathBuf,
    },

    /// Dispatch a user event on a node, then print the resulting markup
    Dispatch {
        file: PathBuf,

        /// Target node id
        #[arg(short, long)]
        node: String,

        /// Event name, e.g. onClick
        #[arg(short, long, default_value = "onClick")]
        event: String,

        /// Event payload as JSON
        #[arg(short, long)]
        payload: Option<String>,

        /// How many times to dispatch the event
        #[arg(long, default_value_t = 1)]
        times: usize,

        /// Print the runtime event history as JSON lines
        #[arg(long)]
        history: bool,
    },
}

/// A description file: a whole application or a single tree
#[derive(Debug, Clone)]
pub enum Document {
    App(AppSpec),
    Tree(NodeSpec),
}

impl Document {
    /// Objects with a `components` array are applications
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json).context("Description is not valid JSON")?;
        if value.get("components").is_some_and(Value::is_array) {
            let app = serde_json::from_value(value).context("Invalid application description")?;
            Ok(Document::App(app))
        } else {
            let tree = serde_json::from_value(value).context("Invalid tree description")?;
            Ok(Document::Tree(tree))
        }
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json(&content)
    }
}

pub fn parse_payload(raw: Option<&str>) -> Result<Value> {
    raw.map(|raw| serde_json::from_str::<Value>(raw).context("Payload is not valid JSON"))
        .transpose()
        .map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_document_kind() {
        let app = Document::from_json(r#"{"components": [{"type": "button"}]}"#).unwrap();
        assert!(matches!(app, Document::App(app) if app.components.len() == 1));

        let tree = Document::from_json(r#"{"type": "button", "id": "b"}"#).unwrap();
        assert!(matches!(tree, Document::Tree(node) if node.id.as_deref() == Some("b")));

        assert!(Document::from_json("[1, 2]").is_err());
    }

    #[tokio::test]
    async fn test_document_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"type": "text", "properties": {{"text": "hi"}}}}"#).unwrap();
        let doc = Document::load(file.path()).await.unwrap();
        assert!(matches!(doc, Document::Tree(_)));
    }

    #[test]
    fn test_parse_payload() {
        assert_eq!(parse_payload(None).unwrap(), Value::Null);
        assert_eq!(parse_payload(Some("{\"a\": 1}")).unwrap()["a"], 1);
        assert!(parse_payload(Some("{")).is_err());
    }

    #[test]
    fn test_cli_parses_dispatch() {
        let cli = Cli::parse_from(["loom", "-v", "dispatch", "app.json", "--node", "b1", "--times", "2"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Dispatch { node, event, times, .. } => {
                assert_eq!(node, "b1");
                assert_eq!(event, "onClick");
                assert_eq!(times, 2);
            }
            Commands::Render { .. } => panic!("expected dispatch"),
        }
    }
}
