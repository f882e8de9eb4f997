use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};

use loom_config::{init_logging, ConfigLoader};
use loom_render::cli::{parse_payload, Cli, Commands, Document};
use loom_render::TreeInterpreter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::load_or_default(cli.config.as_deref()).await?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    init_logging(&config.logging)?;

    let mut ui = TreeInterpreter::new(config);

    match cli.command {
        Commands::Render { file } => {
            mount(&mut ui, Document::load(&file).await?).await?;
            println!("{}", ui.markup());
        }
        Commands::Dispatch {
            file,
            node,
            event,
            payload,
            times,
            history,
        } => {
            mount(&mut ui, Document::load(&file).await?).await?;
            let payload = parse_payload(payload.as_deref())?;
            for _ in 0..times {
                let outcome = ui.dispatch_event(&node, &event, payload.clone())?;
                debug!(node_id = %node, handled = outcome.handled, deliveries = outcome.deliveries, "Dispatched");
            }
            println!("{}", ui.markup());

            if history {
                for event in ui.runtime().events().history() {
                    println!("{}", serde_json::to_string(event)?);
                }
            }
        }
    }

    Ok(())
}

async fn mount(ui: &mut TreeInterpreter, document: Document) -> Result<()> {
    match document {
        Document::App(app) => {
            ui.load_app(app).await?;
        }
        Document::Tree(tree) => {
            ui.load(tree).await?;
        }
    }
    info!(nodes = ui.arena().len(), "Tree ready");
    Ok(())
}
