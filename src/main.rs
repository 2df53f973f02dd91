use anyhow::{bail, Context, Result};
use budgetmap::config::Config;
use budgetmap::format::format_total;
use budgetmap::loader::DatasetSource;
use budgetmap::navigator::{path_string, NavigationFrame, Navigator, NodeDetails};
use budgetmap::notes::{export_file_name, notes_html};
use budgetmap::render::{OutlineRenderer, INITIAL_TREE_DEPTH};
use budgetmap::session::Session;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "budgetmap", about = "Explore a hierarchical budget dataset")]
struct Args {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dataset file to load instead of the configured default
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Node count, leaf count and grand total
    Summary {
        #[arg(long)]
        json: bool,
    },
    /// Find a node by name
    Search {
        query: Vec<String>,
        /// List every substring match instead of the best one
        #[arg(long)]
        all: bool,
    },
    /// Details of the node at a `/`-separated path
    Show { path: String },
    /// Print the subtree under a path as an indented outline
    Outline {
        #[arg(default_value = "")]
        path: String,
        #[arg(long, default_value_t = INITIAL_TREE_DEPTH)]
        depth: usize,
    },
    /// Write the sanitized dataset as JSON
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Notes attached to a node
    Notes {
        #[command(subcommand)]
        action: NotesCommand,
    },
}

#[derive(Subcommand)]
enum NotesCommand {
    Add { path: String, text: Vec<String> },
    List {
        path: String,
        /// Print an HTML fragment instead of plain lines
        #[arg(long)]
        html: bool,
    },
    Clear { path: String },
    Export {
        path: String,
        /// Directory for the export file; prints to stdout when omitted
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("loading config")?;
    budgetmap::logging::init(&config).context("initializing logging")?;

    let source = match &args.dataset {
        Some(path) => DatasetSource::File(path.clone()),
        None => DatasetSource::Default(config.dataset_path.clone()),
    };
    let mut session = Session::new(config);
    session.load_blocking(&source).context("loading dataset")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.command {
        Command::Summary { json } => summary(&session, json, &mut out)?,
        Command::Search { query, all } => search(&session, &query.join(" "), all, &mut out)?,
        Command::Show { path } => {
            let nav = navigator(&session)?;
            let frame = resolve(nav, &path)?;
            let parent_total = nav
                .dataset()
                .tree()
                .parent(frame.node)
                .and_then(|p| budgetmap::aggregate::total_for(nav.dataset().tree(), p));
            let details = nav.details(frame.node, frame.path.clone(), parent_total);
            print_details(&details, session.notes().list(&details.path_string()).len(), &mut out)?;
        }
        Command::Outline { path, depth } => {
            let mut renderer = OutlineRenderer::new(&mut out, depth);
            if !path.trim().is_empty() && path.trim() != "/" {
                let nav = session
                    .navigator_mut()
                    .context("no dataset loaded")?;
                let segments = split_path(&path);
                nav.open_path(&segments)?;
            }
            session.render(&mut renderer)?;
        }
        Command::Export { output } => {
            let dataset = session.dataset().context("no dataset loaded")?;
            let text = dataset.to_json_pretty()?;
            match output {
                Some(file) => std::fs::write(&file, text)
                    .with_context(|| format!("writing {}", file.display()))?,
                None => writeln!(out, "{text}")?,
            }
        }
        Command::Notes { action } => notes(&session, action, &mut out)?,
    }
    Ok(())
}

fn navigator(session: &Session) -> Result<&Navigator> {
    session.navigator().context("no dataset loaded")
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn resolve(nav: &Navigator, path: &str) -> Result<NavigationFrame> {
    let segments = split_path(path);
    if segments.is_empty() {
        return Ok(nav.current().clone());
    }
    Ok(nav.resolve_by_path(&segments)?)
}

fn summary(session: &Session, json: bool, out: &mut impl Write) -> Result<()> {
    let dataset = session.dataset().context("no dataset loaded")?;
    let summary = dataset.summary();
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
        return Ok(());
    }
    writeln!(out, "{}", summary.name)?;
    writeln!(out, "  source:     {}", summary.origin)?;
    writeln!(out, "  nodes:      {}", summary.node_count)?;
    writeln!(out, "  programmes: {}", summary.leaf_count)?;
    writeln!(out, "  total:      {}", format_total(summary.total))?;
    if let Some(meta) = &summary.meta {
        for (key, value) in meta {
            writeln!(out, "  {key}: {value}")?;
        }
    }
    Ok(())
}

fn search(session: &Session, query: &str, all: bool, out: &mut impl Write) -> Result<()> {
    let nav = navigator(session)?;
    if all {
        let mut hits = 0;
        for entry in nav.dataset().index().matches(query) {
            writeln!(out, "{}  {}", path_string(&entry.path), format_total(entry.total))?;
            hits += 1;
        }
        if hits == 0 {
            bail!("no node matches \"{}\"", query.trim());
        }
        return Ok(());
    }

    let entry = nav.resolve_by_query(query)?;
    let details = nav.details(entry.node, entry.path.clone(), entry.parent_total);
    print_details(&details, session.notes().list(&details.path_string()).len(), out)
}

fn print_details(details: &NodeDetails, note_count: usize, out: &mut impl Write) -> Result<()> {
    writeln!(out, "{}", details.title())?;
    writeln!(out, "  total: {}", details.total_text())?;
    writeln!(out, "  share: {}", details.share_text())?;
    writeln!(out, "  path:  {}", details.path_string())?;
    writeln!(out, "  desc:  {}", details.desc_text())?;
    writeln!(out, "  notes: {note_count}")?;
    Ok(())
}

fn notes(session: &Session, action: NotesCommand, out: &mut impl Write) -> Result<()> {
    let nav = navigator(session)?;
    let store = session.notes();
    match action {
        NotesCommand::Add { path, text } => {
            let key = path_string(&resolve(nav, &path)?.path);
            let entry = store.append(&key, &text.join(" "))?;
            writeln!(out, "added note to {key} at {}", entry.local_time())?;
        }
        NotesCommand::List { path, html } => {
            let key = path_string(&resolve(nav, &path)?.path);
            let notes = store.list(&key);
            if html {
                writeln!(out, "{}", notes_html(&notes))?;
                return Ok(());
            }
            if notes.is_empty() {
                writeln!(out, "No messages yet. Start the discussion for this node.")?;
            }
            for note in notes {
                writeln!(out, "[{}] {}", note.local_time(), note.text)?;
            }
        }
        NotesCommand::Clear { path } => {
            let key = path_string(&resolve(nav, &path)?.path);
            store.clear(&key)?;
            writeln!(out, "cleared notes for {key}")?;
        }
        NotesCommand::Export { path, dir } => {
            let key = path_string(&resolve(nav, &path)?.path);
            let text = store.export_json(&key)?;
            match dir {
                Some(dir) => {
                    let file = dir.join(export_file_name(&key));
                    std::fs::write(&file, text)
                        .with_context(|| format!("writing {}", file.display()))?;
                    writeln!(out, "exported notes to {}", file.display())?;
                }
                None => writeln!(out, "{text}")?,
            }
        }
    }
    Ok(())
}
