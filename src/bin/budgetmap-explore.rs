use anyhow::{Context, Result};
use budgetmap::config::Config;
use budgetmap::format::node_label;
use budgetmap::loader::DatasetSource;
use budgetmap::navigator::NodeDetails;
use budgetmap::notes::export_file_name;
use budgetmap::render::{OutlineRenderer, EXPORT_FILE_NAME, INITIAL_TREE_DEPTH};
use budgetmap::session::Session;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

/// How long a `load` command waits before handing control back to the prompt.
const LOAD_WAIT: Duration = Duration::from_secs(2);

const HELP: &str = "\
commands:
  show                 details of the current center and its children
  outline [depth]      indented outline below the center
  search <name>        jump to the best match for a name
  open <a/b/c>         jump to a path (root name optional)
  drill <child>        select a child; branches become the new center
  back                 return to the previous center
  reset                clear history and return to the root
  note <text>          add a note to the current center
  notes                list notes for the current center
  clear-notes          delete notes for the current center
  export-notes [dir]   write notes for the current center as JSON
  export-image         rasterize the current view
  load <file>          load another dataset (replaces the current one)
  quit";

struct App {
    session: Session,
    status: String,
    should_quit: bool,
}

impl App {
    fn new(session: Session) -> Self {
        Self {
            session,
            status: String::new(),
            should_quit: false,
        }
    }

    fn poll_load_updates(&mut self) {
        if let Some(result) = self.session.poll_loads() {
            self.report_load(result);
        }
    }

    fn report_load(&mut self, result: Result<budgetmap::DatasetSummary, budgetmap::LoadError>) {
        self.status = match result {
            Ok(summary) => format!(
                "Loaded {}: {} nodes, {} programmes",
                summary.name, summary.node_count, summary.leaf_count
            ),
            Err(err) => format!("Load failed: {err}"),
        };
    }

    fn on_command(&mut self, line: &str, out: &mut impl Write) -> Result<()> {
        let line = line.trim();
        let (cmd, arg) = match line.split_once(char::is_whitespace) {
            Some((cmd, arg)) => (cmd, arg.trim()),
            None => (line, ""),
        };

        match cmd {
            "" => {}
            "q" | "quit" | "exit" => self.should_quit = true,
            "help" | "?" => writeln!(out, "{HELP}")?,
            "show" => self.show(out)?,
            "outline" => {
                let depth = arg.parse().unwrap_or(INITIAL_TREE_DEPTH);
                let mut renderer = OutlineRenderer::new(&mut *out, depth);
                self.session.render(&mut renderer)?;
            }
            "search" | "find" => self.navigate(|nav| nav.search(arg).map(|_| ())),
            "open" => {
                let segments: Vec<&str> = arg.split('/').filter(|s| !s.is_empty()).collect();
                self.navigate(|nav| nav.open_path(&segments).map(|_| ()));
            }
            "drill" => self.drill(arg, out)?,
            "back" | "b" => {
                if let Some(nav) = self.session.navigator_mut() {
                    if !nav.go_back() {
                        self.status = "Nothing to go back to".to_string();
                    }
                }
            }
            "reset" => {
                if let Some(nav) = self.session.navigator_mut() {
                    nav.reset();
                }
            }
            "note" => self.add_note(arg),
            "notes" => self.list_notes(out)?,
            "clear-notes" => {
                if let Some(key) = self.session.current_path_string() {
                    self.status = match self.session.notes().clear(&key) {
                        Ok(()) => format!("Cleared notes for {key}"),
                        Err(err) => format!("Could not clear notes: {err}"),
                    };
                }
            }
            "export-notes" => self.export_notes(arg)?,
            "export-image" => {
                let mut renderer = OutlineRenderer::new(io::sink(), 0);
                self.status = match self.session.export_image(&mut renderer) {
                    Ok(Some(bytes)) => {
                        std::fs::write(EXPORT_FILE_NAME, bytes)
                            .with_context(|| format!("writing {EXPORT_FILE_NAME}"))?;
                        format!("Wrote {EXPORT_FILE_NAME}")
                    }
                    Ok(None) => "No dataset loaded".to_string(),
                    Err(err) => format!("Export failed: {err}"),
                };
            }
            "load" => {
                if arg.is_empty() {
                    self.status = "Usage: load <file>".to_string();
                } else {
                    self.session.request_load(DatasetSource::File(PathBuf::from(arg)));
                    self.status = format!("Loading {arg} ...");
                    if let Some(result) = self.session.wait_for_load(LOAD_WAIT) {
                        self.report_load(result);
                    }
                }
            }
            other => self.status = format!("Unknown command: {other} (try help)"),
        }
        Ok(())
    }

    fn navigate(
        &mut self,
        action: impl FnOnce(&mut budgetmap::Navigator) -> Result<(), budgetmap::NavigationError>,
    ) {
        let Some(nav) = self.session.navigator_mut() else {
            self.status = "No dataset loaded".to_string();
            return;
        };
        if let Err(err) = action(nav) {
            self.status = err.to_string();
        }
    }

    fn drill(&mut self, child: &str, out: &mut impl Write) -> Result<()> {
        let Some(nav) = self.session.navigator_mut() else {
            self.status = "No dataset loaded".to_string();
            return Ok(());
        };
        let mut path = nav.current().path.clone();
        path.push(child.to_string());
        match nav.resolve_by_path(&path) {
            Ok(frame) => {
                let selection = nav.click(frame.node, frame.path);
                print_details(&selection.details, out)?;
                if !selection.drilled {
                    self.status = format!("{} has no children", selection.details.name);
                }
            }
            Err(err) => self.status = err.to_string(),
        }
        Ok(())
    }

    fn show(&mut self, out: &mut impl Write) -> Result<()> {
        let Some(nav) = self.session.navigator() else {
            self.status = "No dataset loaded".to_string();
            return Ok(());
        };
        let details = nav.current_details();
        print_details(&details, out)?;

        let tree = nav.dataset().tree();
        let center = nav.current().node;
        for child in tree.children(center) {
            let total = budgetmap::aggregate::total_for(tree, child);
            writeln!(out, "  - {}", node_label(tree.name(child), total, details.total))?;
        }
        let notes = self.session.notes().list(&details.path_string());
        writeln!(out, "  {} note(s), back-stack depth {}", notes.len(), nav.depth())?;
        Ok(())
    }

    fn add_note(&mut self, text: &str) {
        let Some(key) = self.session.current_path_string() else {
            self.status = "No dataset loaded".to_string();
            return;
        };
        self.status = match self.session.notes().append(&key, text) {
            Ok(_) => format!("Added note to {key}"),
            Err(err) => format!("Could not add note: {err}"),
        };
    }

    fn list_notes(&mut self, out: &mut impl Write) -> Result<()> {
        let Some(key) = self.session.current_path_string() else {
            self.status = "No dataset loaded".to_string();
            return Ok(());
        };
        let notes = self.session.notes().list(&key);
        if notes.is_empty() {
            writeln!(out, "No messages yet. Start the discussion for this node.")?;
        }
        for note in notes {
            writeln!(out, "[{}] {}", note.local_time(), note.text)?;
        }
        Ok(())
    }

    fn export_notes(&mut self, dir: &str) -> Result<()> {
        let Some(key) = self.session.current_path_string() else {
            self.status = "No dataset loaded".to_string();
            return Ok(());
        };
        let dir = if dir.is_empty() { "." } else { dir };
        let file = PathBuf::from(dir).join(export_file_name(&key));
        let text = self.session.notes().export_json(&key)?;
        std::fs::write(&file, text).with_context(|| format!("writing {}", file.display()))?;
        self.status = format!("Exported notes to {}", file.display());
        Ok(())
    }
}

fn print_details(details: &NodeDetails, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{}", details.title())?;
    writeln!(out, "  total: {}  share: {}", details.total_text(), details.share_text())?;
    writeln!(out, "  path:  {}", details.path_string())?;
    writeln!(out, "  desc:  {}", details.desc_text())
}

fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref()).context("loading config")?;
    budgetmap::logging::init(&config).context("initializing logging")?;

    let default_source = DatasetSource::Default(config.dataset_path.clone());
    let mut app = App::new(Session::new(config));
    app.session.request_load(default_source);
    if let Some(result) = app.session.wait_for_load(LOAD_WAIT) {
        app.report_load(result);
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{HELP}")?;

    let mut lines = stdin.lock().lines();
    while !app.should_quit {
        app.poll_load_updates();
        if !app.status.is_empty() {
            writeln!(out, "{}", app.status)?;
            app.status.clear();
        }
        let prompt = app
            .session
            .current_path_string()
            .unwrap_or_else(|| "(loading)".to_string());
        write!(out, "{prompt}> ")?;
        out.flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        if let Err(err) = app.on_command(&line?, &mut out) {
            app.status = format!("Error: {err:#}");
        }
    }
    Ok(())
}
