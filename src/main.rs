use anyhow::{anyhow, bail, Context, Result};
use crossterm::style::Stylize;
use reedline::{
    default_emacs_keybindings, ColumnarMenu, Emacs, FileBackedHistory, KeyCode, KeyModifiers,
    MenuBuilder, Prompt, PromptEditMode, PromptHistorySearch, PromptHistorySearchStatus, Reedline,
    ReedlineEvent, ReedlineMenu, Signal,
};
use std::borrow::Cow;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info};

use dms_client::api::{ActivityLogSource, DmsApiClient, DocumentsSource, UsersSource};
use dms_client::completer::{CommandCompleter, COMMANDS};
use dms_client::config::Config;
use dms_client::data::{
    column_names, ActionCategory, DataSource, PageChange, PaginationMode, Row, TabularView, ViewState,
    ViewStatus,
};
use dms_client::services::{load_dashboard, ActivityFeed};
use dms_client::session::{Role, Session};
use dms_client::table_display::{build_table, export_rows_to_csv, TableRenderer};
use dms_client::utils::app_paths::AppPaths;
use dms_client::utils::logging::{init_tracing, LogRingBuffer};

const MENU_NAME: &str = "command_completion";

struct DmsPrompt {
    label: String,
}

impl Prompt for DmsPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.label)
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, edit_mode: PromptEditMode) -> Cow<'_, str> {
        match edit_mode {
            PromptEditMode::Default | PromptEditMode::Emacs => "> ".into(),
            PromptEditMode::Vi(vi_mode) => match vi_mode {
                reedline::PromptViMode::Normal => "N> ".into(),
                reedline::PromptViMode::Insert => "I> ".into(),
            },
            PromptEditMode::Custom(str) => format!("{str}> ").into(),
        }
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("... ")
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<'_, str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };
        Cow::Owned(format!(
            "({}reverse search: {})",
            prefix, history_search.term
        ))
    }
}

fn print_usage() {
    println!("{}", "DMS CLI - document management client".blue().bold());
    println!();
    println!("{}", "Usage:".yellow());
    println!("  dms-cli [OPTIONS]");
    println!();
    println!("{}", "Options:".yellow());
    println!(
        "  {} - Write a commented config file and exit",
        "--generate-config".green()
    );
    println!("  {}   - Backend address for this run", "--server <url>".green());
    println!("  {}            - Show this help", "--help".green());
    println!();
}

fn print_help() {
    println!("{}", "Commands:".yellow());
    for (name, help) in COMMANDS {
        println!("  {} {}", format!("{:<12}", name).green(), help);
    }
    println!();
    println!("  {} - Complete commands and columns", "Tab".green());
    println!("  {} - Search history", "Ctrl+R".green());
    println!("  {} - Exit", "Ctrl+D".green());
    println!();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableKind {
    Users,
    Documents,
    Logs,
}

impl TableKind {
    fn label(self) -> &'static str {
        match self {
            TableKind::Users => "users",
            TableKind::Documents => "documents",
            TableKind::Logs => "activity log",
        }
    }
}

type DynView = TabularView<Arc<dyn DataSource>>;

struct OpenTable {
    kind: TableKind,
    view: DynView,
}

enum Flow {
    Continue,
    Quit,
}

struct Repl {
    config: Config,
    client: DmsApiClient,
    session: Option<Session>,
    table: Option<OpenTable>,
    feed: Option<ActivityFeed<ActivityLogSource>>,
    columns: Arc<Mutex<Vec<String>>>,
    log_buffer: LogRingBuffer,
}

impl Repl {
    fn new(config: Config, log_buffer: LogRingBuffer) -> Result<Self> {
        let client = DmsApiClient::new(&config.server.base_url, config.server.timeout())
            .context("Failed to build HTTP client")?;
        Ok(Self {
            config,
            client,
            session: None,
            table: None,
            feed: None,
            columns: Arc::new(Mutex::new(Vec::new())),
            log_buffer,
        })
    }

    fn prompt(&self) -> DmsPrompt {
        let label = match &self.session {
            Some(session) => format!("dms({})", session.email),
            None => "dms".to_string(),
        };
        DmsPrompt { label }
    }

    fn session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| anyhow!("Not logged in. Use: login <email> <password> [admin|user]"))
    }

    fn admin_session(&self) -> Result<&Session> {
        let session = self.session()?;
        if session.role() != Role::Admin {
            bail!("Admin privileges required");
        }
        Ok(session)
    }

    fn table(&self) -> Result<&OpenTable> {
        self.table
            .as_ref()
            .ok_or_else(|| anyhow!("No table open. Try: users, docs or logs"))
    }

    async fn execute(&mut self, line: &str) -> Result<Flow> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, args)) = words.split_first() else {
            return Ok(Flow::Continue);
        };

        match command {
            "quit" | "exit" | "\\q" => return Ok(Flow::Quit),
            "\\help" | "help" => print_help(),
            "\\clear" => print!("{esc}[2J{esc}[1;1H", esc = 27 as char),
            "\\debug" => self.show_debug(args),
            "\\export" => self.export(args)?,
            "login" => self.login(args).await?,
            "register" => self.register(args).await?,
            "logout" => self.logout().await?,
            "whoami" => self.whoami()?,
            "users" => self.open_users().await?,
            "docs" => self.open_documents().await?,
            "logs" => self.open_logs(args).await?,
            "next" => {
                let change = self.table()?.view.next_page().await?;
                report_page_change(change, "Already on the last page");
            }
            "prev" => {
                let change = self.table()?.view.prev_page().await?;
                report_page_change(change, "Already on the first page");
            }
            "page" => {
                let page: usize = args
                    .first()
                    .ok_or_else(|| anyhow!("Usage: page <n>"))?
                    .parse()
                    .context("Page must be a number")?;
                let change = self.table()?.view.go_to_page(page).await?;
                report_page_change(change, "");
            }
            "filter" => self.filter(args)?,
            "sort" => {
                let column = args.first().ok_or_else(|| anyhow!("Usage: sort <column>"))?;
                self.table()?.view.set_sort(column);
            }
            "unsort" => self.table()?.view.clear_sort(),
            "scope" => self.scope(args)?,
            "activate" => self.set_active(args, true).await?,
            "deactivate" => self.set_active(args, false).await?,
            "deluser" => self.delete_user(args).await?,
            "upload" => self.upload(args).await?,
            "download" => self.download(args).await?,
            "rmdoc" => self.delete_document(args).await?,
            "dashboard" => self.dashboard().await?,
            "recent" => self.recent().await?,
            "watch" => self.watch()?,
            "unwatch" => self.unwatch().await,
            other => bail!("Unknown command '{}'. Type \\help for a list.", other),
        }
        Ok(Flow::Continue)
    }

    async fn login(&mut self, args: &[&str]) -> Result<()> {
        let [email, password, rest @ ..] = args else {
            bail!("Usage: login <email> <password> [admin|user]");
        };
        let role = match rest.first() {
            Some(r) => r.parse::<Role>().map_err(|e| anyhow!(e))?,
            None => Role::User,
        };

        let session = self.client.login(email, password, role).await?;
        println!(
            "{}",
            format!("Logged in as {} ({})", session.email, session.role()).green()
        );
        self.close_views().await;
        self.session = Some(session);
        Ok(())
    }

    async fn register(&mut self, args: &[&str]) -> Result<()> {
        let [email, password, confirm] = args else {
            bail!("Usage: register <email> <password> <confirm>");
        };
        let message = self.client.register(email, password, confirm).await?;
        println!("{}", message.green());
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        let session = self.session()?.clone();
        self.close_views().await;
        self.session = None;
        let message = self.client.logout(&session).await?;
        println!("{}", message.green());
        Ok(())
    }

    fn whoami(&self) -> Result<()> {
        let session = self.session()?;
        let id = if session.actor.id.is_empty() {
            "?"
        } else {
            session.actor.id.as_str()
        };
        println!("{} (id {}, {})", session.email, id, session.role());
        Ok(())
    }

    async fn close_views(&mut self) {
        if let Some(open) = self.table.take() {
            open.view.teardown();
        }
        if let Some(mut feed) = self.feed.take() {
            feed.stop().await;
            feed.close();
        }
        self.columns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Replace the current table with a fresh view and load its first page
    async fn open_table(
        &mut self,
        kind: TableKind,
        source: Arc<dyn DataSource>,
        mode: PaginationMode,
        renderer: TableRenderer,
    ) -> Result<()> {
        if let Some(old) = self.table.take() {
            old.view.teardown();
        }

        let page_size = self.config.view.page_size;
        let view: DynView = TabularView::new(source, mode, page_size)?;

        let columns = Arc::clone(&self.columns);
        view.subscribe(Arc::new(renderer));
        view.subscribe(Arc::new(move |rows: &[Row], _state: &ViewState| {
            let names = column_names(rows);
            if !names.is_empty() {
                *columns.lock().unwrap_or_else(PoisonError::into_inner) = names;
            }
        }));

        info!(table = kind.label(), ?mode, "opening table");
        self.table = Some(OpenTable {
            kind,
            view: view.clone(),
        });

        view.load(1, page_size).await?;
        print_footer(&view);
        Ok(())
    }

    async fn open_users(&mut self) -> Result<()> {
        let session = self.admin_session()?.clone();
        let source = UsersSource::new(self.client.clone(), session.clone());
        let mode = source.mode();
        let renderer = TableRenderer::with_actions(session.actor);
        self.open_table(TableKind::Users, Arc::new(source), mode, renderer)
            .await
    }

    async fn open_documents(&mut self) -> Result<()> {
        let session = self.session()?.clone();
        let source = DocumentsSource::new(self.client.clone(), session);
        let mode = source.mode();
        self.open_table(
            TableKind::Documents,
            Arc::new(source),
            mode,
            TableRenderer::new(),
        )
        .await
    }

    async fn open_logs(&mut self, args: &[&str]) -> Result<()> {
        let session = self.admin_session()?.clone();
        let source = ActivityLogSource::new(self.client.clone(), session, args.join(" "));
        let mode = source.mode();
        self.open_table(TableKind::Logs, Arc::new(source), mode, TableRenderer::new())
            .await
    }

    fn filter(&self, args: &[&str]) -> Result<()> {
        let open = self.table()?;
        let Some((text, fields)) = args.split_first() else {
            open.view.set_filter("", Vec::<String>::new());
            println!("{}", "Filter cleared".green());
            return Ok(());
        };

        if !fields.is_empty() {
            open.view.set_filter(*text, fields.iter().copied());
        } else {
            let defaults: Vec<String> = match open.kind {
                TableKind::Users => self.config.view.user_search_fields.clone(),
                TableKind::Documents => self.config.view.document_search_fields.clone(),
                TableKind::Logs => self.config.view.log_search_fields.clone(),
            };
            open.view.set_filter(*text, defaults);
        }
        print_footer(&open.view);
        Ok(())
    }

    fn scope(&self, args: &[&str]) -> Result<()> {
        let name = args
            .first()
            .ok_or_else(|| anyhow!("Usage: scope <user|document|login|all>"))?;
        let category = match *name {
            "all" => None,
            other => Some(
                ActionCategory::parse(other)
                    .ok_or_else(|| anyhow!("Unknown scope '{}'", other))?,
            ),
        };

        if let Some(feed) = &self.feed {
            feed.set_category(category);
        }
        match &self.table {
            Some(open) if open.kind == TableKind::Logs => {
                open.view.set_scope(category.map(ActionCategory::scope));
                print_footer(&open.view);
            }
            _ if self.feed.is_some() => {}
            _ => bail!("scope applies to the activity log. Open it with: logs"),
        }
        Ok(())
    }

    async fn reload_if(&self, kind: TableKind) -> Result<()> {
        if let Some(open) = self.table.as_ref().filter(|t| t.kind == kind) {
            open.view.reload().await?;
        }
        Ok(())
    }

    async fn set_active(&self, args: &[&str], active: bool) -> Result<()> {
        let session = self.admin_session()?;
        let id = args.first().ok_or_else(|| anyhow!("Usage: activate|deactivate <user id>"))?;
        let message = self.client.set_user_active(session, id, active).await?;
        println!("{}", message.green());
        self.reload_if(TableKind::Users).await
    }

    async fn delete_user(&self, args: &[&str]) -> Result<()> {
        let session = self.admin_session()?;
        let id = args.first().ok_or_else(|| anyhow!("Usage: deluser <user id>"))?;
        let message = self.client.delete_user(session, id).await?;
        println!("{}", message.green());
        self.reload_if(TableKind::Users).await
    }

    async fn upload(&self, args: &[&str]) -> Result<()> {
        let session = self.session()?;
        let path = args.first().ok_or_else(|| anyhow!("Usage: upload <path>"))?;
        let message = self.client.upload_document(session, Path::new(path)).await?;
        println!("{}", message.green());
        self.reload_if(TableKind::Documents).await
    }

    async fn download(&self, args: &[&str]) -> Result<()> {
        let session = self.session()?;
        let id = args.first().ok_or_else(|| anyhow!("Usage: download <document id>"))?;
        let file = self.client.download_document(session, id).await?;
        let dir = self.config.download_dir()?;
        let path = file
            .save_to(&dir)
            .await
            .with_context(|| format!("Failed to save into {}", dir.display()))?;
        println!("{}", format!("Saved {}", path.display()).green());
        Ok(())
    }

    async fn delete_document(&self, args: &[&str]) -> Result<()> {
        let session = self.session()?;
        let id = args.first().ok_or_else(|| anyhow!("Usage: rmdoc <document id>"))?;
        let message = self.client.delete_document(session, id).await?;
        println!("{}", message.green());
        self.reload_if(TableKind::Documents).await
    }

    async fn dashboard(&self) -> Result<()> {
        let session = self.session()?;
        let summary = load_dashboard(&self.client, session).await?;
        println!("{}", format!("Welcome, {}", summary.display_name).blue().bold());
        println!("  Documents: {}", summary.total_documents);
        println!("  Users:     {}", summary.total_users);
        if let Some(own) = summary.own_documents {
            println!("  Yours:     {}", own);
        }
        if !summary.recent_activities.is_empty() {
            println!("{}", "Recent activity:".yellow());
            for activity in &summary.recent_activities {
                println!("  {}  {}", activity.timestamp.as_str().dark_grey(), activity.action);
            }
        }
        Ok(())
    }

    /// The activity feed, created on first use
    fn feed(&mut self) -> Result<&mut ActivityFeed<ActivityLogSource>> {
        if self.feed.is_none() {
            let session = self.admin_session()?.clone();
            let source = ActivityLogSource::new(self.client.clone(), session, "");
            let feed = ActivityFeed::new(
                source,
                self.config.view.page_size,
                self.config.activity.poll_interval(),
                self.config.activity.recent_limit,
            )?;
            self.feed = Some(feed);
        }
        self.feed
            .as_mut()
            .ok_or_else(|| anyhow!("activity feed unavailable"))
    }

    async fn recent(&mut self) -> Result<()> {
        let page_size = self.config.view.page_size;
        let feed = self.feed()?;
        if !feed.is_watching() || feed.view().status() == ViewStatus::NotLoaded {
            feed.view().load(1, page_size).await?;
        }
        let rows = feed.recent();
        if rows.is_empty() {
            println!("{}", "No recent activity.".yellow());
        } else {
            println!("{}", build_table(&rows, None));
        }
        Ok(())
    }

    fn watch(&mut self) -> Result<()> {
        let feed = self.feed()?;
        if feed.is_watching() {
            println!("{}", "Already watching the activity log".yellow());
            return Ok(());
        }

        feed.watch(|total| {
            println!(
                "{}",
                format!("activity log now has {} entries (type 'recent')", total).cyan()
            );
        });
        println!("{}", "Watching the activity log. Use 'unwatch' to stop.".green());
        Ok(())
    }

    async fn unwatch(&mut self) {
        match self.feed.as_mut() {
            Some(feed) if feed.is_watching() => {
                feed.stop().await;
                println!("{}", "Stopped watching".green());
            }
            _ => println!("{}", "Not watching".yellow()),
        }
    }

    fn export(&self, args: &[&str]) -> Result<()> {
        let file = args.first().ok_or_else(|| anyhow!("Usage: \\export <filename>"))?;
        let rows = self.table()?.view.render();
        if rows.is_empty() {
            bail!("No rows to export");
        }
        let written = export_rows_to_csv(&rows, Path::new(file))?;
        println!(
            "{}",
            format!("Exported {} rows to {}", written, file).green()
        );
        Ok(())
    }

    fn show_debug(&self, args: &[&str]) {
        let count = args.first().and_then(|n| n.parse().ok()).unwrap_or(50);
        let entries = self.log_buffer.get_recent(count);
        if entries.is_empty() {
            println!("{}", "No log entries".yellow());
        }
        for entry in entries {
            println!("{}", entry.format_for_display().dark_grey());
        }
    }
}

fn report_page_change(change: PageChange, unchanged: &str) {
    match change {
        PageChange::Moved(_) => {}
        PageChange::Unchanged if !unchanged.is_empty() => println!("{}", unchanged.yellow()),
        PageChange::Unchanged | PageChange::Superseded => {}
    }
}

fn print_footer<S: DataSource>(view: &TabularView<S>) {
    let state = view.state();
    let mut line = match view.status() {
        ViewStatus::NoMatches => "No rows match the current filter".to_string(),
        _ => format!(
            "Page {} of {} ({} total)",
            state.page,
            view.total_pages(),
            view.total()
        ),
    };
    if view.mode() == PaginationMode::ServerDriven && !state.filter.is_empty() {
        line.push_str(&format!(", {} matching on this page", view.matching_count()));
    }
    println!("{}", line.cyan());
}

fn line_editor(columns: Arc<Mutex<Vec<String>>>) -> Reedline {
    let completion_menu = Box::new(
        ColumnarMenu::default()
            .with_name(MENU_NAME)
            .with_columns(1)
            .with_column_width(None)
            .with_column_padding(2),
    );

    let mut keybindings = default_emacs_keybindings();
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Tab,
        ReedlineEvent::Menu(MENU_NAME.to_string()),
    );

    let editor = Reedline::create()
        .with_completer(Box::new(CommandCompleter::new(columns)))
        .with_menu(ReedlineMenu::EngineCompleter(completion_menu))
        .with_edit_mode(Box::new(Emacs::new(keybindings)));

    let history = AppPaths::history_file()
        .ok()
        .and_then(|path| FileBackedHistory::with_file(1000, path).ok());
    match history {
        Some(history) => editor.with_history(Box::new(history)),
        None => editor,
    }
}

fn generate_config() -> Result<()> {
    let path = Config::get_config_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Error creating config directory")?;
    }
    std::fs::write(&path, Config::create_default_with_comments())
        .context("Error writing config file")?;
    println!("Configuration file created at: {:?}", path);
    println!("Edit this file to point dms-cli at your server.");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        print_help();
        return Ok(());
    }

    if args.iter().any(|a| a == "--generate-config") {
        return generate_config();
    }

    let (log_buffer, log_path) = init_tracing(AppPaths::logs_dir().ok().as_deref());
    if let Some(path) = &log_path {
        eprintln!("Logs: {}", path.display());
    }

    let mut config = Config::load()?;
    let server_flag = args
        .iter()
        .position(|arg| arg == "--server")
        .and_then(|pos| args.get(pos + 1))
        .cloned();
    config.override_base_url(server_flag);

    let mut repl = Repl::new(config, log_buffer)?;
    let mut line_editor = line_editor(Arc::clone(&repl.columns));

    println!(
        "{}",
        format!("Server: {}", repl.client.base_url()).cyan()
    );
    println!("Type {} for commands.", "\\help".green());

    loop {
        let sig = line_editor.read_line(&repl.prompt())?;
        match sig {
            Signal::Success(buffer) => match repl.execute(buffer.trim()).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(e) => {
                    error!(error = %e, "command failed");
                    eprintln!("{}", format!("Error: {:#}", e).red());
                }
            },
            Signal::CtrlD | Signal::CtrlC => break,
        }
    }

    repl.close_views().await;
    println!("\nGoodbye!");
    Ok(())
}
