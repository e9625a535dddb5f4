use reedline::{Completer, Span, Suggestion};
use std::sync::{Arc, Mutex, PoisonError};

/// REPL commands with their one-line help
pub const COMMANDS: &[(&str, &str)] = &[
    ("login", "login <email> <password> [admin|user]"),
    ("register", "register <email> <password> <confirm>"),
    ("logout", "end the session"),
    ("whoami", "show the current session"),
    ("users", "list user accounts (admin)"),
    ("docs", "list documents"),
    ("logs", "logs [search] - activity log (admin)"),
    ("next", "next page"),
    ("prev", "previous page"),
    ("page", "page <n> - jump to a page"),
    ("filter", "filter <text> [fields...]"),
    ("sort", "sort <column> - repeat to reverse"),
    ("unsort", "back to server order"),
    ("scope", "scope <user|document|login|all> - activity category"),
    ("activate", "activate <user id>"),
    ("deactivate", "deactivate <user id>"),
    ("deluser", "deluser <user id>"),
    ("upload", "upload <path>"),
    ("download", "download <document id>"),
    ("rmdoc", "rmdoc <document id>"),
    ("dashboard", "totals and latest activity"),
    ("recent", "latest entries of the activity log"),
    ("watch", "refresh the activity log in the background"),
    ("unwatch", "stop background refresh"),
    ("\\export", "\\export <file.csv> - save the current page"),
    ("\\debug", "show recent log lines"),
    ("\\help", "show help"),
    ("\\clear", "clear the screen"),
    ("quit", "exit"),
];

const SCOPES: &[&str] = &["user", "document", "login", "all"];
const ROLES: &[&str] = &["admin", "user"];

/// Completes command names, then arguments that have a fixed vocabulary.
/// Column names for `sort` and `filter` come from whatever table is
/// currently shown.
pub struct CommandCompleter {
    columns: Arc<Mutex<Vec<String>>>,
}

impl CommandCompleter {
    pub fn new(columns: Arc<Mutex<Vec<String>>>) -> Self {
        Self { columns }
    }

    fn candidates(&self, words: &[&str]) -> Vec<(String, Option<String>)> {
        match words {
            [] | [_] => COMMANDS
                .iter()
                .map(|(name, help)| (name.to_string(), Some(help.to_string())))
                .collect(),
            ["scope", _] => SCOPES.iter().map(|s| (s.to_string(), None)).collect(),
            ["login", _, _, _] => ROLES.iter().map(|r| (r.to_string(), None)).collect(),
            // the first filter argument is the search text itself
            ["sort", _] | ["filter", _, _, ..] => self.column_candidates(),
            _ => Vec::new(),
        }
    }

    fn column_candidates(&self) -> Vec<(String, Option<String>)> {
        self.columns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|c| (c.clone(), Some("column".to_string())))
            .collect()
    }
}

impl Completer for CommandCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        let input = &line[..pos];
        let mut words: Vec<&str> = input.split_whitespace().collect();
        // a trailing space means a new, empty word is being typed
        if input.is_empty() || input.ends_with(char::is_whitespace) {
            words.push("");
        }
        let partial = words.last().copied().unwrap_or("");
        let start = pos.saturating_sub(partial.len());

        self.candidates(&words)
            .into_iter()
            .filter(|(value, _)| value.starts_with(partial))
            .map(|(value, description)| Suggestion {
                value,
                description,
                extra: None,
                span: Span { start, end: pos },
                style: None,
                append_whitespace: true,
            })
            .collect()
    }
}
