use crate::data::row::Row;

/// Text filter applied to a fixed set of columns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    text: String,
    fields: Vec<String>,
}

impl FilterSpec {
    pub fn new<I, S>(text: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for field in fields {
            let field = field.into();
            if !unique.contains(&field) {
                unique.push(field);
            }
        }
        Self {
            text: text.into(),
            fields: unique,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Case-insensitive substring match on any selected field.
    /// An empty search text accepts every row.
    pub fn matches(&self, row: &Row) -> bool {
        if self.text.is_empty() {
            return true;
        }
        let needle = self.text.to_lowercase();
        self.fields
            .iter()
            .any(|field| row.text(field).to_lowercase().contains(&needle))
    }
}

/// Keyword pre-filter on a single column: the row passes when the column
/// contains any of the keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordScope {
    pub column: String,
    pub keywords: Vec<String>,
}

impl KeywordScope {
    pub fn new<I, S>(column: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            column: column.into(),
            keywords: keywords
                .into_iter()
                .map(|k| k.into().to_lowercase())
                .collect(),
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        let value = row.text(&self.column).to_lowercase();
        self.keywords.iter().any(|k| value.contains(k.as_str()))
    }
}

/// Activity log categories offered by the admin dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCategory {
    UserManagement,
    DocumentManagement,
    LoginActivity,
}

impl ActionCategory {
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            ActionCategory::UserManagement => &["user", "activated", "deactivated", "deleted user"],
            ActionCategory::DocumentManagement => &["document", "uploaded", "deleted doc"],
            ActionCategory::LoginActivity => &["login", "logged in", "logged out"],
        }
    }

    /// Scope over the `action` column of activity log rows
    pub fn scope(self) -> KeywordScope {
        KeywordScope::new("action", self.keywords().iter().copied())
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "user" | "users" | "user management" => Some(ActionCategory::UserManagement),
            "document" | "documents" | "document management" => {
                Some(ActionCategory::DocumentManagement)
            }
            "login" | "login activity" => Some(ActionCategory::LoginActivity),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, email: &str, role: &str) -> Row {
        Row::new(id.to_string())
            .with("id", id)
            .with("email", email)
            .with("role", role)
    }

    #[test]
    fn test_filter_any_field() {
        let filter = FilterSpec::new("ADMIN", ["email", "role"]);
        assert!(filter.matches(&user(2, "b@x.com", "admin")));
        assert!(!filter.matches(&user(1, "a@x.com", "user")));
    }

    #[test]
    fn test_filter_only_selected_fields() {
        let filter = FilterSpec::new("admin", ["email"]);
        assert!(!filter.matches(&user(2, "b@x.com", "admin")));
    }

    #[test]
    fn test_empty_text_matches_all() {
        let filter = FilterSpec::new("", Vec::<String>::new());
        assert!(filter.matches(&user(1, "a@x.com", "user")));
    }

    #[test]
    fn test_numbers_are_searchable() {
        let filter = FilterSpec::new("12", ["id"]);
        assert!(filter.matches(&user(112, "a@x.com", "user")));
    }

    #[test]
    fn test_missing_field_never_matches_text() {
        let filter = FilterSpec::new("x", ["department"]);
        assert!(!filter.matches(&user(1, "a@x.com", "user")));
    }

    #[test]
    fn test_fields_deduplicated() {
        let filter = FilterSpec::new("a", ["email", "email", "role"]);
        assert_eq!(filter.fields(), ["email".to_string(), "role".to_string()]);
    }

    #[test]
    fn test_action_category_scope() {
        let scope = ActionCategory::LoginActivity.scope();
        let log = Row::new("1").with("action", "Logged in as admin");
        assert!(scope.matches(&log));

        let upload = Row::new("2").with("action", "Uploaded a document");
        assert!(!scope.matches(&upload));
        assert!(ActionCategory::DocumentManagement.scope().matches(&upload));
    }

    #[test]
    fn test_parse_category() {
        assert_eq!(
            ActionCategory::parse("User Management"),
            Some(ActionCategory::UserManagement)
        );
        assert_eq!(ActionCategory::parse("login"), Some(ActionCategory::LoginActivity));
        assert_eq!(ActionCategory::parse("all"), None);
    }
}
