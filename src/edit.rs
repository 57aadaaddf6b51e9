//! Inline Cell Editing
//!
//! One (record, field) edit at a time per page. The session only tracks
//! drafts; pages turn a [`PendingCommit`] into a store write.

use serde_json::Value;

/// How a draft string becomes a stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Stored verbatim
    Text,
    /// Leading/trailing whitespace removed
    Trimmed,
    /// Date strings pass through untouched
    Date,
    /// Float, unparsable input becomes 0
    Number,
    /// Integer, unparsable input becomes 0
    Integer,
    /// Integer clamped to 0..=100
    Percent,
    /// Comma separated names
    List,
    /// Currency label, always `$`-prefixed
    Money,
}

/// Field identifiers of an editable table
pub trait EditableField: Copy + Eq + std::fmt::Debug + Send + 'static {
    /// Stored field name
    fn name(&self) -> &'static str;

    fn kind(&self) -> FieldKind;

    /// Empty drafts commit nothing for this field
    fn skip_empty(&self) -> bool {
        false
    }
}

/// Coerce a draft per field kind
pub fn coerce(kind: FieldKind, draft: &str) -> Value {
    match kind {
        FieldKind::Text | FieldKind::Date => Value::String(draft.to_string()),
        FieldKind::Trimmed => Value::String(draft.trim().to_string()),
        FieldKind::Number => json_number(parse_float_prefix(draft).unwrap_or(0.0)),
        FieldKind::Integer => Value::from(parse_int_prefix(draft).unwrap_or(0)),
        FieldKind::Percent => Value::from(parse_int_prefix(draft).unwrap_or(0).clamp(0, 100)),
        FieldKind::List => Value::from(split_list(draft)),
        FieldKind::Money => Value::String(money_label(draft)),
    }
}

/// Whole numbers are stored as integers, everything else as floats
pub fn json_number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or_else(|| Value::from(0))
    }
}

/// `"a, b,,c "` -> `["a", "b", "c"]`
pub fn split_list(draft: &str) -> Vec<String> {
    draft
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn money_label(draft: &str) -> String {
    if draft.starts_with('$') {
        draft.to_string()
    } else {
        format!("${}", draft)
    }
}

/// Longest numeric prefix as a float (`"12.5kg"` -> 12.5, `"abc"` -> None).
/// NaN and infinities count as unparsable.
pub fn parse_float_prefix(input: &str) -> Option<f64> {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }
    // Exponent only counts when followed by digits
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Leading base-10 integer (`"42 tasks"` -> 42, `"x"` -> None)
pub fn parse_int_prefix(input: &str) -> Option<i64> {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    s[..end].parse::<i64>().ok()
}

/// Keys that end an edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKey {
    Enter,
    Escape,
}

/// A finished edit waiting to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommit<F> {
    pub record_id: String,
    pub field: F,
    pub value: String,
    /// Value at the time the edit started
    pub original: String,
}

impl<F: EditableField> PendingCommit<F> {
    /// Whether this commit should reach the store at all
    pub fn should_write(&self) -> bool {
        !(self.field.skip_empty() && self.value.is_empty())
    }

    pub fn coerced(&self) -> Value {
        coerce(self.field.kind(), &self.value)
    }
}

#[derive(Debug, Clone)]
struct ActiveEdit<F> {
    record_id: String,
    field: F,
    draft: String,
    original: String,
}

impl<F> ActiveEdit<F> {
    fn into_commit(self) -> PendingCommit<F> {
        PendingCommit {
            record_id: self.record_id,
            field: self.field,
            value: self.draft,
            original: self.original,
        }
    }
}

/// Result of [`CellEditSession::start`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome<F> {
    /// The same cell was already being edited
    AlreadyEditing,
    /// A new edit began; a different cell's edit may have been force-committed
    Started { forced: Option<PendingCommit<F>> },
}

/// Edit state of one page
#[derive(Debug, Clone)]
pub struct CellEditSession<F> {
    active: Option<ActiveEdit<F>>,
    /// Set by Enter/Escape so the blur that follows does not commit again
    skip_blur: bool,
}

impl<F> Default for CellEditSession<F> {
    fn default() -> Self {
        Self {
            active: None,
            skip_blur: false,
        }
    }
}

impl<F: EditableField> CellEditSession<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin editing `field` of `record_id`, seeded with its current value
    pub fn start(&mut self, record_id: &str, field: F, current: String) -> StartOutcome<F> {
        if self.is_editing(record_id, field) {
            return StartOutcome::AlreadyEditing;
        }
        let forced = self.active.take().map(ActiveEdit::into_commit);
        self.active = Some(ActiveEdit {
            record_id: record_id.to_string(),
            field,
            draft: current.clone(),
            original: current,
        });
        self.skip_blur = false;
        StartOutcome::Started { forced }
    }

    /// Update the draft; false when nothing is being edited
    pub fn change_draft(&mut self, value: impl Into<String>) -> bool {
        match self.active.as_mut() {
            Some(edit) => {
                edit.draft = value.into();
                true
            }
            None => false,
        }
    }

    pub fn commit(&mut self) -> Option<PendingCommit<F>> {
        self.active.take().map(ActiveEdit::into_commit)
    }

    /// Drop the draft; returns whether an edit was active
    pub fn cancel(&mut self) -> bool {
        self.active.take().is_some()
    }

    /// Enter commits, Escape cancels; both suppress the next blur
    pub fn key(&mut self, key: EditKey) -> Option<PendingCommit<F>> {
        self.skip_blur = true;
        match key {
            EditKey::Enter => self.commit(),
            EditKey::Escape => {
                self.cancel();
                None
            }
        }
    }

    /// Focus left the input
    pub fn blur(&mut self) -> Option<PendingCommit<F>> {
        if self.skip_blur {
            self.skip_blur = false;
            return None;
        }
        self.commit()
    }

    pub fn is_editing(&self, record_id: &str, field: F) -> bool {
        self.active
            .as_ref()
            .map(|edit| edit.record_id == record_id && edit.field == field)
            .unwrap_or(false)
    }

    pub fn active(&self) -> Option<(&str, F)> {
        self.active
            .as_ref()
            .map(|edit| (edit.record_id.as_str(), edit.field))
    }

    pub fn draft(&self) -> Option<&str> {
        self.active.as_ref().map(|edit| edit.draft.as_str())
    }

    /// Cancel the edit when its record is gone from the mirror
    pub fn cancel_if_missing(&mut self, exists: impl Fn(&str) -> bool) -> bool {
        let gone = self
            .active
            .as_ref()
            .map(|edit| !exists(&edit.record_id))
            .unwrap_or(false);
        if gone {
            log::debug!("Edited record disappeared, dropping draft");
            self.active = None;
        }
        gone
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Field {
        Name,
        Budget,
    }

    impl EditableField for Field {
        fn name(&self) -> &'static str {
            match self {
                Field::Name => "name",
                Field::Budget => "totalBudget",
            }
        }

        fn kind(&self) -> FieldKind {
            match self {
                Field::Name => FieldKind::Trimmed,
                Field::Budget => FieldKind::Number,
            }
        }

        fn skip_empty(&self) -> bool {
            matches!(self, Field::Budget)
        }
    }

    #[test]
    fn test_parse_float_prefix() {
        assert_eq!(parse_float_prefix("12.5kg"), Some(12.5));
        assert_eq!(parse_float_prefix("  -3"), Some(-3.0));
        assert_eq!(parse_float_prefix(".5"), Some(0.5));
        assert_eq!(parse_float_prefix("1e3x"), Some(1000.0));
        assert_eq!(parse_float_prefix("2e"), Some(2.0));
        assert_eq!(parse_float_prefix("abc"), None);
        assert_eq!(parse_float_prefix("."), None);
        assert_eq!(parse_float_prefix(""), None);
    }

    #[test]
    fn test_parse_int_prefix() {
        assert_eq!(parse_int_prefix("42 tasks"), Some(42));
        assert_eq!(parse_int_prefix("7.9"), Some(7));
        assert_eq!(parse_int_prefix("-x"), None);
    }

    #[test]
    fn test_coercion() {
        assert_eq!(coerce(FieldKind::Number, "abc"), json!(0));
        assert_eq!(coerce(FieldKind::Number, "1500.50"), json!(1500.5));
        assert_eq!(coerce(FieldKind::Percent, "140"), json!(100));
        assert_eq!(coerce(FieldKind::Percent, "-5"), json!(0));
        assert_eq!(coerce(FieldKind::List, " Ana, ,Raj ,"), json!(["Ana", "Raj"]));
        assert_eq!(coerce(FieldKind::Date, " 2024-05-01 "), json!(" 2024-05-01 "));
        assert_eq!(coerce(FieldKind::Money, "5000"), json!("$5000"));
        assert_eq!(coerce(FieldKind::Money, "$5000"), json!("$5000"));
    }

    #[test]
    fn test_start_on_other_cell_force_commits() {
        let mut session = CellEditSession::new();
        session.start("p1", Field::Name, "Old".to_string());
        session.change_draft("Draft");

        match session.start("p2", Field::Budget, "10".to_string()) {
            StartOutcome::Started { forced: Some(commit) } => {
                assert_eq!(commit.record_id, "p1");
                assert_eq!(commit.value, "Draft");
                assert_eq!(commit.original, "Old");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(session.is_editing("p2", Field::Budget));
        assert!(!session.is_editing("p1", Field::Name));
    }

    #[test]
    fn test_start_same_cell_is_noop() {
        let mut session = CellEditSession::new();
        session.start("p1", Field::Name, "Old".to_string());
        session.change_draft("Typed");
        assert_eq!(
            session.start("p1", Field::Name, "Old".to_string()),
            StartOutcome::AlreadyEditing
        );
        assert_eq!(session.draft(), Some("Typed"));
    }

    #[test]
    fn test_enter_then_blur_commits_once() {
        let mut session = CellEditSession::new();
        session.start("p1", Field::Name, "Old".to_string());
        session.change_draft(" New ");
        let commit = session.key(EditKey::Enter).unwrap();
        assert_eq!(commit.coerced(), json!("New"));
        assert!(session.blur().is_none());
        assert!(session.active().is_none());
    }

    #[test]
    fn test_escape_discards_and_blur_does_nothing() {
        let mut session = CellEditSession::new();
        session.start("p1", Field::Name, "Old".to_string());
        session.change_draft("Something else");
        assert!(session.key(EditKey::Escape).is_none());
        assert!(session.blur().is_none());
        assert!(!session.cancel());
    }

    #[test]
    fn test_plain_blur_commits() {
        let mut session = CellEditSession::new();
        session.start("c1", Field::Budget, "100".to_string());
        session.change_draft("");
        let commit = session.blur().unwrap();
        assert!(!commit.should_write());
    }

    #[test]
    fn test_cancel_if_missing() {
        let mut session = CellEditSession::new();
        session.start("gone", Field::Name, String::new());
        assert!(!session.cancel_if_missing(|id| id == "gone"));
        assert!(session.cancel_if_missing(|_| false));
        assert!(session.active().is_none());
    }
}
