//! Operator interaction for the confirmation wizard.
//!
//! [`TerminalPrompter`] reads answers from stdin and writes to stderr so
//! stdout stays clean for `--json`. [`ScriptedPrompter`] replays canned
//! answers in tests.

use crate::error::{Result, XportError};
use crossterm::style::Stylize;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

/// What Jira said about the key under review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCheck {
    Exists,
    NotFound,
    NoKey,
}

/// Everything shown for one wizard step.
#[derive(Debug, Clone)]
pub struct StepView<'a> {
    /// 1-based position.
    pub position: usize,
    pub total: usize,
    pub key: &'a str,
    pub summary: &'a str,
    pub description: &'a str,
    pub check: KeyCheck,
    /// First summary/description match, when the key did not check out.
    pub matched: Option<&'a str>,
    pub key_url: Option<String>,
    pub match_url: Option<String>,
}

/// Operator decision for one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepChoice {
    /// Keep the current key (only when it exists).
    Keep,
    AcceptMatch,
    /// Use this key after validating it.
    EnterKey(String),
    CreateNew,
    /// Leave the test out of the upload.
    Skip,
    Quit,
}

/// Parse a wizard answer. Empty input keeps the key.
#[must_use]
pub fn parse_choice(line: &str) -> StepChoice {
    match line.trim() {
        "" | "k" | "K" => StepChoice::Keep,
        "m" | "M" => StepChoice::AcceptMatch,
        "n" | "N" => StepChoice::CreateNew,
        "s" | "S" => StepChoice::Skip,
        "q" | "Q" => StepChoice::Quit,
        key => StepChoice::EnterKey(key.to_uppercase()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Info,
    Success,
    Warning,
    Error,
}

pub trait Prompter {
    /// Ask for a decision on the step.
    ///
    /// # Errors
    ///
    /// Returns an error if input cannot be read.
    fn choose(&mut self, view: &StepView<'_>) -> Result<StepChoice>;

    /// Ask for the comma-separated test selection.
    ///
    /// # Errors
    ///
    /// Returns an error if input cannot be read.
    fn read_selection(&mut self) -> Result<String>;

    /// Yes/no question; `false` on anything but yes.
    ///
    /// # Errors
    ///
    /// Returns an error if input cannot be read.
    fn confirm(&mut self, question: &str) -> Result<bool>;

    fn notify(&mut self, notice: Notice, message: &str);
}

/// Stdin/stderr prompter.
pub struct TerminalPrompter<R: BufRead> {
    input: R,
    color: bool,
}

impl TerminalPrompter<io::StdinLock<'static>> {
    #[must_use]
    pub fn stdin(color: bool) -> Self {
        Self {
            input: io::stdin().lock(),
            color,
        }
    }
}

impl<R: BufRead> TerminalPrompter<R> {
    pub const fn new(input: R, color: bool) -> Self {
        Self { input, color }
    }

    fn read_line(&mut self, prompt: &str) -> Result<String> {
        let mut stderr = io::stderr();
        write!(stderr, "{prompt}")?;
        stderr.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(XportError::Aborted);
        }
        Ok(line.trim().to_string())
    }

    fn heading(&self, text: &str) -> String {
        if self.color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }
}

impl<R: BufRead> Prompter for TerminalPrompter<R> {
    fn choose(&mut self, view: &StepView<'_>) -> Result<StepChoice> {
        let title = self.heading(&format!("Test {}/{}", view.position, view.total));
        eprintln!();
        eprintln!("{title}");
        eprintln!("  Key:         {}", if view.key.is_empty() { "-" } else { view.key });
        eprintln!("  Summary:     {}", view.summary);
        if !view.description.is_empty() {
            eprintln!("  Description: {}", view.description);
        }
        match view.check {
            KeyCheck::Exists => {
                self.notify(Notice::Success, &format!("Key {} exists in Jira", view.key));
                if let Some(url) = &view.key_url {
                    eprintln!("  {url}");
                }
            }
            KeyCheck::NotFound => self.notify(Notice::Info, "Key not found in Jira"),
            KeyCheck::NoKey => self.notify(Notice::Info, "Test has no key"),
        }
        match (view.matched, &view.match_url) {
            (Some(matched), Some(url)) => {
                self.notify(Notice::Info, &format!("Found matching issue {matched}: {url}"));
            }
            (Some(matched), None) => {
                self.notify(Notice::Info, &format!("Found matching issue {matched}"));
            }
            _ if view.check != KeyCheck::Exists => self.notify(
                Notice::Warning,
                "No matching issue found; enter a key or create a new issue",
            ),
            _ => {}
        }

        let mut options = Vec::new();
        if view.check == KeyCheck::Exists {
            options.push("[Enter] keep");
        }
        if view.matched.is_some() {
            options.push("[m] accept match");
        }
        options.extend(["[KEY] set key", "[n] create new", "[s] skip", "[q] quit"]);
        let line = self.read_line(&format!("  {}: ", options.join("  ")))?;
        Ok(parse_choice(&line))
    }

    fn read_selection(&mut self) -> Result<String> {
        self.read_line("Keys to export (comma-separated): ")
    }

    fn confirm(&mut self, question: &str) -> Result<bool> {
        let answer = self.read_line(&format!("{question} [y/N]: "))?;
        Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
    }

    fn notify(&mut self, notice: Notice, message: &str) {
        let line = if self.color {
            match notice {
                Notice::Info => format!("  {message}").cyan().to_string(),
                Notice::Success => format!("  ✓ {message}").green().to_string(),
                Notice::Warning => format!("  ⚠ {message}").yellow().to_string(),
                Notice::Error => format!("  ✗ {message}").red().to_string(),
            }
        } else {
            let tag = match notice {
                Notice::Info => "",
                Notice::Success => "ok: ",
                Notice::Warning => "warning: ",
                Notice::Error => "error: ",
            };
            format!("  {tag}{message}")
        };
        eprintln!("{line}");
    }
}

/// Canned answers, consumed in order. Running out of step answers quits.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    choices: VecDeque<StepChoice>,
    selection: String,
    confirmations: VecDeque<bool>,
    /// Every step shown, as `(position, key, matched)`.
    pub shown: Vec<(usize, String, Option<String>)>,
    pub notices: Vec<(Notice, String)>,
}

impl ScriptedPrompter {
    #[must_use]
    pub fn new(choices: Vec<StepChoice>) -> Self {
        Self {
            choices: choices.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_selection(mut self, selection: &str) -> Self {
        self.selection = selection.to_string();
        self
    }

    #[must_use]
    pub fn with_confirmations(mut self, answers: &[bool]) -> Self {
        self.confirmations = answers.iter().copied().collect();
        self
    }

    /// Whether any notice of this level mentions `needle`.
    #[must_use]
    pub fn noticed(&self, notice: Notice, needle: &str) -> bool {
        self.notices
            .iter()
            .any(|(level, message)| *level == notice && message.contains(needle))
    }
}

impl Prompter for ScriptedPrompter {
    fn choose(&mut self, view: &StepView<'_>) -> Result<StepChoice> {
        self.shown.push((
            view.position,
            view.key.to_string(),
            view.matched.map(str::to_string),
        ));
        Ok(self.choices.pop_front().unwrap_or(StepChoice::Quit))
    }

    fn read_selection(&mut self) -> Result<String> {
        Ok(self.selection.clone())
    }

    fn confirm(&mut self, _question: &str) -> Result<bool> {
        Ok(self.confirmations.pop_front().unwrap_or(false))
    }

    fn notify(&mut self, notice: Notice, message: &str) {
        self.notices.push((notice, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_answers() {
        assert_eq!(parse_choice(""), StepChoice::Keep);
        assert_eq!(parse_choice(" m "), StepChoice::AcceptMatch);
        assert_eq!(parse_choice("N"), StepChoice::CreateNew);
        assert_eq!(parse_choice("s"), StepChoice::Skip);
        assert_eq!(parse_choice("q"), StepChoice::Quit);
        assert_eq!(parse_choice("proj-12"), StepChoice::EnterKey("PROJ-12".to_string()));
    }

    #[test]
    fn terminal_prompter_reads_lines() {
        let input = io::Cursor::new("proj-3\nyes\n");
        let mut prompter = TerminalPrompter::new(input, false);
        let view = StepView {
            position: 1,
            total: 1,
            key: "",
            summary: "Login",
            description: "",
            check: KeyCheck::NoKey,
            matched: None,
            key_url: None,
            match_url: None,
        };
        assert_eq!(
            prompter.choose(&view).expect("choice"),
            StepChoice::EnterKey("PROJ-3".to_string())
        );
        assert!(prompter.confirm("Upload?").expect("answer"));
        assert!(matches!(prompter.read_selection(), Err(XportError::Aborted)));
    }
}
