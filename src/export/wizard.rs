//! Confirmation wizard: settles one key per step until the session reaches
//! `AllConfirmed`.

use super::prompt::{KeyCheck, Notice, Prompter, StepChoice, StepView};
use super::resolve::{KeyResolution, create_new, find_matches, key_exists, resolve_automatic};
use super::session::ExportSession;
use crate::client::IssueTracker;
use crate::error::{Result, XportError};
use crate::util::pause;
use std::time::Duration;
use tracing::info;

/// How keys are confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmMode {
    Manual,
    /// No operator input; `delay` is slept between steps.
    Automatic { delay: Duration },
}

/// Resolve every remaining test without operator input.
///
/// `observe` is called after each step with the position and outcome.
///
/// # Errors
///
/// Returns `InvalidTransition` if the session is past confirmation.
pub fn run_automatic(
    session: &mut ExportSession,
    tracker: &dyn IssueTracker,
    delay: Duration,
    observe: &mut dyn FnMut(usize, &KeyResolution),
) -> Result<()> {
    while let Some((index, test)) = session.current() {
        let resolution = resolve_automatic(tracker, test, session.original_key(index));
        observe(index, &resolution);
        session.confirm(resolution)?;
        if session.current().is_some() {
            pause(delay);
        }
    }
    session.finish_confirmation();
    Ok(())
}

/// Walk the operator through every remaining test.
///
/// # Errors
///
/// Returns `XportError::Aborted` when the operator quits, or an input error.
pub fn run_manual(
    session: &mut ExportSession,
    tracker: &dyn IssueTracker,
    prompter: &mut dyn Prompter,
) -> Result<()> {
    while let Some((index, test)) = session.current() {
        let key = test.key.clone();
        let summary = test.fields.summary.clone();
        let description = test.fields.description.clone();
        let original_key = session.original_key(index).to_string();

        let check = if key.is_empty() {
            KeyCheck::NoKey
        } else if key_exists(tracker, &key) {
            KeyCheck::Exists
        } else {
            KeyCheck::NotFound
        };
        let matched = if check == KeyCheck::Exists {
            None
        } else {
            find_matches(tracker, &summary, &description).into_iter().next()
        };

        let view = StepView {
            position: index + 1,
            total: session.len(),
            key: &key,
            summary: &summary,
            description: &description,
            check,
            matched: matched.as_deref(),
            key_url: (check == KeyCheck::Exists).then(|| tracker.browse_url(&key)),
            match_url: matched.as_deref().map(|m| tracker.browse_url(m)),
        };

        let resolution = loop {
            match prompter.choose(&view)? {
                StepChoice::Keep if check == KeyCheck::Exists => {
                    break KeyResolution::Existing(key.clone());
                }
                StepChoice::Keep => prompter.notify(
                    Notice::Error,
                    "This key is not valid in Jira; accept the match, enter a key or create a new issue",
                ),
                StepChoice::AcceptMatch => match &matched {
                    Some(found) => break KeyResolution::Matched(found.clone()),
                    None => prompter.notify(Notice::Error, "There is no match to accept"),
                },
                StepChoice::EnterKey(entered) => {
                    if key_exists(tracker, &entered) {
                        prompter.notify(Notice::Success, &format!("Valid Jira key set: {entered}"));
                        break KeyResolution::Manual(entered);
                    }
                    let err = XportError::KeyNotFound { key: entered };
                    prompter.notify(Notice::Error, &err.to_string());
                    if let Some(hint) = err.suggestion() {
                        prompter.notify(Notice::Info, hint);
                    }
                }
                StepChoice::CreateNew => match create_new(&[key.as_str(), original_key.as_str()]) {
                    KeyResolution::Blocked => {
                        let err = XportError::MissingProjectPrefix { key: key.clone() };
                        prompter.notify(Notice::Error, &err.to_string());
                        if let Some(hint) = err.suggestion() {
                            prompter.notify(Notice::Info, hint);
                        }
                    }
                    created => {
                        prompter.notify(Notice::Success, &created.describe());
                        break created;
                    }
                },
                StepChoice::Skip => {
                    prompter.notify(Notice::Warning, "Test skipped; it will not be uploaded");
                    break KeyResolution::Blocked;
                }
                StepChoice::Quit => return Err(XportError::Aborted),
            }
        };

        info!(position = index + 1, outcome = %resolution.describe(), "Key confirmed");
        session.confirm(resolution)?;
    }
    session.finish_confirmation();
    Ok(())
}
