//! Export session: the selected payload plus a cursor over it.
//!
//! States advance `Unconfirmed(0) .. Unconfirmed(n-1)`, then
//! `AllConfirmed`, `AttachmentsChecked` and `Uploaded`. Arriving at the end
//! of the list a second time is a no-op.

use super::resolve::KeyResolution;
use crate::error::{Result, XportError};
use crate::model::ExportedTest;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "index", rename_all = "snake_case")]
pub enum SessionState {
    /// Waiting for the key of the test at this index.
    Unconfirmed(usize),
    AllConfirmed,
    AttachmentsChecked,
    Uploaded,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unconfirmed(index) => write!(f, "unconfirmed({index})"),
            Self::AllConfirmed => f.write_str("all_confirmed"),
            Self::AttachmentsChecked => f.write_str("attachments_checked"),
            Self::Uploaded => f.write_str("uploaded"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportSession {
    tests: Vec<ExportedTest>,
    original_keys: Vec<String>,
    resolutions: Vec<Option<KeyResolution>>,
    state: SessionState,
}

impl ExportSession {
    #[must_use]
    pub fn new(tests: Vec<ExportedTest>) -> Self {
        let original_keys = tests.iter().map(|test| test.key.clone()).collect();
        let resolutions = vec![None; tests.len()];
        Self {
            tests,
            original_keys,
            resolutions,
            state: SessionState::Unconfirmed(0),
        }
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Index and test under the cursor, while confirmation is running.
    #[must_use]
    pub fn current(&self) -> Option<(usize, &ExportedTest)> {
        match self.state {
            SessionState::Unconfirmed(index) => self.tests.get(index).map(|test| (index, test)),
            _ => None,
        }
    }

    /// Key the test at `index` had when the session started.
    #[must_use]
    pub fn original_key(&self, index: usize) -> &str {
        self.original_keys.get(index).map_or("", String::as_str)
    }

    /// Settle the key of the test under the cursor and advance.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` when no test is waiting for confirmation.
    pub fn confirm(&mut self, resolution: KeyResolution) -> Result<SessionState> {
        let Some((index, _)) = self.current() else {
            return Err(self.invalid("confirm"));
        };
        resolution.apply(&mut self.tests[index]);
        self.resolutions[index] = Some(resolution);
        self.state = SessionState::Unconfirmed(index + 1);
        self.finish_confirmation();
        Ok(self.state)
    }

    /// Move to `AllConfirmed` once the cursor has passed the last test.
    /// Returns whether this call made the transition.
    pub fn finish_confirmation(&mut self) -> bool {
        match self.state {
            SessionState::Unconfirmed(index) if index >= self.tests.len() => {
                self.state = SessionState::AllConfirmed;
                true
            }
            _ => false,
        }
    }

    /// # Errors
    ///
    /// Returns `InvalidTransition` unless every key is confirmed.
    pub fn mark_attachments_checked(&mut self) -> Result<()> {
        match self.state {
            SessionState::AllConfirmed => {
                self.state = SessionState::AttachmentsChecked;
                Ok(())
            }
            _ => Err(self.invalid("attachments_checked")),
        }
    }

    /// # Errors
    ///
    /// Returns `InvalidTransition` unless attachments were checked.
    pub fn mark_uploaded(&mut self) -> Result<()> {
        match self.state {
            SessionState::AttachmentsChecked => {
                self.state = SessionState::Uploaded;
                Ok(())
            }
            _ => Err(self.invalid("uploaded")),
        }
    }

    fn invalid(&self, to: &str) -> XportError {
        XportError::InvalidTransition {
            from: self.state.to_string(),
            to: to.to_string(),
        }
    }

    #[must_use]
    pub fn tests(&self) -> &[ExportedTest] {
        &self.tests
    }

    /// Mutable payload for attachment remapping. Keys are settled by then.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` while keys are still being confirmed.
    pub fn tests_mut(&mut self) -> Result<&mut [ExportedTest]> {
        match self.state {
            SessionState::AllConfirmed | SessionState::AttachmentsChecked => Ok(&mut self.tests),
            _ => Err(self.invalid("edit payload")),
        }
    }

    #[must_use]
    pub fn resolutions(&self) -> &[Option<KeyResolution>] {
        &self.resolutions
    }

    /// Tests that can go to Xray: a key, or a project for a new issue.
    #[must_use]
    pub fn uploadable(&self) -> Vec<ExportedTest> {
        self.tests
            .iter()
            .filter(|test| test.is_uploadable())
            .cloned()
            .collect()
    }

    /// Tests left without key and without project.
    #[must_use]
    pub fn blocked(&self) -> Vec<&ExportedTest> {
        self.tests
            .iter()
            .filter(|test| !test.is_uploadable())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExportFields, TestType};
    use serde_json::Value;

    fn item(key: &str) -> ExportedTest {
        ExportedTest {
            key: key.to_string(),
            kind: Value::Null,
            generic: Value::Null,
            cucumber: Value::Null,
            cucumber_type: Value::Null,
            id: "1".to_string(),
            test_version_id: String::new(),
            fields: ExportFields::default(),
            steps: Vec::new(),
            xray_issue_type: String::new(),
            xray_testtype: TestType::Manual,
            xray_preconditions: Vec::new(),
            xray_test_sets: Vec::new(),
        }
    }

    #[test]
    fn walks_every_state_in_order() {
        let mut session = ExportSession::new(vec![item("A-1"), item("B-2")]);
        assert_eq!(session.state(), SessionState::Unconfirmed(0));
        assert!(session.mark_attachments_checked().is_err());

        session
            .confirm(KeyResolution::Existing("A-1".to_string()))
            .expect("first");
        assert_eq!(session.state(), SessionState::Unconfirmed(1));
        let state = session
            .confirm(KeyResolution::CreateNew {
                project: "B".to_string(),
            })
            .expect("second");
        assert_eq!(state, SessionState::AllConfirmed);
        assert!(session.confirm(KeyResolution::Blocked).is_err());

        session.mark_attachments_checked().expect("checked");
        session.mark_uploaded().expect("uploaded");
        assert_eq!(session.state(), SessionState::Uploaded);
        assert_eq!(session.original_key(1), "B-2");
        assert!(session.tests()[1].key.is_empty());
    }

    #[test]
    fn all_confirmed_is_reached_once() {
        let mut session = ExportSession::new(Vec::new());
        assert!(session.finish_confirmation());
        assert!(!session.finish_confirmation());
        assert_eq!(session.state(), SessionState::AllConfirmed);
    }

    #[test]
    fn blocked_tests_are_not_uploadable() {
        let mut session = ExportSession::new(vec![item(""), item("A-1")]);
        session.confirm(KeyResolution::Blocked).expect("blocked");
        session
            .confirm(KeyResolution::Manual("A-7".to_string()))
            .expect("manual");
        assert_eq!(session.blocked().len(), 1);
        let uploadable = session.uploadable();
        assert_eq!(uploadable.len(), 1);
        assert_eq!(uploadable[0].key, "A-7");
    }

    #[test]
    fn payload_is_locked_during_confirmation() {
        let mut session = ExportSession::new(vec![item("A-1")]);
        assert!(session.tests_mut().is_err());
        session
            .confirm(KeyResolution::Existing("A-1".to_string()))
            .expect("confirm");
        assert!(session.tests_mut().is_ok());
    }
}
