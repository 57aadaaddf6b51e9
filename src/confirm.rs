//! Destructive-Action Confirmation
//!
//! Two-step guard for deletes: Idle -> Confirming -> InProgress -> Done -> Idle.
//! Cancel leaves Confirming without side effects; a failure drops straight
//! back to Idle.

/// Where the flow currently is
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmState<A> {
    Idle,
    /// Waiting for the user to confirm `action`
    Confirming { message: String, action: A },
    /// Staged feedback while the action runs
    InProgress { label: String, percent: u8 },
    /// Shown briefly, then dismissed
    Done,
}

#[derive(Debug, Clone)]
pub struct ConfirmFlow<A> {
    state: ConfirmState<A>,
    /// Bumped on every finish so a stale dismiss timer cannot close a newer Done
    epoch: u64,
    steps: Vec<(String, u8)>,
}

impl<A> Default for ConfirmFlow<A> {
    fn default() -> Self {
        Self {
            state: ConfirmState::Idle,
            epoch: 0,
            steps: Vec::new(),
        }
    }
}

impl<A: Clone> ConfirmFlow<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for confirmation. Refused while another action is running.
    pub fn ask(&mut self, message: impl Into<String>, action: A) -> bool {
        if matches!(self.state, ConfirmState::InProgress { .. }) {
            return false;
        }
        self.state = ConfirmState::Confirming {
            message: message.into(),
            action,
        };
        true
    }

    /// Back to Idle from Confirming; nothing else is touched
    pub fn cancel(&mut self) -> bool {
        if let ConfirmState::Confirming { .. } = self.state {
            self.state = ConfirmState::Idle;
            return true;
        }
        false
    }

    /// Accept the pending action and start reporting progress
    pub fn confirm(&mut self) -> Option<A> {
        let ConfirmState::Confirming { action, .. } = &self.state else {
            return None;
        };
        let action = action.clone();
        self.steps.clear();
        self.state = ConfirmState::InProgress {
            label: String::new(),
            percent: 0,
        };
        Some(action)
    }

    /// Staged progress; ignored unless the action is running
    pub fn report(&mut self, label: impl Into<String>, percent: u8) {
        if let ConfirmState::InProgress { .. } = self.state {
            let label = label.into();
            self.steps.push((label.clone(), percent));
            self.state = ConfirmState::InProgress { label, percent };
        }
    }

    /// Enter Done from InProgress; returns the epoch to hand to
    /// [`ConfirmFlow::dismiss`]
    pub fn finish(&mut self) -> Option<u64> {
        if !matches!(self.state, ConfirmState::InProgress { .. }) {
            return None;
        }
        self.steps.push(("Done!".to_string(), 100));
        self.epoch += 1;
        self.state = ConfirmState::Done;
        Some(self.epoch)
    }

    /// Leave Done if it still belongs to `epoch`
    pub fn dismiss(&mut self, epoch: u64) -> bool {
        if matches!(self.state, ConfirmState::Done) && self.epoch == epoch {
            self.state = ConfirmState::Idle;
            return true;
        }
        false
    }

    /// The running action failed
    pub fn fail(&mut self) {
        self.state = ConfirmState::Idle;
    }

    /// Drop a pending confirmation whose action matches `pred`
    pub fn cancel_if(&mut self, pred: impl Fn(&A) -> bool) -> bool {
        let pending = match &self.state {
            ConfirmState::Confirming { action, .. } => pred(action),
            _ => false,
        };
        if pending {
            self.state = ConfirmState::Idle;
        }
        pending
    }

    pub fn state(&self) -> &ConfirmState<A> {
        &self.state
    }

    pub fn message(&self) -> Option<&str> {
        match &self.state {
            ConfirmState::Confirming { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn progress(&self) -> Option<(&str, u8)> {
        match &self.state {
            ConfirmState::InProgress { label, percent } => Some((label, *percent)),
            ConfirmState::Done => Some(("Done!", 100)),
            _ => None,
        }
    }

    /// Progress reported by the last confirmed action
    pub fn steps(&self) -> &[(String, u8)] {
        &self.steps
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, ConfirmState::Idle)
    }
}
