//! Start / restart / stop power controls. Stopping a server that is already
//! stopping becomes a kill, which has to be confirmed first.

use crate::session::{SessionView, Transport};
use crate::types::{OutboundRequest, PowerAction, PowerStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerButton {
    Start,
    Restart,
    Stop,
}

#[derive(Debug, Default)]
pub struct PowerControls {
    confirm_kill: bool,
}

impl PowerControls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(button: PowerButton, status: Option<PowerStatus>) -> bool {
        match button {
            PowerButton::Start => status == Some(PowerStatus::Offline),
            PowerButton::Restart => status.is_some(),
            PowerButton::Stop => status != Some(PowerStatus::Offline),
        }
    }

    /// Action the stop button issues for the current status.
    pub fn stop_action(status: Option<PowerStatus>) -> PowerAction {
        if status == Some(PowerStatus::Stopping) {
            PowerAction::Kill
        } else {
            PowerAction::Stop
        }
    }

    pub fn confirming_kill(&self) -> bool {
        self.confirm_kill
    }

    /// Close the kill dialog once the server is down.
    pub fn observe_status(&mut self, status: Option<PowerStatus>) {
        if status == Some(PowerStatus::Offline) {
            self.confirm_kill = false;
        }
    }

    /// Handle a button press. Returns the action sent, if any.
    pub fn press(
        &mut self,
        button: PowerButton,
        view: &SessionView,
        transport: &dyn Transport,
    ) -> Option<PowerAction> {
        if !Self::enabled(button, view.status) || view.lock_notice().is_some() {
            return None;
        }
        let action = match button {
            PowerButton::Start => PowerAction::Start,
            PowerButton::Restart => PowerAction::Restart,
            PowerButton::Stop => Self::stop_action(view.status),
        };
        if action == PowerAction::Kill {
            self.confirm_kill = true;
            return None;
        }
        self.send(action, view, transport)
    }

    pub fn confirm(&mut self, view: &SessionView, transport: &dyn Transport) -> Option<PowerAction> {
        if !self.confirm_kill {
            return None;
        }
        self.send(PowerAction::Kill, view, transport)
    }

    pub fn dismiss(&mut self) {
        self.confirm_kill = false;
    }

    fn send(
        &mut self,
        action: PowerAction,
        view: &SessionView,
        transport: &dyn Transport,
    ) -> Option<PowerAction> {
        if !view.connection.has_session || view.lock_notice().is_some() {
            return None;
        }
        self.confirm_kill = false;
        tracing::info!(action = action.as_str(), "power action");
        if let Err(e) = transport.send(OutboundRequest::SetState(action)) {
            tracing::warn!(error = %e, action = action.as_str(), "power action not sent");
        }
        Some(action)
    }
}
