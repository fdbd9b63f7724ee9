//! Gesture to action mapping and execution.

use std::{str::FromStr, sync::Arc, time::Duration};

use anyhow::{Result, bail};
use log::{info, warn};

use crate::{
    app_context::SharedState,
    config::KeyCfg,
    drivers::shell::Shell,
    event::{DisplayQueue, DisplayToken, Gesture},
};

/// Pause after each dispatch so a gesture is not picked up twice.
pub const DISPATCH_PAUSE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    AdvanceDisplay,
    ToggleFan,
    Reboot,
    PowerOff,
}

impl FromStr for Action {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim() {
            "none" | "" => Action::None,
            "slider" | "advance-display" => Action::AdvanceDisplay,
            "switch" | "toggle-fan" => Action::ToggleFan,
            "reboot" => Action::Reboot,
            "poweroff" | "power-off" => Action::PowerOff,
            other => bail!("unknown action '{other}'"),
        })
    }
}

impl Action {
    /// Parses a configured name, falling back to [`Action::None`].
    pub fn parse_or_none(gesture: Gesture, name: &str) -> Self {
        name.parse().unwrap_or_else(|e| {
            warn!("key.{}: {e}, using none", gesture.name());
            Action::None
        })
    }
}

/// Action bound to each gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionTable {
    click: Action,
    twice: Action,
    press: Action,
}

impl ActionTable {
    pub fn from_config(key: &KeyCfg) -> Self {
        Self {
            click: Action::parse_or_none(Gesture::Click, &key.click),
            twice: Action::parse_or_none(Gesture::Twice, &key.twice),
            press: Action::parse_or_none(Gesture::Press, &key.press),
        }
    }

    pub fn lookup(&self, gesture: Gesture) -> Action {
        match gesture {
            Gesture::None => Action::None,
            Gesture::Click => self.click,
            Gesture::Twice => self.twice,
            Gesture::Press => self.press,
        }
    }
}

/// Executes actions in the dispatch worker.
pub struct ActionDispatcher {
    table: ActionTable,
    state: Arc<SharedState>,
    display: Option<DisplayQueue>,
    shell: Arc<dyn Shell>,
}

impl ActionDispatcher {
    pub fn new(
        table: ActionTable,
        state: Arc<SharedState>,
        display: Option<DisplayQueue>,
        shell: Arc<dyn Shell>,
    ) -> Self {
        Self {
            table,
            state,
            display,
            shell,
        }
    }

    /// Runs the action bound to `gesture`.
    pub async fn dispatch(&self, gesture: Gesture) -> Result<Action> {
        let action = self.table.lookup(gesture);
        match action {
            Action::None => {}
            Action::AdvanceDisplay => {
                if let Some(display) = &self.display {
                    display.push(DisplayToken::Advance)?;
                }
            }
            Action::ToggleFan => {
                let running = self.state.toggle_running();
                info!("Fans {}", if running { "enabled" } else { "disabled" });
            }
            Action::Reboot => {
                info!("Rebooting on {} gesture", gesture.name());
                self.shell.call("reboot").await?;
            }
            Action::PowerOff => {
                info!("Powering off on {} gesture", gesture.name());
                self.shell.call("poweroff").await?;
            }
        }
        Ok(action)
    }
}
