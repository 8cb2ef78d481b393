//! Executable behavior attached to a control.
//!
//! A [`Command`] pairs an action with an enable gate. [`Command::execute`]
//! is a no-op while the gate is closed; otherwise the action runs with the
//! supplied parameter controls and may flip the gate itself (the base
//! `Refresh` command disables itself while it runs).
//!
//! Commands are owned by one control and reach back to it through a weak
//! reference, see [`Command::for_owner`].

use std::fmt;
use std::sync::Weak;

use crate::control::ControlRef;
use crate::error::Result;
use crate::logging::targets;
use crate::property::Property;
use crate::signal::Signal;

type CommandAction = Box<dyn Fn(&Command, &[ControlRef]) -> Result<()> + Send + Sync>;

/// A named, gated action.
pub struct Command {
    name: &'static str,
    can_execute: Property<bool>,
    can_execute_changed: Signal<bool>,
    action: CommandAction,
}

impl Command {
    /// Create a command from an action closure.
    pub fn new<F>(name: &'static str, can_execute: bool, action: F) -> Self
    where
        F: Fn(&Command, &[ControlRef]) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name,
            can_execute: Property::new(can_execute),
            can_execute_changed: Signal::new(),
            action: Box::new(action),
        }
    }

    /// Create a command whose action runs against its owner.
    ///
    /// Once the owner is dropped, executing the command does nothing.
    pub fn for_owner<T, F>(name: &'static str, can_execute: bool, owner: &Weak<T>, run: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T, &Command, &[ControlRef]) -> Result<()> + Send + Sync + 'static,
    {
        let owner = owner.clone();
        Self::new(name, can_execute, move |command, parameters| {
            match owner.upgrade() {
                Some(owner) => run(&owner, command, parameters),
                None => {
                    tracing::trace!(target: targets::COMMAND, command = command.name, "owner dropped");
                    Ok(())
                }
            }
        })
    }

    /// The registered command name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the command may currently execute.
    pub fn can_execute(&self) -> bool {
        self.can_execute.get()
    }

    /// Open or close the gate. Emits `can_execute_changed` on a flip.
    pub fn set_can_execute(&self, can_execute: bool) {
        if self.can_execute.set(can_execute) {
            tracing::trace!(target: targets::COMMAND, command = self.name, can_execute, "gate changed");
            self.can_execute_changed.emit(can_execute);
        }
    }

    /// Signal emitted whenever the gate flips.
    pub fn can_execute_changed(&self) -> &Signal<bool> {
        &self.can_execute_changed
    }

    /// Run the action if the gate is open.
    #[tracing::instrument(skip_all, target = "trellis_core::command", level = "trace", fields(command = self.name))]
    pub fn execute(&self, parameters: &[ControlRef]) -> Result<()> {
        if !self.can_execute() {
            tracing::trace!(target: targets::COMMAND, "command disabled, skipping");
            return Ok(());
        }
        (self.action)(self, parameters)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("can_execute", &self.can_execute())
            .finish()
    }
}

static_assertions::assert_impl_all!(Command: Send, Sync);
