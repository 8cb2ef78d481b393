//! The control abstraction.
//!
//! A control is a server-side view-model node. It has a process-unique
//! identity, enabled/error state, a single optional [`Binding`] to a backend
//! object, and a generic property/command surface answered by its type's
//! [`MetaObject`].
//!
//! # Binding lifecycle
//!
//! [`Control::set_binding`] runs, for any assignment that differs from the
//! current binding:
//!
//! 1. [`Control::check_binding`] (skipped when unbinding); a failure leaves
//!    the control untouched
//! 2. [`Control::before_binding_changed`], with the old binding current
//! 3. assignment
//! 4. [`Control::after_binding_changed`], with the new binding current
//! 5. a `"Binding"` property-changed notification
//!
//! Assigning a binding equal to the current one does nothing.
//!
//! # Ownership
//!
//! Controls are shared as [`ControlRef`] (`Arc<dyn Control>`) and built with
//! [`Arc::new_cyclic`], so that [`ControlBase`] and the control's commands can
//! hold a weak reference back to their owner.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::binding::Binding;
use crate::command::Command;
use crate::error::Result;
use crate::logging::targets;
use crate::meta::{MetaObject, PropertyDescriptor, PropertyKind, PropertyValue};
use crate::property::Property;
use crate::signal::Signal;

static CONTROL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a control.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlId(u64);

impl ControlId {
    fn next() -> Self {
        Self(CONTROL_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw identity value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Layout slot a control asks its container for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Region {
    Top = 1,
    Bottom = 2,
    Right = 3,
    Left = 4,
    #[default]
    Center = 5,
    Leading = 6,
    Trailing = 7,
}

impl Region {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        Some(match value {
            1 => Self::Top,
            2 => Self::Bottom,
            3 => Self::Right,
            4 => Self::Left,
            5 => Self::Center,
            6 => Self::Leading,
            7 => Self::Trailing,
            _ => return None,
        })
    }
}

/// Payload of a control's `property_changed` signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PropertyChanged {
    pub source: ControlId,
    pub name: &'static str,
}

/// Shared handle to any control.
pub type ControlRef = Arc<dyn Control>;

/// State every control carries.
pub struct ControlBase {
    id: ControlId,
    this: Weak<dyn Control>,
    enabled: Property<bool>,
    in_error: Property<bool>,
    error_message: Property<Option<String>>,
    region: Property<Region>,
    tooltip: Property<Option<String>>,
    binding: Property<Option<Binding>>,
    property_changed: Signal<PropertyChanged>,
    refresh: Command,
    close: Command,
}

impl ControlBase {
    /// Create the base state for the control being built by
    /// [`Arc::new_cyclic`].
    pub fn new<T: Control>(this: &Weak<T>) -> Self {
        let this: Weak<dyn Control> = this.clone();
        let refresh = {
            let owner = this.clone();
            Command::new("Refresh", true, move |command, _| {
                let Some(control) = owner.upgrade() else {
                    return Ok(());
                };
                command.set_can_execute(false);
                let result = control.refresh_control();
                command.set_can_execute(true);
                result
            })
        };
        let close = {
            let owner = this.clone();
            Command::new("Close", true, move |_, _| match owner.upgrade() {
                Some(control) => control.close_control(),
                None => Ok(()),
            })
        };

        Self {
            id: ControlId::next(),
            this,
            enabled: Property::new(false),
            in_error: Property::new(false),
            error_message: Property::new(None),
            region: Property::new(Region::default()),
            tooltip: Property::new(None),
            binding: Property::new(None),
            property_changed: Signal::new(),
            refresh,
            close,
        }
    }

    pub fn id(&self) -> ControlId {
        self.id
    }

    /// Strong handle to the owning control, if it is still alive.
    pub fn this(&self) -> Option<ControlRef> {
        self.this.upgrade()
    }

    /// Signal emitted after any declared property changes.
    pub fn property_changed(&self) -> &Signal<PropertyChanged> {
        &self.property_changed
    }

    /// Emit a property-changed notification for `name`.
    pub fn notify(&self, name: &'static str) {
        self.property_changed.emit(PropertyChanged {
            source: self.id,
            name,
        });
    }

    /// Set a property cell and notify when it changed.
    pub fn update<T: Clone + PartialEq>(&self, property: &Property<T>, value: T, name: &'static str) -> bool {
        let changed = property.set(value);
        if changed {
            self.notify(name);
        }
        changed
    }

    pub fn enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.update(&self.enabled, enabled, "Enabled");
    }

    pub fn in_error(&self) -> bool {
        self.in_error.get()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error_message.get()
    }

    /// Put the control into the error state with a message.
    pub fn set_error(&self, message: impl Into<String>) {
        self.update(&self.error_message, Some(message.into()), "ErrorMessage");
        self.update(&self.in_error, true, "InError");
    }

    /// Clear the error state.
    pub fn reset_error(&self) {
        self.update(&self.error_message, None, "ErrorMessage");
        self.update(&self.in_error, false, "InError");
    }

    pub fn region(&self) -> Region {
        self.region.get()
    }

    pub fn set_region(&self, region: Region) {
        self.update(&self.region, region, "Region");
    }

    pub fn tooltip(&self) -> Option<String> {
        self.tooltip.get()
    }

    pub fn set_tooltip(&self, tooltip: Option<String>) {
        self.update(&self.tooltip, tooltip, "Tooltip");
    }

    pub fn binding(&self) -> Option<Binding> {
        self.binding.get()
    }

    pub fn refresh_command(&self) -> &Command {
        &self.refresh
    }

    pub fn close_command(&self) -> &Command {
        &self.close
    }
}

impl fmt::Debug for ControlBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlBase")
            .field("id", &self.id)
            .field("enabled", &self.enabled())
            .field("in_error", &self.in_error())
            .field("binding", &self.binding())
            .finish()
    }
}

/// A view-model node.
///
/// Implementors provide [`base`](Control::base),
/// [`meta_object`](Control::meta_object) and [`as_any`](Control::as_any),
/// and override the binding and command hooks they need. Everything else
/// is provided.
pub trait Control: Any + Send + Sync {
    fn base(&self) -> &ControlBase;

    /// The type's metadata table, built once per process.
    fn meta_object(&self) -> &'static MetaObject;

    fn as_any(&self) -> &dyn Any;

    /// Validate a prospective binding. Runs before any state changes.
    fn check_binding(&self, _binding: &Binding) -> Result<()> {
        Ok(())
    }

    /// Runs while the old binding is still current.
    fn before_binding_changed(&self) -> Result<()> {
        Ok(())
    }

    /// Runs once the new binding is current.
    fn after_binding_changed(&self) -> Result<()> {
        Ok(())
    }

    /// Body of the `Refresh` command.
    fn refresh_control(&self) -> Result<()> {
        Ok(())
    }

    /// Body of the `Close` command.
    fn close_control(&self) -> Result<()> {
        Ok(())
    }

    fn id(&self) -> ControlId {
        self.base().id()
    }

    fn binding(&self) -> Option<Binding> {
        self.base().binding()
    }

    /// Assign or clear the binding, running the lifecycle hooks.
    fn set_binding(&self, binding: Option<Binding>) -> Result<()> {
        let base = self.base();
        let current = base.binding();
        if current == binding {
            return Ok(());
        }
        if let Some(new) = &binding {
            self.check_binding(new)?;
        }

        tracing::debug!(
            target: targets::BINDING,
            control = %base.id(),
            type_name = self.meta_object().type_name(),
            from = ?current,
            to = ?binding,
            "binding changed"
        );

        self.before_binding_changed()?;
        base.binding.set_silent(binding);
        self.after_binding_changed()?;
        base.notify("Binding");
        Ok(())
    }

    /// Declared property names.
    fn properties(&self) -> Vec<&'static str> {
        self.meta_object().property_names()
    }

    fn has_property(&self, name: &str) -> bool {
        self.meta_object().has_property(name)
    }

    fn get_property_value(&self, name: &str) -> Result<PropertyValue> {
        self.meta_object().read_property(self.as_any(), name)
    }

    fn set_property_value(&self, name: &str, value: PropertyValue) -> Result<()> {
        self.meta_object().write_property(self.as_any(), name, value)
    }

    fn get_property_type(&self, name: &str) -> Result<PropertyKind> {
        self.meta_object().descriptor(name).map(|d| d.kind)
    }

    fn get_property_read_only(&self, name: &str) -> Result<bool> {
        self.meta_object().descriptor(name).map(|d| d.read_only)
    }

    fn get_property_descriptor(&self, name: &str) -> Result<PropertyDescriptor> {
        self.meta_object().descriptor(name)
    }

    /// Declared command names.
    fn commands(&self) -> Vec<&'static str> {
        self.meta_object().command_names()
    }

    fn get_command(&self, name: &str) -> Result<&Command> {
        self.meta_object().command(self.as_any(), name)
    }

    /// Child controls reachable through declared properties.
    ///
    /// Recomputed on every call and de-duplicated by identity.
    fn controls(&self) -> Vec<ControlRef> {
        let mut controls: Vec<ControlRef> = Vec::new();
        let mut push = |control: ControlRef| {
            if !controls.iter().any(|c| c.id() == control.id()) {
                controls.push(control);
            }
        };

        for name in self.properties() {
            match self.get_property_value(name) {
                Ok(PropertyValue::Control(control)) => push(control),
                Ok(PropertyValue::ControlList(list)) => list.into_iter().for_each(&mut push),
                _ => {}
            }
        }
        controls
    }
}

impl PartialEq for dyn Control {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for dyn Control {}

impl Hash for dyn Control {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for dyn Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.meta_object().type_name(), self.id())
    }
}

/// Borrow a control as its concrete type.
pub fn control_cast<T: Control>(control: &dyn Control) -> Option<&T> {
    control.as_any().downcast_ref::<T>()
}

/// Convert a shared control into a shared handle of its concrete type.
pub fn control_downcast<T: Control>(control: ControlRef) -> Option<Arc<T>> {
    let any: Arc<dyn Any + Send + Sync> = control;
    any.downcast::<T>().ok()
}

static_assertions::assert_impl_all!(ControlBase: Send, Sync);
static_assertions::assert_impl_all!(ControlRef: Send, Sync);
