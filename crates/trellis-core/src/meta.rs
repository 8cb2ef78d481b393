//! Per-type metadata registry for controls.
//!
//! Every concrete control type owns one [`MetaObject`]: an explicit table
//! from property and command names to typed accessors and capability
//! descriptors. The table is built once, on first use, by a
//! [`MetaObjectBuilder`] and stored in a `static OnceLock` inside the type's
//! [`Control::meta_object`] implementation:
//!
//! ```ignore
//! fn meta_object(&self) -> &'static MetaObject {
//!     static META: OnceLock<MetaObject> = OnceLock::new();
//!     META.get_or_init(|| {
//!         MetaObjectBuilder::<Self>::new("ListValue")
//!             .with_control_base()
//!             .property("Value", PropertyKind::String, |c| c.value().into())
//!             .build()
//!     })
//! }
//! ```
//!
//! All generic property and command access on a control goes through this
//! table, so every instance of a type exposes the same names.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use chrono::NaiveDateTime;

use crate::command::Command;
use crate::control::{Control, ControlRef, Region};
use crate::error::{Result, ViewModelError};
use crate::logging::targets;

/// Type tag of a declared property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Boolean,
    Int32,
    Float,
    Decimal,
    String,
    Date,
    /// A single child control.
    Control,
    /// A sequence of child controls.
    ControlList,
}

/// A property value crossing the generic get/set surface.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Null,
    Boolean(bool),
    Int32(i32),
    Float(f64),
    Decimal(f64),
    String(String),
    Date(NaiveDateTime),
    Control(ControlRef),
    ControlList(Vec<ControlRef>),
}

impl PropertyValue {
    /// The kind this value carries, `None` for [`PropertyValue::Null`].
    pub fn kind(&self) -> Option<PropertyKind> {
        Some(match self {
            Self::Null => return None,
            Self::Boolean(_) => PropertyKind::Boolean,
            Self::Int32(_) => PropertyKind::Int32,
            Self::Float(_) => PropertyKind::Float,
            Self::Decimal(_) => PropertyKind::Decimal,
            Self::String(_) => PropertyKind::String,
            Self::Date(_) => PropertyKind::Date,
            Self::Control(_) => PropertyKind::Control,
            Self::ControlList(_) => PropertyKind::ControlList,
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int32(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of integer, float and decimal values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int32(i) => Some(f64::from(*i)),
            Self::Float(f) | Self::Decimal(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_control(&self) -> Option<&ControlRef> {
        match self {
            Self::Control(control) => Some(control),
            _ => None,
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Option<String>> for PropertyValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Null, Self::String)
    }
}

impl From<ControlRef> for PropertyValue {
    fn from(value: ControlRef) -> Self {
        Self::Control(value)
    }
}

impl From<Option<ControlRef>> for PropertyValue {
    fn from(value: Option<ControlRef>) -> Self {
        value.map_or(Self::Null, Self::Control)
    }
}

/// Capability flags declared for a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub kind: PropertyKind,
    /// Advisory. Writes are governed by whether a setter is registered.
    pub read_only: bool,
    pub label: &'static str,
}

type Getter = Box<dyn Fn(&dyn Any) -> Option<PropertyValue> + Send + Sync>;
type Setter = Box<dyn Fn(&dyn Any, PropertyValue) -> Option<Result<()>> + Send + Sync>;
type CommandAccessor = Box<dyn for<'a> Fn(&'a dyn Any) -> Option<&'a Command> + Send + Sync>;

/// A registered property.
pub struct MetaProperty {
    name: &'static str,
    descriptor: PropertyDescriptor,
    getter: Getter,
    setter: Option<Setter>,
}

impl MetaProperty {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn descriptor(&self) -> PropertyDescriptor {
        self.descriptor
    }

    /// Whether a setter is registered.
    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }
}

impl fmt::Debug for MetaProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaProperty")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .field("writable", &self.is_writable())
            .finish()
    }
}

struct MetaCommand {
    name: &'static str,
    accessor: CommandAccessor,
}

/// The name table of one concrete control type.
pub struct MetaObject {
    type_name: &'static str,
    type_id: TypeId,
    properties: Vec<MetaProperty>,
    property_index: HashMap<&'static str, usize>,
    commands: Vec<MetaCommand>,
    command_index: HashMap<&'static str, usize>,
}

impl MetaObject {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Property names in registration order.
    pub fn property_names(&self) -> Vec<&'static str> {
        self.properties.iter().map(|p| p.name).collect()
    }

    /// Command names in registration order.
    pub fn command_names(&self) -> Vec<&'static str> {
        self.commands.iter().map(|c| c.name).collect()
    }

    pub fn property(&self, name: &str) -> Option<&MetaProperty> {
        self.property_index.get(name).map(|&i| &self.properties[i])
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.property_index.contains_key(name)
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.command_index.contains_key(name)
    }

    /// Capability descriptor of a property.
    pub fn descriptor(&self, name: &str) -> Result<PropertyDescriptor> {
        self.lookup_property(name).map(MetaProperty::descriptor)
    }

    /// Read a property of `target`, which must be of this table's type.
    pub fn read_property(&self, target: &dyn Any, name: &str) -> Result<PropertyValue> {
        let property = self.lookup_property(name)?;
        (property.getter)(target).ok_or_else(|| self.type_mismatch())
    }

    /// Write a property of `target`.
    ///
    /// Fails with an argument error when no setter is registered. The
    /// read-only flag is not consulted.
    pub fn write_property(&self, target: &dyn Any, name: &str, value: PropertyValue) -> Result<()> {
        let property = self.lookup_property(name)?;
        let setter = property.setter.as_ref().ok_or_else(|| {
            ViewModelError::argument(format!("{}.{} has no setter", self.type_name, name))
        })?;
        setter(target, value).ok_or_else(|| self.type_mismatch())?
    }

    /// Look up a command of `target`.
    pub fn command<'a>(&self, target: &'a dyn Any, name: &str) -> Result<&'a Command> {
        let index = self
            .command_index
            .get(name)
            .ok_or_else(|| ViewModelError::command_not_found(self.type_name, name))?;
        (self.commands[*index].accessor)(target).ok_or_else(|| self.type_mismatch())
    }

    fn lookup_property(&self, name: &str) -> Result<&MetaProperty> {
        self.property(name)
            .ok_or_else(|| ViewModelError::property_not_found(self.type_name, name))
    }

    fn type_mismatch(&self) -> ViewModelError {
        ViewModelError::argument(format!("target is not a {}", self.type_name))
    }
}

impl fmt::Debug for MetaObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaObject")
            .field("type_name", &self.type_name)
            .field("properties", &self.property_names())
            .field("commands", &self.command_names())
            .finish()
    }
}

/// Builds the [`MetaObject`] of control type `T`.
///
/// Registering a name twice replaces the earlier entry in place, which lets
/// a type override a member registered by [`with_control_base`].
///
/// [`with_control_base`]: MetaObjectBuilder::with_control_base
pub struct MetaObjectBuilder<T> {
    type_name: &'static str,
    properties: Vec<MetaProperty>,
    commands: Vec<MetaCommand>,
    _marker: PhantomData<fn(&T)>,
}

impl<T: Control> MetaObjectBuilder<T> {
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            properties: Vec::new(),
            commands: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Register the members every control carries.
    pub fn with_control_base(self) -> Self {
        self.property_with(
            "Enabled",
            PropertyKind::Boolean,
            true,
            |c: &T| c.base().enabled().into(),
            Some(|c: &T, value: PropertyValue| {
                let enabled = value
                    .as_bool()
                    .ok_or_else(|| ViewModelError::argument("Enabled expects a boolean"))?;
                c.base().set_enabled(enabled);
                Ok(())
            }),
        )
        .property("InError", PropertyKind::Boolean, |c| c.base().in_error().into())
        .property("ErrorMessage", PropertyKind::String, |c| {
            c.base().error_message().into()
        })
        .labelled("Error Message")
        .property_with(
            "Region",
            PropertyKind::Int32,
            true,
            |c: &T| c.base().region().as_i32().into(),
            Some(|c: &T, value: PropertyValue| {
                let region = value
                    .as_i32()
                    .and_then(Region::from_i32)
                    .ok_or_else(|| ViewModelError::argument("Region expects a region number"))?;
                c.base().set_region(region);
                Ok(())
            }),
        )
        .property_rw(
            "Tooltip",
            PropertyKind::String,
            |c| c.base().tooltip().into(),
            |c, value| {
                let tooltip = match value {
                    PropertyValue::Null => None,
                    PropertyValue::String(s) => Some(s),
                    _ => return Err(ViewModelError::argument("Tooltip expects a string")),
                };
                c.base().set_tooltip(tooltip);
                Ok(())
            },
        )
        .command("Refresh", |c| c.base().refresh_command())
        .command("Close", |c| c.base().close_command())
    }

    /// Register a read-only property with no setter.
    pub fn property(self, name: &'static str, kind: PropertyKind, getter: fn(&T) -> PropertyValue) -> Self {
        self.property_with(name, kind, true, getter, None)
    }

    /// Register a writable property.
    pub fn property_rw(
        self,
        name: &'static str,
        kind: PropertyKind,
        getter: fn(&T) -> PropertyValue,
        setter: fn(&T, PropertyValue) -> Result<()>,
    ) -> Self {
        self.property_with(name, kind, false, getter, Some(setter))
    }

    /// Register a property with explicit flags.
    pub fn property_with(
        mut self,
        name: &'static str,
        kind: PropertyKind,
        read_only: bool,
        getter: fn(&T) -> PropertyValue,
        setter: Option<fn(&T, PropertyValue) -> Result<()>>,
    ) -> Self {
        let property = MetaProperty {
            name,
            descriptor: PropertyDescriptor {
                kind,
                read_only,
                label: name,
            },
            getter: Box::new(move |target: &dyn Any| target.downcast_ref::<T>().map(getter)),
            setter: setter.map(|setter| -> Setter {
                Box::new(move |target: &dyn Any, value| {
                    target.downcast_ref::<T>().map(|control| setter(control, value))
                })
            }),
        };
        match self.properties.iter().position(|p| p.name == name) {
            Some(index) => self.properties[index] = property,
            None => self.properties.push(property),
        }
        self
    }

    /// Set the human label of the most recently registered property.
    pub fn labelled(mut self, label: &'static str) -> Self {
        if let Some(property) = self.properties.last_mut() {
            property.descriptor.label = label;
        }
        self
    }

    /// Register a command.
    pub fn command(mut self, name: &'static str, accessor: fn(&T) -> &Command) -> Self {
        let command = MetaCommand {
            name,
            accessor: command_accessor(move |target| target.downcast_ref::<T>().map(accessor)),
        };
        match self.commands.iter().position(|c| c.name == name) {
            Some(index) => self.commands[index] = command,
            None => self.commands.push(command),
        }
        self
    }

    /// Finish the table.
    pub fn build(self) -> MetaObject {
        let property_index = self
            .properties
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name, i))
            .collect();
        let command_index = self
            .commands
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name, i))
            .collect();

        tracing::debug!(
            target: targets::META,
            type_name = self.type_name,
            properties = self.properties.len(),
            commands = self.commands.len(),
            "built metadata table"
        );

        MetaObject {
            type_name: self.type_name,
            type_id: TypeId::of::<T>(),
            properties: self.properties,
            property_index,
            commands: self.commands,
            command_index,
        }
    }
}

fn command_accessor<F>(accessor: F) -> CommandAccessor
where
    F: for<'a> Fn(&'a dyn Any) -> Option<&'a Command> + Send + Sync + 'static,
{
    Box::new(accessor)
}

static_assertions::assert_impl_all!(MetaObject: Send, Sync);
