use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};

use trellis_core::backend::Relationship;
use trellis_core::{
    Binding, Control, ControlBase, MetaObject, MetaObjectBuilder, Property, PropertyKind, Result,
    ViewModelError,
};

/// One entry of a backend value list, bound to its list-value relationship.
pub struct ListValue {
    base: ControlBase,
    value: Property<Option<String>>,
    label: Property<Option<String>>,
}

impl ListValue {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            base: ControlBase::new(this),
            value: Property::new(None),
            label: Property::new(None),
        })
    }

    pub fn value(&self) -> Option<String> {
        self.value.get()
    }

    pub fn set_value(&self, value: Option<String>) {
        self.base.update(&self.value, value, "Value");
    }

    pub fn label(&self) -> Option<String> {
        self.label.get()
    }

    pub fn set_label(&self, label: Option<String>) {
        self.base.update(&self.label, label, "Label");
    }
}

fn text_property(relationship: &dyn Relationship, name: &str) -> Option<String> {
    relationship
        .property(name)
        .filter(|value| !value.is_null())
        .map(|value| value.to_string())
}

impl fmt::Display for ListValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.with(|value| f.write_str(value.as_deref().unwrap_or_default()))
    }
}

impl Control for ListValue {
    fn base(&self) -> &ControlBase {
        &self.base
    }

    fn meta_object(&self) -> &'static MetaObject {
        static META: OnceLock<MetaObject> = OnceLock::new();
        META.get_or_init(|| {
            MetaObjectBuilder::<Self>::new("ListValue")
                .with_control_base()
                .property("Value", PropertyKind::String, |list| list.value().into())
                .property("Label", PropertyKind::String, |list| list.label().into())
                .build()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn check_binding(&self, binding: &Binding) -> Result<()> {
        match binding {
            Binding::Relationship(_) => Ok(()),
            other => Err(ViewModelError::argument(format!(
                "ListValue binding must be a list value relationship, got {}",
                other.kind()
            ))),
        }
    }

    fn before_binding_changed(&self) -> Result<()> {
        if self.binding().is_some() {
            self.set_value(None);
            self.set_label(None);
        }
        Ok(())
    }

    fn after_binding_changed(&self) -> Result<()> {
        let (value, label) = match self.binding() {
            Some(Binding::Relationship(relationship)) => (
                text_property(relationship.as_ref(), "value"),
                text_property(relationship.as_ref(), "label"),
            ),
            _ => (None, None),
        };
        self.set_value(value);
        self.set_label(label);
        Ok(())
    }
}
