use std::any::Any;
use std::sync::{Arc, OnceLock};

use trellis_core::backend::{DataType, Value};
use trellis_core::{
    Binding, Control, ControlBase, MetaObject, MetaObjectBuilder, Property, PropertyKind, PropertyValue,
    Result, ViewModelError,
};

/// A grid cell editing a decimal backend property as text.
pub struct DecimalCell {
    base: ControlBase,
    value: Property<Option<String>>,
    min_value: Property<f64>,
    max_value: Property<f64>,
}

impl DecimalCell {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            base: ControlBase::new(this),
            value: Property::new(None),
            min_value: Property::new(f64::MIN),
            max_value: Property::new(f64::MAX),
        })
    }

    /// Current value in text form.
    pub fn value(&self) -> Option<String> {
        self.value.get()
    }

    /// Numeric form of the current value.
    pub fn decimal(&self) -> Option<f64> {
        self.value.with(|value| value.as_deref().and_then(|text| text.parse().ok()))
    }

    /// Set the value from a decimal or `Null`.
    pub fn set_value(&self, value: PropertyValue) -> Result<()> {
        let text = match value {
            PropertyValue::Null => None,
            PropertyValue::Decimal(decimal) => Some(decimal.to_string()),
            other => {
                return Err(ViewModelError::argument(format!(
                    "DecimalCell value must be a decimal, got {:?}",
                    other.kind()
                )));
            }
        };
        self.base.update(&self.value, text, "Value");
        Ok(())
    }

    /// Apply text typed by the user. Unparsable input is ignored.
    pub fn update_value(&self, text: Option<&str>) -> Result<()> {
        match text {
            None => self.set_value(PropertyValue::Null),
            Some(text) => match text.trim().parse::<f64>() {
                Ok(decimal) => self.set_value(PropertyValue::Decimal(decimal)),
                Err(_) => Ok(()),
            },
        }
    }

    pub fn min_value(&self) -> f64 {
        self.min_value.get()
    }

    pub fn set_min_value(&self, min_value: f64) {
        self.base.update(&self.min_value, min_value, "MinValue");
    }

    pub fn max_value(&self) -> f64 {
        self.max_value.get()
    }

    pub fn set_max_value(&self, max_value: f64) {
        self.base.update(&self.max_value, max_value, "MaxValue");
    }
}

fn decimal_arg(value: &PropertyValue, name: &str) -> Result<f64> {
    match value {
        PropertyValue::Decimal(v) | PropertyValue::Float(v) => Ok(*v),
        _ => Err(ViewModelError::argument(format!("{name} expects a decimal"))),
    }
}

fn write_min_value(cell: &DecimalCell, value: PropertyValue) -> Result<()> {
    cell.set_min_value(decimal_arg(&value, "MinValue")?);
    Ok(())
}

fn write_max_value(cell: &DecimalCell, value: PropertyValue) -> Result<()> {
    cell.set_max_value(decimal_arg(&value, "MaxValue")?);
    Ok(())
}

impl Control for DecimalCell {
    fn base(&self) -> &ControlBase {
        &self.base
    }

    fn meta_object(&self) -> &'static MetaObject {
        static META: OnceLock<MetaObject> = OnceLock::new();
        META.get_or_init(|| {
            MetaObjectBuilder::<Self>::new("DecimalCell")
                .with_control_base()
                .property_rw(
                    "Value",
                    PropertyKind::String,
                    |cell| cell.value().into(),
                    |cell, value| match value {
                        PropertyValue::String(text) => cell.update_value(Some(&text)),
                        other => cell.set_value(other),
                    },
                )
                .property_with(
                    "MinValue",
                    PropertyKind::Decimal,
                    true,
                    |cell| PropertyValue::Decimal(cell.min_value()),
                    Some(write_min_value),
                )
                .labelled("Min Value")
                .property_with(
                    "MaxValue",
                    PropertyKind::Decimal,
                    true,
                    |cell| PropertyValue::Decimal(cell.max_value()),
                    Some(write_max_value),
                )
                .labelled("Max Value")
                .build()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn check_binding(&self, binding: &Binding) -> Result<()> {
        match binding.as_property() {
            Some(property) if property.property.data_type == DataType::Decimal => Ok(()),
            _ => Err(ViewModelError::argument(format!(
                "DecimalCell binding must be a decimal property, got {binding:?}"
            ))),
        }
    }

    fn after_binding_changed(&self) -> Result<()> {
        let stored = self.binding().and_then(|binding| {
            let property = binding.as_property()?;
            property.item.property(&property.property.name)
        });
        let value = match stored {
            Some(Value::Decimal(v) | Value::Float(v)) => PropertyValue::Decimal(v),
            Some(Value::Integer(v)) => PropertyValue::Decimal(v as f64),
            Some(Value::String(text)) => match text.trim().parse() {
                Ok(v) => PropertyValue::Decimal(v),
                Err(_) => PropertyValue::Null,
            },
            _ => PropertyValue::Null,
        };
        self.set_value(value)
    }
}
