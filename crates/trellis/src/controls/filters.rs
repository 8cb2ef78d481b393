//! Search filter dialog and its per-property field editors.
//!
//! Each [`FilterField`] wraps a [`FieldEditor`] chosen from the property's
//! data type; [`Filters`] combines the non-empty fields into one condition.

use std::any::Any;
use std::sync::{Arc, OnceLock, Weak};

use chrono::NaiveDateTime;
use parking_lot::RwLock;
use trellis_core::backend::{Condition, DataType, PropertyType, Value};
use trellis_core::logging::targets;
use trellis_core::{
    Command, Control, ControlBase, ControlRef, MetaObject, MetaObjectBuilder, Property, PropertyKind,
    PropertyValue, Result, Signal, ViewModelError,
};

use crate::config::FilterLayout;

/// Editor state of one filter field, one variant per filterable data type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEditor {
    Boolean(Option<bool>),
    Date(Option<NaiveDateTime>),
    Decimal(Option<f64>),
    Float(Option<f64>),
    Integer(Option<i32>),
    /// Id of the referenced item.
    Item(Option<String>),
    List(Option<String>),
    Sequence(Option<String>),
    String(Option<String>),
    Text(Option<String>),
    Federated(Option<String>),
}

impl FieldEditor {
    /// An empty editor for `data_type`.
    ///
    /// Fails with [`ViewModelError::Argument`] for types that cannot be
    /// filtered on.
    pub fn for_data_type(data_type: DataType) -> Result<Self> {
        Ok(match data_type {
            DataType::Boolean => Self::Boolean(None),
            DataType::Date => Self::Date(None),
            DataType::Decimal => Self::Decimal(None),
            DataType::Float => Self::Float(None),
            DataType::Integer => Self::Integer(None),
            DataType::Item => Self::Item(None),
            DataType::List => Self::List(None),
            DataType::Sequence => Self::Sequence(None),
            DataType::String => Self::String(None),
            DataType::Text => Self::Text(None),
            DataType::Federated => Self::Federated(None),
            DataType::Image | DataType::Color | DataType::Md5 => {
                return Err(ViewModelError::argument(format!(
                    "Property Type not implemented: {data_type:?}"
                )));
            }
        })
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Self::Boolean(_) => DataType::Boolean,
            Self::Date(_) => DataType::Date,
            Self::Decimal(_) => DataType::Decimal,
            Self::Float(_) => DataType::Float,
            Self::Integer(_) => DataType::Integer,
            Self::Item(_) => DataType::Item,
            Self::List(_) => DataType::List,
            Self::Sequence(_) => DataType::Sequence,
            Self::String(_) => DataType::String,
            Self::Text(_) => DataType::Text,
            Self::Federated(_) => DataType::Federated,
        }
    }

    /// Kind of the value this editor exposes as a property.
    pub fn property_kind(&self) -> PropertyKind {
        match self {
            Self::Boolean(_) => PropertyKind::Boolean,
            Self::Date(_) => PropertyKind::Date,
            Self::Decimal(_) => PropertyKind::Decimal,
            Self::Float(_) => PropertyKind::Float,
            Self::Integer(_) => PropertyKind::Int32,
            _ => PropertyKind::String,
        }
    }

    /// Empty the editor.
    pub fn clear(&mut self) {
        match self {
            Self::Boolean(value) => *value = None,
            Self::Date(value) => *value = None,
            Self::Decimal(value) | Self::Float(value) => *value = None,
            Self::Integer(value) => *value = None,
            Self::Item(value)
            | Self::List(value)
            | Self::Sequence(value)
            | Self::String(value)
            | Self::Text(value)
            | Self::Federated(value) => *value = None,
        }
    }

    pub fn value(&self) -> PropertyValue {
        match self {
            Self::Boolean(value) => value.map_or(PropertyValue::Null, PropertyValue::Boolean),
            Self::Date(value) => value.map_or(PropertyValue::Null, PropertyValue::Date),
            Self::Decimal(value) => value.map_or(PropertyValue::Null, PropertyValue::Decimal),
            Self::Float(value) => value.map_or(PropertyValue::Null, PropertyValue::Float),
            Self::Integer(value) => value.map_or(PropertyValue::Null, PropertyValue::Int32),
            Self::Item(value)
            | Self::List(value)
            | Self::Sequence(value)
            | Self::String(value)
            | Self::Text(value)
            | Self::Federated(value) => value.clone().into(),
        }
    }

    /// Assign a value of the editor's kind. `Null` empties the editor.
    pub fn assign(&mut self, value: PropertyValue) -> Result<()> {
        if value.is_null() {
            self.clear();
            return Ok(());
        }
        let data_type = self.data_type();
        let kind = value.kind();
        match (self, value) {
            (Self::Boolean(slot), PropertyValue::Boolean(v)) => *slot = Some(v),
            (Self::Date(slot), PropertyValue::Date(v)) => *slot = Some(v),
            (Self::Decimal(slot), PropertyValue::Decimal(v) | PropertyValue::Float(v)) => *slot = Some(v),
            (Self::Float(slot), PropertyValue::Float(v) | PropertyValue::Decimal(v)) => *slot = Some(v),
            (Self::Integer(slot), PropertyValue::Int32(v)) => *slot = Some(v),
            (
                Self::Item(slot)
                | Self::List(slot)
                | Self::Sequence(slot)
                | Self::String(slot)
                | Self::Text(slot)
                | Self::Federated(slot),
                PropertyValue::String(v),
            ) => *slot = Some(v),
            _ => {
                return Err(ViewModelError::argument(format!(
                    "{data_type:?} filter cannot hold a {kind:?} value"
                )));
            }
        }
        Ok(())
    }

    /// The query condition this editor contributes for `property`, if any.
    ///
    /// Dates never filter. Text-like kinds match with `Like`, everything
    /// else with `Eq`; empty strings count as unset.
    pub fn condition(&self, property: &str) -> Option<Condition> {
        fn text(value: &Option<String>) -> Option<&str> {
            value.as_deref().filter(|v| !v.is_empty())
        }

        match self {
            Self::Boolean(value) => value.map(|v| Condition::eq(property, if v { "1" } else { "0" })),
            Self::Date(_) => None,
            Self::Decimal(value) => value.map(|v| Condition::eq(property, Value::Decimal(v))),
            Self::Float(value) => value.map(|v| Condition::eq(property, Value::Float(v))),
            Self::Integer(value) => value.map(|v| Condition::eq(property, Value::Integer(i64::from(v)))),
            Self::Item(value) => value.as_ref().map(|id| Condition::eq(property, Value::Item(id.clone()))),
            Self::List(value) => text(value).map(|v| Condition::eq(property, v)),
            Self::Sequence(value) | Self::String(value) | Self::Text(value) | Self::Federated(value) => {
                text(value).map(|v| Condition::like(property, v))
            }
        }
    }
}

/// One labelled filter input of a [`Filters`] dialog.
pub struct FilterField {
    base: ControlBase,
    property_type: PropertyType,
    editor: RwLock<FieldEditor>,
}

impl FilterField {
    pub fn new(property_type: PropertyType) -> Result<Arc<Self>> {
        let editor = FieldEditor::for_data_type(property_type.data_type)?;
        let field = Arc::new_cyclic(|this| Self {
            base: ControlBase::new(this),
            property_type,
            editor: RwLock::new(editor),
        });
        field.base.set_enabled(true);
        Ok(field)
    }

    pub fn property_type(&self) -> &PropertyType {
        &self.property_type
    }

    pub fn editor(&self) -> FieldEditor {
        self.editor.read().clone()
    }

    pub fn value(&self) -> PropertyValue {
        self.editor.read().value()
    }

    pub fn set_value(&self, value: PropertyValue) -> Result<()> {
        let changed = {
            let mut editor = self.editor.write();
            let before = editor.value();
            editor.assign(value)?;
            editor.value() != before
        };
        if changed {
            self.base.notify("Value");
        }
        Ok(())
    }

    pub fn clear(&self) {
        // Cannot fail: `Null` fits every editor.
        let _ = self.set_value(PropertyValue::Null);
    }

    pub fn condition(&self) -> Option<Condition> {
        self.editor.read().condition(&self.property_type.name)
    }
}

impl Control for FilterField {
    fn base(&self) -> &ControlBase {
        &self.base
    }

    fn meta_object(&self) -> &'static MetaObject {
        static META: OnceLock<MetaObject> = OnceLock::new();
        META.get_or_init(|| {
            MetaObjectBuilder::<Self>::new("FilterField")
                .with_control_base()
                .property("Name", PropertyKind::String, |field| {
                    field.property_type.name.as_str().into()
                })
                .property("Label", PropertyKind::String, |field| {
                    field.property_type.label.as_str().into()
                })
                // Kind varies per field; the declared kind is the text form.
                .property_rw("Value", PropertyKind::String, FilterField::value, FilterField::set_value)
                .build()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The search filter dialog: one [`FilterField`] per property type.
///
/// `ApplyFilter` closes the dialog and emits [`Filters::applied`];
/// `ClearFilter` empties every field and closes it.
pub struct Filters {
    base: ControlBase,
    fields: Vec<Arc<FilterField>>,
    title: Property<String>,
    open: Property<bool>,
    width: Property<i32>,
    height: Property<i32>,
    applied: Signal<()>,
    apply_filter: Command,
    clear_filter: Command,
}

impl Filters {
    pub fn new(property_types: &[PropertyType], layout: &FilterLayout) -> Result<Arc<Self>> {
        let fields = property_types
            .iter()
            .cloned()
            .map(FilterField::new)
            .collect::<Result<Vec<_>>>()?;
        let width = i32::try_from(layout.width).unwrap_or(i32::MAX);
        let height = i32::try_from(layout.height(fields.len())).unwrap_or(i32::MAX);

        tracing::debug!(target: targets::CONTROLS, fields = fields.len(), width, height, "filters built");

        Ok(Arc::new_cyclic(|this: &Weak<Self>| Self {
            base: ControlBase::new(this),
            fields,
            title: Property::new("Search Filters".to_string()),
            open: Property::new(false),
            width: Property::new(width),
            height: Property::new(height),
            applied: Signal::new(),
            apply_filter: Command::for_owner("ApplyFilter", true, this, |filters: &Self, _, _| {
                filters.set_open(false);
                filters.applied.emit(());
                Ok(())
            }),
            clear_filter: Command::for_owner("ClearFilter", true, this, |filters: &Self, _, _| {
                filters.clear();
                filters.set_open(false);
                Ok(())
            }),
        }))
    }

    pub fn fields(&self) -> &[Arc<FilterField>] {
        &self.fields
    }

    /// The field filtering on `property`.
    pub fn field(&self, property: &str) -> Option<&Arc<FilterField>> {
        self.fields.iter().find(|field| field.property_type.name == property)
    }

    pub fn title(&self) -> String {
        self.title.get()
    }

    pub fn is_open(&self) -> bool {
        self.open.get()
    }

    pub fn set_open(&self, open: bool) {
        self.base.update(&self.open, open, "Open");
    }

    pub fn width(&self) -> i32 {
        self.width.get()
    }

    pub fn height(&self) -> i32 {
        self.height.get()
    }

    /// Emitted when `ApplyFilter` runs.
    pub fn applied(&self) -> &Signal<()> {
        &self.applied
    }

    /// The conjunction of every field's condition, or [`Condition::All`].
    pub fn condition(&self) -> Condition {
        self.fields
            .iter()
            .filter_map(|field| field.condition())
            .reduce(Condition::and)
            .unwrap_or(Condition::All)
    }

    pub fn clear(&self) {
        for field in &self.fields {
            field.clear();
        }
    }
}

impl Control for Filters {
    fn base(&self) -> &ControlBase {
        &self.base
    }

    fn meta_object(&self) -> &'static MetaObject {
        static META: OnceLock<MetaObject> = OnceLock::new();
        META.get_or_init(|| {
            MetaObjectBuilder::<Self>::new("Filters")
                .with_control_base()
                .property("Title", PropertyKind::String, |filters| filters.title().into())
                .property_rw(
                    "Open",
                    PropertyKind::Boolean,
                    |filters| filters.is_open().into(),
                    |filters, value| match value.as_bool() {
                        Some(open) => {
                            filters.set_open(open);
                            Ok(())
                        }
                        None => Err(ViewModelError::argument("Open expects a boolean")),
                    },
                )
                .property("Width", PropertyKind::Int32, |filters| filters.width().into())
                .property("Height", PropertyKind::Int32, |filters| filters.height().into())
                .property("Fields", PropertyKind::ControlList, |filters| {
                    PropertyValue::ControlList(
                        filters.fields.iter().map(|field| field.clone() as ControlRef).collect(),
                    )
                })
                .command("ApplyFilter", |filters| &filters.apply_filter)
                .command("ClearFilter", |filters| &filters.clear_filter)
                .build()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

static_assertions::assert_impl_all!(Filters: Send, Sync);
static_assertions::assert_impl_all!(FilterField: Send, Sync);

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn property_types() -> Vec<PropertyType> {
        vec![
            PropertyType::new("item_number", DataType::String).with_label("Item Number"),
            PropertyType::new("is_current", DataType::Boolean),
            PropertyType::new("cost", DataType::Decimal),
            PropertyType::new("created_on", DataType::Date),
        ]
    }

    #[test]
    fn test_unfilterable_types_rejected() {
        for data_type in [DataType::Image, DataType::Color, DataType::Md5] {
            let err = FieldEditor::for_data_type(data_type).unwrap_err();
            assert!(matches!(err, ViewModelError::Argument(_)));
        }
    }

    #[test]
    fn test_editor_conditions() {
        let mut editor = FieldEditor::for_data_type(DataType::Boolean).unwrap();
        assert_eq!(editor.condition("flag"), None);
        editor.assign(PropertyValue::Boolean(false)).unwrap();
        assert_eq!(editor.condition("flag"), Some(Condition::eq("flag", "0")));

        let mut editor = FieldEditor::for_data_type(DataType::String).unwrap();
        editor.assign("".into()).unwrap();
        assert_eq!(editor.condition("name"), None);
        editor.assign("P-1*".into()).unwrap();
        assert_eq!(editor.condition("name"), Some(Condition::like("name", "P-1*")));

        let mut editor = FieldEditor::for_data_type(DataType::List).unwrap();
        editor.assign("Released".into()).unwrap();
        assert_eq!(editor.condition("state"), Some(Condition::eq("state", "Released")));

        let editor = FieldEditor::Date(Some(NaiveDateTime::default()));
        assert_eq!(editor.condition("created_on"), None);
    }

    #[test]
    fn test_assign_wrong_kind() {
        let mut editor = FieldEditor::for_data_type(DataType::Integer).unwrap();
        assert!(editor.assign("seven".into()).is_err());
        editor.assign(PropertyValue::Int32(7)).unwrap();
        assert_eq!(editor.value(), PropertyValue::Int32(7));
        editor.assign(PropertyValue::Null).unwrap();
        assert_eq!(editor.value(), PropertyValue::Null);
    }

    #[test]
    fn test_dialog_layout() {
        let filters = Filters::new(&property_types(), &FilterLayout::default()).unwrap();
        assert_eq!(filters.title(), "Search Filters");
        assert_eq!(filters.width(), 600);
        assert_eq!(filters.height(), 2 * 60 + 50);
        assert_eq!(filters.fields().len(), 4);
        assert_eq!(filters.controls().len(), 4);
        assert!(filters.fields().iter().all(|field| field.base().enabled()));
    }

    #[test]
    fn test_condition_combines_fields() {
        let filters = Filters::new(&property_types(), &FilterLayout::default()).unwrap();
        assert_eq!(filters.condition(), Condition::All);

        filters.field("item_number").unwrap().set_value("P-%".into()).unwrap();
        assert_eq!(filters.condition(), Condition::like("item_number", "P-%"));

        filters.field("is_current").unwrap().set_value(true.into()).unwrap();
        assert_eq!(
            filters.condition(),
            Condition::And(vec![
                Condition::like("item_number", "P-%"),
                Condition::eq("is_current", "1"),
            ])
        );
    }

    #[test]
    fn test_apply_and_clear_commands() {
        let filters = Filters::new(&property_types(), &FilterLayout::default()).unwrap();
        let applied = Arc::new(AtomicUsize::new(0));
        let counter = applied.clone();
        filters.applied().connect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        filters.set_open(true);
        filters.field("cost").unwrap().set_value(PropertyValue::Decimal(9.5)).unwrap();
        filters.get_command("ApplyFilter").unwrap().execute(&[]).unwrap();
        assert!(!filters.is_open());
        assert_eq!(applied.load(Ordering::SeqCst), 1);

        filters.set_open(true);
        filters.get_command("ClearFilter").unwrap().execute(&[]).unwrap();
        assert!(!filters.is_open());
        assert_eq!(filters.condition(), Condition::All);
        assert_eq!(applied.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_field_value_through_metadata() {
        let field = FilterField::new(PropertyType::new("weight", DataType::Float)).unwrap();
        field.set_property_value("Value", PropertyValue::Float(2.5)).unwrap();
        assert_eq!(field.get_property_value("Value").unwrap(), PropertyValue::Float(2.5));
        assert_eq!(field.get_property_value("Name").unwrap(), PropertyValue::from("weight"));
    }
}
