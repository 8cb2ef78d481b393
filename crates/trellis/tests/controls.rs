//! Integration tests for the leaf controls.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use trellis::backend::{Condition, DataType, MemoryBackend, PropertyType, Value};
use trellis::{
    Binding, Control, DecimalCell, FilterLayout, ListValue, PropertyBinding, PropertyValue, SearchPanel,
    ViewModelError,
};

fn catalogue() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend.define_property_types(
        "Part",
        vec![
            PropertyType::new("item_number", DataType::String).with_label("Item Number"),
            PropertyType::new("cost", DataType::Decimal),
            PropertyType::new("is_current", DataType::Boolean),
        ],
    );
    backend.add_item(
        "Part",
        "P1",
        [
            ("item_number", Value::from("P-100")),
            ("cost", Value::Decimal(12.5)),
            ("is_current", Value::Boolean(true)),
        ],
    );
    backend.add_item(
        "Part",
        "P2",
        [
            ("item_number", Value::from("P-200")),
            ("cost", Value::Decimal(3.0)),
            ("is_current", Value::Boolean(false)),
        ],
    );
    backend.add_item("Document", "D1", [("item_number", Value::from("D-100"))]);
    backend
}

fn store_binding(backend: &MemoryBackend, item_type: &str) -> Binding {
    Binding::Store(backend.session().item_store(item_type).unwrap())
}

#[test]
fn test_list_value_reads_relationship() {
    let backend = MemoryBackend::new();
    backend.add_item("List", "L1", []);
    backend.add_item("Value", "V1", []);
    let first = backend.relate_with("Value", "L1", "V1", [("value", Value::from("R")), ("label", Value::from("Released"))]);
    let second = backend.relate_with("Value", "L1", "V1", [("value", Value::from("P"))]);

    let list_value = ListValue::new();
    list_value
        .set_binding(Some(Binding::Relationship(backend.relationship(&first).unwrap())))
        .unwrap();
    assert_eq!(list_value.value().as_deref(), Some("R"));
    assert_eq!(list_value.label().as_deref(), Some("Released"));
    assert_eq!(list_value.to_string(), "R");

    list_value
        .set_binding(Some(Binding::Relationship(backend.relationship(&second).unwrap())))
        .unwrap();
    assert_eq!(list_value.value().as_deref(), Some("P"));
    assert_eq!(list_value.label(), None);

    list_value.set_binding(None).unwrap();
    assert_eq!(list_value.value(), None);
    assert_eq!(list_value.to_string(), "");
}

#[test]
fn test_list_value_rejects_items() {
    let backend = MemoryBackend::new();
    let item = backend.add_item("List", "L1", []);
    let list_value = ListValue::new();
    let err = list_value.set_binding(Some(Binding::Item(item))).unwrap_err();
    assert!(matches!(err, ViewModelError::Argument(_)));
}

#[test]
fn test_list_value_notifies_only_on_change() {
    let list_value = ListValue::new();
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    list_value.base().property_changed().connect(move |change| {
        if change.name == "Value" {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    list_value.set_value(Some("A".to_string()));
    list_value.set_value(Some("A".to_string()));
    list_value.set_value(None);
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn test_decimal_cell_binding() {
    let backend = MemoryBackend::new();
    let item = backend.add_item("Part", "P1", [("cost", Value::Decimal(12.5)), ("name", Value::from("x"))]);

    let cell = DecimalCell::new();
    let err = cell
        .set_binding(Some(Binding::property(item.clone(), PropertyType::new("name", DataType::String))))
        .unwrap_err();
    assert!(matches!(err, ViewModelError::Argument(_)));

    cell.set_binding(Some(Binding::Property(PropertyBinding {
        item,
        property: PropertyType::new("cost", DataType::Decimal),
    })))
    .unwrap();
    assert_eq!(cell.value().as_deref(), Some("12.5"));
    assert_eq!(cell.decimal(), Some(12.5));
}

#[test]
fn test_decimal_cell_values() {
    let cell = DecimalCell::new();
    assert_eq!(cell.min_value(), f64::MIN);
    assert_eq!(cell.max_value(), f64::MAX);

    cell.set_value(PropertyValue::Decimal(4.25)).unwrap();
    assert_eq!(cell.value().as_deref(), Some("4.25"));

    let err = cell.set_value(PropertyValue::from("4.25")).unwrap_err();
    assert!(matches!(err, ViewModelError::Argument(_)));

    cell.update_value(Some("not a number")).unwrap();
    assert_eq!(cell.value().as_deref(), Some("4.25"));

    cell.update_value(Some(" 7 ")).unwrap();
    assert_eq!(cell.decimal(), Some(7.0));

    cell.set_property_value("Value", PropertyValue::from("1.5")).unwrap();
    assert_eq!(cell.decimal(), Some(1.5));

    cell.update_value(None).unwrap();
    assert_eq!(cell.value(), None);

    cell.set_property_value("MinValue", PropertyValue::Decimal(0.0)).unwrap();
    assert_eq!(cell.min_value(), 0.0);
    assert!(cell.get_property_read_only("MinValue").unwrap());
}

#[test]
fn test_search_panel_requires_store() {
    let backend = catalogue();
    let panel = SearchPanel::new();
    let err = panel
        .set_binding(Some(Binding::Item(backend.item("P1").unwrap())))
        .unwrap_err();
    assert!(matches!(err, ViewModelError::Argument(_)));
}

#[test]
fn test_search_panel_rejects_unfilterable_store() {
    let backend = catalogue();
    backend.define_property_types("Image", vec![PropertyType::new("thumbnail", DataType::Image)]);
    let panel = SearchPanel::new();

    let err = panel.set_binding(Some(store_binding(&backend, "Image"))).unwrap_err();
    assert!(matches!(err, ViewModelError::Argument(_)));
    assert!(panel.binding().is_none());
    assert!(panel.filters().is_none());
}

#[test]
fn test_search_panel_builds_filters() {
    let backend = catalogue();
    let panel = SearchPanel::new();
    panel.set_binding(Some(store_binding(&backend, "Part"))).unwrap();

    let filters = panel.filters().unwrap();
    assert_eq!(filters.fields().len(), 3);
    assert_eq!(filters.field("item_number").unwrap().property_type().label, "Item Number");
    assert_eq!(filters.height(), i32::try_from(FilterLayout::default().height(3)).unwrap());
    assert_eq!(panel.controls().len(), 1);
}

#[test]
fn test_search_runs_filtered_query() {
    let backend = catalogue();
    let panel = SearchPanel::new();
    panel.set_binding(Some(store_binding(&backend, "Part"))).unwrap();

    panel.base().refresh_command().execute(&[]).unwrap();
    assert_eq!(panel.result_count(), 2);
    assert_eq!(panel.get_property_value("ResultCount").unwrap(), PropertyValue::Int32(2));

    let filters = panel.filters().unwrap();
    assert_eq!(filters.condition(), Condition::All);
    filters.field("item_number").unwrap().set_value("p-2%".into()).unwrap();
    filters.get_command("ApplyFilter").unwrap().execute(&[]).unwrap();

    let ids: Vec<_> = panel.results().iter().map(|item| item.id().to_string()).collect();
    assert_eq!(ids, ["P2"]);

    filters.get_command("ClearFilter").unwrap().execute(&[]).unwrap();
    filters.field("is_current").unwrap().set_value(true.into()).unwrap();
    filters.get_command("ApplyFilter").unwrap().execute(&[]).unwrap();
    let ids: Vec<_> = panel.results().iter().map(|item| item.id().to_string()).collect();
    assert_eq!(ids, ["P1"]);
}

#[test]
fn test_search_selection() {
    let backend = catalogue();
    let panel = SearchPanel::new();
    panel.set_binding(Some(store_binding(&backend, "Part"))).unwrap();
    panel.search().unwrap();

    let seen = Arc::new(AtomicUsize::new(0));
    let recorder = seen.clone();
    panel.selection_changed().connect(move |count| {
        recorder.store(*count, Ordering::SeqCst);
    });

    panel.select_results(&["P2", "P1"]).unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 2);
    assert_eq!(panel.selected_count(), 2);
    assert_eq!(panel.selected_items()[0].id(), "P2");

    let err = panel.select_results(&["D1"]).unwrap_err();
    assert!(matches!(err, ViewModelError::Argument(_)));
    assert_eq!(panel.selected_count(), 2);
}

#[test]
fn test_rebinding_search_resets_results() {
    let backend = catalogue();
    let panel = SearchPanel::new();
    panel.set_binding(Some(store_binding(&backend, "Part"))).unwrap();
    panel.search().unwrap();
    panel.select_results(&["P1"]).unwrap();

    panel.set_binding(Some(store_binding(&backend, "Document"))).unwrap();
    assert_eq!(panel.result_count(), 0);
    assert_eq!(panel.selected_count(), 0);
    assert!(panel.filters().unwrap().fields().is_empty());

    panel.search().unwrap();
    assert_eq!(panel.results()[0].id(), "D1");
}
