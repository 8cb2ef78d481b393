//! Store search panel.

use std::any::Any;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::RwLock;
use trellis_core::backend::{Condition, Item, ItemStore};
use trellis_core::logging::targets;
use trellis_core::{
    Binding, Control, ControlBase, ControlRef, MetaObject, MetaObjectBuilder, PropertyKind, PropertyValue,
    Result, Signal, ViewModelError,
};

use super::filters::{FieldEditor, Filters};
use crate::config::FilterLayout;

/// Searches an item store and lets the user pick results.
///
/// Bind it to a [`Binding::Store`]. Binding builds a [`Filters`] dialog
/// from the store's property types; `Refresh` (or applying the filters)
/// queries the store with the dialog's condition. Picking results with
/// [`SearchPanel::select_items`] emits [`SearchPanel::selection_changed`]
/// with the number of selected items.
pub struct SearchPanel {
    base: ControlBase,
    this: Weak<SearchPanel>,
    layout: FilterLayout,
    filters: RwLock<Option<Arc<Filters>>>,
    results: RwLock<Vec<Arc<dyn Item>>>,
    selected: RwLock<Vec<Arc<dyn Item>>>,
    selection_changed: Signal<usize>,
}

impl SearchPanel {
    pub fn new() -> Arc<Self> {
        Self::with_layout(FilterLayout::default())
    }

    pub fn with_layout(layout: FilterLayout) -> Arc<Self> {
        let panel = Arc::new_cyclic(|this: &Weak<Self>| Self {
            base: ControlBase::new(this),
            this: this.clone(),
            layout,
            filters: RwLock::new(None),
            results: RwLock::new(Vec::new()),
            selected: RwLock::new(Vec::new()),
            selection_changed: Signal::new(),
        });
        panel.base.set_enabled(true);
        panel
    }

    /// The bound store.
    pub fn store(&self) -> Option<Arc<dyn ItemStore>> {
        self.binding().and_then(|binding| binding.as_store().cloned())
    }

    /// The filter dialog for the bound store.
    pub fn filters(&self) -> Option<Arc<Filters>> {
        self.filters.read().clone()
    }

    /// Items returned by the last query.
    pub fn results(&self) -> Vec<Arc<dyn Item>> {
        self.results.read().clone()
    }

    pub fn result_count(&self) -> usize {
        self.results.read().len()
    }

    pub fn selected_items(&self) -> Vec<Arc<dyn Item>> {
        self.selected.read().clone()
    }

    pub fn selected_count(&self) -> usize {
        self.selected.read().len()
    }

    /// Emitted with the new selection size whenever the selection is set.
    pub fn selection_changed(&self) -> &Signal<usize> {
        &self.selection_changed
    }

    /// Replace the selection.
    pub fn select_items(&self, items: Vec<Arc<dyn Item>>) {
        let count = items.len();
        *self.selected.write() = items;
        tracing::debug!(target: targets::CONTROLS, control = %self.id(), count, "search selection changed");
        self.base.notify("SelectedCount");
        self.selection_changed.emit(count);
    }

    /// Select results of the last query by item id.
    pub fn select_results(&self, ids: &[&str]) -> Result<()> {
        let items = {
            let results = self.results.read();
            ids.iter()
                .map(|id| {
                    results
                        .iter()
                        .find(|item| item.id() == *id)
                        .cloned()
                        .ok_or_else(|| ViewModelError::argument(format!("{id} is not a search result")))
                })
                .collect::<Result<Vec<_>>>()?
        };
        self.select_items(items);
        Ok(())
    }

    /// Query the bound store with the current filter condition.
    pub fn search(&self) -> Result<()> {
        let Some(store) = self.store() else {
            return Ok(());
        };
        let condition = self
            .filters()
            .map(|filters| filters.condition())
            .unwrap_or(Condition::All);
        let results = store.query(&condition)?;
        tracing::debug!(
            target: targets::CONTROLS,
            item_type = store.item_type(),
            results = results.len(),
            "search ran"
        );
        *self.results.write() = results;
        self.base.notify("ResultCount");
        Ok(())
    }

    fn reset(&self) {
        self.results.write().clear();
        self.selected.write().clear();
        self.base.notify("ResultCount");
        self.base.notify("SelectedCount");
    }
}

fn count_value(count: usize) -> PropertyValue {
    PropertyValue::Int32(i32::try_from(count).unwrap_or(i32::MAX))
}

impl Control for SearchPanel {
    fn base(&self) -> &ControlBase {
        &self.base
    }

    fn meta_object(&self) -> &'static MetaObject {
        static META: OnceLock<MetaObject> = OnceLock::new();
        META.get_or_init(|| {
            MetaObjectBuilder::<Self>::new("SearchPanel")
                .with_control_base()
                .property("Filters", PropertyKind::Control, |panel| {
                    panel.filters().map(|filters| filters as ControlRef).into()
                })
                .property("ResultCount", PropertyKind::Int32, |panel| count_value(panel.result_count()))
                .labelled("Result Count")
                .property("SelectedCount", PropertyKind::Int32, |panel| count_value(panel.selected_count()))
                .labelled("Selected Count")
                .build()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn check_binding(&self, binding: &Binding) -> Result<()> {
        let Binding::Store(store) = binding else {
            return Err(ViewModelError::argument(format!(
                "SearchPanel binding must be an item store, got {}",
                binding.kind()
            )));
        };
        for property_type in store.property_types() {
            FieldEditor::for_data_type(property_type.data_type)?;
        }
        Ok(())
    }

    fn after_binding_changed(&self) -> Result<()> {
        self.reset();
        let filters = match self.store() {
            Some(store) => {
                let filters = Filters::new(&store.property_types(), &self.layout)?;
                let panel = self.this.clone();
                filters.applied().connect(move |_| {
                    if let Some(panel) = panel.upgrade() {
                        if let Err(err) = panel.search() {
                            tracing::warn!(target: targets::CONTROLS, error = %err, "filtered search failed");
                            panel.base.set_error(err.to_string());
                        }
                    }
                });
                Some(filters)
            }
            None => None,
        };
        *self.filters.write() = filters;
        self.base.notify("Filters");
        Ok(())
    }

    fn refresh_control(&self) -> Result<()> {
        self.search()
    }
}

static_assertions::assert_impl_all!(SearchPanel: Send, Sync);
