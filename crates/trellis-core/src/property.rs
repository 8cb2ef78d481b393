//! Change-tracking value cells for control state.
//!
//! Controls keep their declared state in [`Property`] cells. A setter writes
//! through [`Property::set`] and emits a property-changed notification only
//! when the cell reports a change:
//!
//! ```
//! use trellis_core::Property;
//!
//! let label = Property::new(None::<String>);
//! assert!(label.set(Some("Wheel".to_string())));
//! assert!(!label.set(Some("Wheel".to_string())));
//! ```

use std::fmt;

use parking_lot::RwLock;

/// A value cell with change detection.
///
/// Uses interior mutability, so a control can update its state through a
/// shared reference.
pub struct Property<T> {
    value: RwLock<T>,
}

impl<T: Clone> Property<T> {
    /// Create a property with an initial value.
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Access the value through a closure without cloning.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.value.read())
    }

    /// Overwrite the value without comparing.
    pub fn set_silent(&self, value: T) {
        *self.value.write() = value;
    }

    /// Take the value out, leaving the default behind.
    pub fn take(&self) -> T
    where
        T: Default,
    {
        std::mem::take(&mut *self.value.write())
    }
}

impl<T: Clone + PartialEq> Property<T> {
    /// Set the value, returning `true` if it changed.
    ///
    /// The caller emits the matching notification when this returns `true`.
    pub fn set(&self, value: T) -> bool {
        let mut current = self.value.write();
        if *current != value {
            *current = value;
            true
        } else {
            false
        }
    }

    /// Set the value, returning the previous one if it changed.
    pub fn replace(&self, value: T) -> Option<T> {
        let mut current = self.value.write();
        if *current != value {
            Some(std::mem::replace(&mut *current, value))
        } else {
            None
        }
    }
}

impl<T: Clone + Default> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("value", &*self.value.read())
            .finish()
    }
}
