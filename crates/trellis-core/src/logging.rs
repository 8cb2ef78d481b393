//! Logging and debugging facilities for Trellis.
//!
//! Trellis logs through the `tracing` crate and never installs a subscriber
//! itself. Applications choose one:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("trellis_core::binding=debug,trellis::tree=debug")
//!     .init();
//! ```
//!
//! [`ControlTreeDebug`] renders the derived child-control graph of a control,
//! which is handy when checking what a client would be sent:
//!
//! ```ignore
//! use trellis_core::logging::ControlTreeDebug;
//!
//! println!("{}", ControlTreeDebug::new().format(tree.as_ref()));
//! ```

use std::collections::HashSet;
use std::fmt::Write as FmtWrite;

use crate::control::{Control, ControlId};
use crate::meta::PropertyValue;

/// Target names for log filtering.
pub mod targets {
    /// Core runtime target.
    pub const CORE: &str = "trellis_core";
    /// Binding lifecycle target.
    pub const BINDING: &str = "trellis_core::binding";
    /// Signal dispatch target.
    pub const SIGNAL: &str = "trellis_core::signal";
    /// Command gate and execution target.
    pub const COMMAND: &str = "trellis_core::command";
    /// Metadata registry target.
    pub const META: &str = "trellis_core::meta";
    /// Relationship tree target.
    pub const TREE: &str = "trellis::tree";
    /// Backend transaction target.
    pub const BACKEND: &str = "trellis::backend";
    /// Leaf control target.
    pub const CONTROLS: &str = "trellis::controls";
}

/// Style options for control tree visualization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Compact single-line representation.
    Compact,
}

/// Configuration for control tree debug output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    pub style: TreeStyle,
    /// Whether to show control ids.
    pub show_ids: bool,
    /// Whether to show type names.
    pub show_types: bool,
    /// Whether to show the binding identity.
    pub show_bindings: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
    /// Indent size for each level.
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_ids: true,
            show_types: true,
            show_bindings: false,
            max_depth: None,
            indent_size: 2,
        }
    }
}

impl TreeFormatOptions {
    /// Options for detailed debugging output.
    pub fn detailed() -> Self {
        Self {
            show_bindings: true,
            ..Default::default()
        }
    }

    /// Options for minimal output.
    pub fn minimal() -> Self {
        Self {
            show_ids: false,
            show_types: false,
            show_bindings: false,
            ..Default::default()
        }
    }
}

/// Renders the `controls()` graph below a control.
///
/// Each control is printed once; a control reached again is shown as a
/// back-reference so cyclic graphs terminate.
#[derive(Debug, Clone, Default)]
pub struct ControlTreeDebug {
    options: TreeFormatOptions,
}

impl ControlTreeDebug {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: TreeFormatOptions) -> Self {
        Self { options }
    }

    /// Format the graph rooted at `root`.
    pub fn format(&self, root: &dyn Control) -> String {
        let mut output = String::new();
        let mut visited = HashSet::new();
        self.format_into(root, 0, true, &mut visited, &mut output);
        output
    }

    fn format_into(
        &self,
        control: &dyn Control,
        depth: usize,
        is_last: bool,
        visited: &mut HashSet<ControlId>,
        output: &mut String,
    ) {
        if self.options.max_depth.is_some_and(|max| depth > max) {
            return;
        }

        output.push_str(&self.build_prefix(depth, is_last));
        output.push_str(&self.label(control));

        if !visited.insert(control.id()) {
            output.push_str(" (seen)\n");
            return;
        }
        output.push('\n');

        let children = control.controls();
        let child_count = children.len();
        for (i, child) in children.iter().enumerate() {
            self.format_into(child.as_ref(), depth + 1, i + 1 == child_count, visited, output);
        }
    }

    fn label(&self, control: &dyn Control) -> String {
        let mut label = String::new();
        let type_name = control.meta_object().type_name();

        // Prefer a declared Name property, as tree nodes carry one.
        match control.get_property_value("Name") {
            Ok(PropertyValue::String(name)) => label.push_str(&name),
            _ => label.push_str(type_name),
        }
        if self.options.show_ids {
            let _ = write!(label, " [{}]", control.id());
        }
        if self.options.show_types {
            let _ = write!(label, " ({type_name})");
        }
        if self.options.show_bindings {
            if let Some(binding) = control.binding() {
                let _ = write!(label, " -> {binding:?}");
            }
        }
        label
    }

    fn build_prefix(&self, depth: usize, is_last: bool) -> String {
        if depth == 0 {
            return String::new();
        }

        let (branch, tee, corner) = match self.options.style {
            TreeStyle::Ascii => ("|", "+--", "`--"),
            TreeStyle::Unicode => ("\u{2502}", "\u{251c}\u{2500}\u{2500}", "\u{2514}\u{2500}\u{2500}"),
            TreeStyle::Compact => ("", "-", "-"),
        };

        let mut prefix = String::new();
        for _ in 0..(depth - 1) {
            prefix.push_str(branch);
            prefix.push_str(&" ".repeat(self.options.indent_size));
        }
        prefix.push_str(if is_last { corner } else { tee });
        prefix.push(' ');
        prefix
    }
}
