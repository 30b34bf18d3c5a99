//! Plan-visualization state shared by the host renderer and scan providers.
//!
//! Two formats are supported: plain indented text, and a structured
//! tree-of-groups. The structured builder defers a group's emission until
//! the group closes, so providers that inject synthetic children (index
//! counters) never need to rewrite already-produced output.

use serde::Serialize;
use std::fmt::Display;

const SPACES_PER_DEPTH: usize = 2;

///
/// ExplainFormat
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExplainFormat {
    Text,
    Tree,
}

///
/// ExplainGroup
///
/// One structured-output group: named, with ordered properties and nested
/// child groups.
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ExplainGroup {
    pub name: String,
    pub properties: Vec<(String, String)>,
    pub children: Vec<ExplainGroup>,
}

impl ExplainGroup {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Property lookup for assertions and renderers.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

///
/// ExplainOutput
///

#[derive(Clone, Debug, PartialEq)]
pub enum ExplainOutput {
    Text(String),
    Tree(ExplainGroup),
}

///
/// ExplainState
///
/// Format-dispatching visualization sink with indentation bookkeeping.
/// Depth adjustments must be balanced: callers are expected to restore the
/// depth they started with before returning control.
///

pub struct ExplainState {
    format: ExplainFormat,
    analyze: bool,
    depth: usize,
    text: String,
    root: ExplainGroup,
    open: Vec<ExplainGroup>,
}

impl ExplainState {
    #[must_use]
    pub fn new(format: ExplainFormat, analyze: bool) -> Self {
        Self {
            format,
            analyze,
            depth: 0,
            text: String::new(),
            root: ExplainGroup::named("Plan"),
            open: Vec::new(),
        }
    }

    #[must_use]
    pub const fn format(&self) -> ExplainFormat {
        self.format
    }

    #[must_use]
    pub const fn analyze(&self) -> bool {
        self.analyze
    }

    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    pub const fn inc_depth(&mut self, levels: usize) {
        self.depth += levels;
    }

    pub const fn dec_depth(&mut self, levels: usize) {
        self.depth = self.depth.saturating_sub(levels);
    }

    /// Emit one free-form line (text format only).
    pub fn line(&mut self, content: &str) {
        if self.format == ExplainFormat::Text {
            self.push_indented(content);
        }
    }

    /// Emit one key/value property in the current scope.
    pub fn property(&mut self, key: &str, value: impl Display) {
        match self.format {
            ExplainFormat::Text => {
                let line = format!("{key}: {value}");
                self.push_indented(&line);
            }
            ExplainFormat::Tree => {
                self.current_group()
                    .properties
                    .push((key.to_string(), value.to_string()));
            }
        }
    }

    /// Open a named nested group. Structured formats defer any emission
    /// until the matching close; text output needs no group markers.
    pub fn open_group(&mut self, name: &str) {
        if self.format == ExplainFormat::Tree {
            self.open.push(ExplainGroup::named(name));
        }
    }

    /// Close the innermost group and attach it to its parent.
    pub fn close_group(&mut self, name: &str) {
        if self.format != ExplainFormat::Tree {
            return;
        }
        debug_assert!(
            self.open.last().is_some_and(|group| group.name == name),
            "unbalanced explain group close: {name}"
        );
        if let Some(group) = self.open.pop() {
            self.current_group().children.push(group);
        }
    }

    /// Render one plan-state node's own entry, without recursing into its
    /// children; the caller drives recursion and closes with
    /// [`Self::end_plan_node`].
    pub fn begin_plan_node(&mut self, summary: &str) {
        match self.format {
            ExplainFormat::Text => {
                let line = format!("->  {summary}");
                self.push_indented(&line);
            }
            ExplainFormat::Tree => {
                self.open_group("Plan");
                self.property("Node Type", summary);
            }
        }
    }

    pub fn end_plan_node(&mut self) {
        if self.format == ExplainFormat::Tree {
            self.close_group("Plan");
        }
    }

    /// Consume the state and yield the rendered output.
    #[must_use]
    pub fn finish(mut self) -> ExplainOutput {
        match self.format {
            ExplainFormat::Text => ExplainOutput::Text(self.text),
            ExplainFormat::Tree => {
                while let Some(group) = self.open.pop() {
                    self.current_group().children.push(group);
                }
                ExplainOutput::Tree(self.root)
            }
        }
    }

    fn current_group(&mut self) -> &mut ExplainGroup {
        self.open.last_mut().unwrap_or(&mut self.root)
    }

    fn push_indented(&mut self, content: &str) {
        for _ in 0..self.depth * SPACES_PER_DEPTH {
            self.text.push(' ');
        }
        self.text.push_str(content);
        self.text.push('\n');
    }
}
