//! Reference-counted visual tree
//!
//! An [`Element`] is a shared handle to one node. Cloning the handle never
//! copies the node: two clones are the same element, and moving a node under a
//! new parent (reparenting) keeps its identity. [`Element::deep_clone`] is the
//! only way to duplicate a subtree.
//!
//! Parent links are weak, so a subtree is kept alive by whoever holds its root
//! and a container dropped by the host simply disappears from under any
//! [`WeakElement`] pointing at it.

use crate::error::DomError;
use crate::geometry::Size;
use parking_lot::{Mutex, MutexGuard};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique element identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(pub u64);

impl ElementId {
    fn next() -> Self {
        Self(NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Node {
    id: ElementId,
    tag: String,
    state: Mutex<NodeState>,
}

#[derive(Default)]
struct NodeState {
    text: String,
    attrs: BTreeMap<String, String>,
    children: Vec<Element>,
    parent: Option<Weak<Node>>,
    explicit_size: Option<Size>,
    size_pin: u64,
    layout_size: Option<Size>,
    removed: bool,
    marks: Vec<Range<usize>>,
}

/// Shared handle to a node in the visual tree
#[derive(Clone)]
pub struct Element(Arc<Node>);

/// Non-owning handle to an element
#[derive(Clone, Default)]
pub struct WeakElement(Weak<Node>);

impl Element {
    /// Create a detached element
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(Arc::new(Node {
            id: ElementId::next(),
            tag: tag.into(),
            state: Mutex::new(NodeState::default()),
        }))
    }

    /// Create a detached element carrying text
    #[must_use]
    pub fn with_text(tag: impl Into<String>, text: impl Into<String>) -> Self {
        let el = Self::new(tag);
        el.set_text(text);
        el
    }

    fn lock(&self) -> MutexGuard<'_, NodeState> {
        self.0.state.lock()
    }

    /// Element identity
    #[inline]
    #[must_use]
    pub fn id(&self) -> ElementId {
        self.0.id
    }

    /// Tag name
    #[inline]
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.0.tag
    }

    /// Own text of this node (children excluded)
    #[must_use]
    pub fn text(&self) -> String {
        self.lock().text.clone()
    }

    /// Replace own text; existing marks no longer apply and are dropped
    pub fn set_text(&self, text: impl Into<String>) {
        let mut state = self.lock();
        state.text = text.into();
        state.marks.clear();
    }

    /// Read an attribute
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<String> {
        self.lock().attrs.get(name).cloned()
    }

    /// Set an attribute
    pub fn set_attr(&self, name: impl Into<String>, value: impl Into<String>) {
        self.lock().attrs.insert(name.into(), value.into());
    }

    /// Snapshot of the children
    #[must_use]
    pub fn children(&self) -> Vec<Element> {
        self.lock().children.clone()
    }

    /// Number of direct children
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.lock().children.len()
    }

    /// First child, if any
    #[must_use]
    pub fn first_child(&self) -> Option<Element> {
        self.lock().children.first().cloned()
    }

    /// Current parent, if attached
    #[must_use]
    pub fn parent(&self) -> Option<Element> {
        self.lock()
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Element)
    }

    /// Identity comparison
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Element) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Non-owning handle
    #[inline]
    #[must_use]
    pub fn downgrade(&self) -> WeakElement {
        WeakElement(Arc::downgrade(&self.0))
    }

    /// True if `other` is this element or one of its descendants
    #[must_use]
    pub fn contains(&self, other: &Element) -> bool {
        let mut cursor = Some(other.clone());
        while let Some(node) = cursor {
            if node.ptr_eq(self) {
                return true;
            }
            cursor = node.parent();
        }
        false
    }

    /// Move `child` to the end of this element's children
    ///
    /// The child is first detached from its previous parent, so the same node
    /// never appears twice in the tree.
    ///
    /// # Errors
    /// - `DomError::HierarchyCycle` if `child` contains this element
    /// - `DomError::Removed` if this element was removed by the host
    pub fn append(&self, child: &Element) -> Result<(), DomError> {
        self.check_insert(child)?;
        child.detach();
        self.adopt(child);
        Ok(())
    }

    /// Put `child` first, replacing whatever was first before
    ///
    /// No-op when `child` already is the first child. The displaced node is
    /// detached, not destroyed.
    ///
    /// # Errors
    /// Same as [`Element::append`]
    pub fn replace_first_child(&self, child: &Element) -> Result<(), DomError> {
        if self.first_child().is_some_and(|first| first.ptr_eq(child)) {
            return Ok(());
        }
        self.check_insert(child)?;
        child.detach();
        child.lock().parent = Some(Arc::downgrade(&self.0));

        let displaced = {
            let mut state = self.lock();
            if state.children.is_empty() {
                state.children.push(child.clone());
                None
            } else {
                Some(std::mem::replace(&mut state.children[0], child.clone()))
            }
        };
        if let Some(old) = displaced {
            old.lock().parent = None;
        }
        Ok(())
    }

    /// Swap the whole child list, keeping this node's identity
    ///
    /// # Errors
    /// Same as [`Element::append`]
    pub fn replace_children(&self, children: Vec<Element>) -> Result<(), DomError> {
        drop(self.take_children());
        for child in &children {
            self.append(child)?;
        }
        Ok(())
    }

    /// Detach and return every child
    pub fn take_children(&self) -> Vec<Element> {
        let old = std::mem::take(&mut self.lock().children);
        for child in &old {
            child.lock().parent = None;
        }
        old
    }

    /// Detach from the current parent; the node stays alive and connected
    pub fn detach(&self) {
        let parent = self.lock().parent.take().and_then(|p| p.upgrade());
        if let Some(parent) = parent {
            parent.state.lock().children.retain(|c| !c.ptr_eq(self));
        }
    }

    /// Host removal: detach and mark the element as gone
    pub fn remove(&self) {
        self.detach();
        self.lock().removed = true;
    }

    /// True unless this element or one of its ancestors was removed
    #[must_use]
    pub fn is_connected(&self) -> bool {
        let mut cursor = Some(self.clone());
        while let Some(node) = cursor {
            if node.lock().removed {
                return false;
            }
            cursor = node.parent();
        }
        true
    }

    /// Duplicate the subtree with fresh identities
    #[must_use]
    pub fn deep_clone(&self) -> Element {
        let copy = Element::new(self.tag());
        let children = {
            let source = self.lock();
            let mut target = copy.lock();
            target.text = source.text.clone();
            target.attrs = source.attrs.clone();
            target.explicit_size = source.explicit_size;
            target.layout_size = source.layout_size;
            target.marks = source.marks.clone();
            source.children.clone()
        };
        for child in children {
            copy.adopt(&child.deep_clone());
        }
        copy
    }

    /// Inline style size, if one was set
    #[must_use]
    pub fn explicit_size(&self) -> Option<Size> {
        self.lock().explicit_size
    }

    /// Set or clear the inline style size
    ///
    /// Invalidates any outstanding [`Element::pin_size`] token.
    pub fn set_explicit_size(&self, size: Option<Size>) {
        let mut state = self.lock();
        state.size_pin += 1;
        state.explicit_size = size;
    }

    /// Pin the inline size until [`Element::release_size`] is called with
    /// the returned token
    pub fn pin_size(&self, size: Size) -> u64 {
        let mut state = self.lock();
        state.size_pin += 1;
        state.explicit_size = Some(size);
        state.size_pin
    }

    /// Clear the inline size if `token` is still the latest pin
    ///
    /// Returns `false` when a later pin or explicit size superseded it.
    pub fn release_size(&self, token: u64) -> bool {
        let mut state = self.lock();
        if state.size_pin != token {
            return false;
        }
        state.explicit_size = None;
        true
    }

    /// Size computed by the host layout pass
    #[must_use]
    pub fn layout_size(&self) -> Option<Size> {
        self.lock().layout_size
    }

    /// Record the size computed by the host layout pass
    pub fn set_layout_size(&self, size: Size) {
        self.lock().layout_size = Some(size);
    }

    /// Border box as the host would report it
    ///
    /// An inline size wins over the natural layout size.
    #[must_use]
    pub fn bounding_box(&self) -> Size {
        let state = self.lock();
        state
            .explicit_size
            .or(state.layout_size)
            .unwrap_or(Size::ZERO)
    }

    /// Highlight ranges over this node's own text
    #[must_use]
    pub fn marks(&self) -> Vec<Range<usize>> {
        self.lock().marks.clone()
    }

    /// Add a highlight range; out-of-bounds ranges are ignored
    pub fn push_mark(&self, range: Range<usize>) {
        let mut state = self.lock();
        if range.end <= state.text.len() && range.start < range.end {
            state.marks.push(range);
        }
    }

    /// Drop this node's highlight ranges
    pub fn clear_marks(&self) {
        self.lock().marks.clear();
    }

    /// Marked substrings of this node's text
    #[must_use]
    pub fn marked_text(&self) -> Vec<String> {
        let state = self.lock();
        state
            .marks
            .iter()
            .filter_map(|r| state.text.get(r.clone()).map(str::to_string))
            .collect()
    }

    /// Highlight ranges across the whole subtree
    #[must_use]
    pub fn mark_count(&self) -> usize {
        self.descendants().iter().map(|n| n.lock().marks.len()).sum()
    }

    /// This element followed by all descendants, pre-order
    #[must_use]
    pub fn descendants(&self) -> Vec<Element> {
        let mut out = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(node) = stack.pop() {
            let children = node.children();
            out.push(node);
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Concatenated text of the subtree
    #[must_use]
    pub fn text_content(&self) -> String {
        self.descendants().iter().map(Element::text).collect()
    }

    /// Indented, human-readable dump of the subtree
    #[must_use]
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.write_outline(&mut out, 0);
        out
    }

    fn write_outline(&self, out: &mut String, depth: usize) {
        let (text, attrs, children) = {
            let state = self.lock();
            (state.text.clone(), state.attrs.clone(), state.children.clone())
        };
        let _ = write!(out, "{:indent$}<{}", "", self.tag(), indent = depth * 2);
        for (name, value) in &attrs {
            let _ = write!(out, " {name}=\"{value}\"");
        }
        out.push('>');
        if !text.is_empty() {
            let _ = write!(out, " {text:?}");
        }
        out.push('\n');
        for child in children {
            child.write_outline(out, depth + 1);
        }
    }

    fn check_insert(&self, child: &Element) -> Result<(), DomError> {
        if child.contains(self) {
            return Err(DomError::HierarchyCycle {
                parent: self.id(),
                child: child.id(),
            });
        }
        if self.lock().removed {
            return Err(DomError::Removed(self.id()));
        }
        Ok(())
    }

    fn adopt(&self, child: &Element) {
        child.lock().parent = Some(Arc::downgrade(&self.0));
        self.lock().children.push(child.clone());
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Element {}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.id())
            .field("tag", &self.tag())
            .finish()
    }
}

impl WeakElement {
    /// Handle that never upgrades
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Weak::new())
    }

    /// Upgrade if the element is still alive
    #[inline]
    #[must_use]
    pub fn upgrade(&self) -> Option<Element> {
        self.0.upgrade().map(Element)
    }

    /// True if this handle refers to `element`
    #[must_use]
    pub fn refers_to(&self, element: &Element) -> bool {
        Weak::ptr_eq(&self.0, &Arc::downgrade(&element.0))
    }
}

impl std::fmt::Debug for WeakElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.upgrade() {
            Some(el) => write!(f, "WeakElement({})", el.id()),
            None => f.write_str("WeakElement(dangling)"),
        }
    }
}
