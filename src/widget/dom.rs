//! Page abstraction the chat widget operates on.
//!
//! [`Document`] is the seam between the widget and whatever hosts it. The
//! crate ships [`MemoryDocument`], a parsed HTML page used by the terminal
//! driver and the tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use scraper::node::Text;
use scraper::{ElementRef, Html, Node, Selector};

/// DOM operations needed by the chat widget.
///
/// Element handles are cheap to clone and compare. A page belongs to one
/// thread, as in a browser; implementations use interior mutability so the
/// widget can hold it across an await.
pub trait Document {
    type Element: Clone + PartialEq + fmt::Debug;

    fn get_element_by_id(&self, id: &str) -> Option<Self::Element>;
    /// First attached element, in document order, matching the selector list.
    fn query_selector(&self, selectors: &Selector) -> Option<Self::Element>;
    /// Creates a detached element.
    fn create_element(&self, tag: &str) -> Self::Element;
    fn set_class_name(&self, el: &Self::Element, class: &str);
    /// Sets text content. The text is never interpreted as markup.
    fn set_text_content(&self, el: &Self::Element, text: &str);
    fn append_child(&self, parent: &Self::Element, child: &Self::Element);
    fn insert_before(&self, parent: &Self::Element, child: &Self::Element, reference: &Self::Element);
    fn parent(&self, el: &Self::Element) -> Option<Self::Element>;
    fn scroll_to_bottom(&self, el: &Self::Element);
    fn value(&self, el: &Self::Element) -> String;
    fn set_value(&self, el: &Self::Element, value: &str);
    fn focus(&self, el: &Self::Element);
    fn is_disabled(&self, el: &Self::Element) -> bool;
    fn set_disabled(&self, el: &Self::Element, disabled: bool);
    fn attribute(&self, el: &Self::Element, name: &str) -> Option<String>;
}

/// A dispatched UI event whose default action can be suppressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Event {
    default_prevented: bool,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory page
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to a node of a [`MemoryDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(ego_tree::NodeId);

/// Parsed page plus the state a browser keeps outside the markup.
struct PageState {
    html: Html,
    body: ego_tree::NodeId,
    values: HashMap<NodeId, String>,
    scroll_top: HashMap<NodeId, usize>,
    focused: Option<NodeId>,
}

impl PageState {
    fn element(&self, el: NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(el.0).and_then(ElementRef::wrap)
    }

    /// Elements reachable from the document root, in document order.
    fn attached(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.html.tree.root().descendants().filter_map(ElementRef::wrap)
    }

    /// Replaces the attributes of `el`, keeping its tag, position and children.
    fn update_attributes(&mut self, el: NodeId, edit: impl FnOnce(&mut Vec<(String, String)>)) {
        let Some(element) = self.element(el) else {
            return;
        };
        let tag = element.value().name().to_string();
        let mut attrs: Vec<(String, String)> = element
            .value()
            .attrs()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        edit(&mut attrs);

        let Some(fresh) = element_node(&tag, &attrs) else {
            return;
        };
        if let Some(mut node) = self.html.tree.get_mut(el.0) {
            *node.value() = fresh;
        }
    }
}

/// In-memory page backed by a parsed HTML tree.
///
/// Only nodes reachable from the document root are visible to lookups, like
/// elements detached from a real document. Form values, focus and scroll
/// positions live beside the tree, as they do in a browser.
pub struct MemoryDocument {
    state: RefCell<PageState>,
}

impl fmt::Debug for MemoryDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elements = self.state.try_borrow().map(|s| s.attached().count()).ok();
        f.debug_struct("MemoryDocument")
            .field("elements", &elements)
            .finish()
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// An empty page.
    pub fn new() -> Self {
        Self::parse("")
    }

    /// Parses a full page or a snippet of body content.
    pub fn parse(markup: &str) -> Self {
        let html = Html::parse_document(markup);
        let root = html.root_element();
        let body = root
            .children()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "body")
            .unwrap_or(root)
            .id();
        Self {
            state: RefCell::new(PageState {
                html,
                body,
                values: HashMap::new(),
                scroll_top: HashMap::new(),
                focused: None,
            }),
        }
    }

    /// The page served at `/`.
    pub fn chat_page() -> Self {
        Self::parse(&crate::pages::index_page())
    }

    pub fn body(&self) -> NodeId {
        NodeId(self.state.borrow().body)
    }

    /// First attached element matching a selector list; `None` for an
    /// invalid list.
    pub fn select_first(&self, selectors: &str) -> Option<NodeId> {
        let selector = Selector::parse(selectors).ok()?;
        self.query_selector(&selector)
    }

    /// Element children of `el`.
    pub fn children(&self, el: NodeId) -> Vec<NodeId> {
        let state = self.state.borrow();
        state.html.tree.get(el.0).map_or_else(Vec::new, |node| {
            node.children()
                .filter_map(ElementRef::wrap)
                .map(|child| NodeId(child.id()))
                .collect()
        })
    }

    pub fn text(&self, el: NodeId) -> String {
        let state = self.state.borrow();
        state
            .element(el)
            .map(|e| e.text().collect())
            .unwrap_or_default()
    }

    /// Serialized markup of `el`, the element included.
    pub fn outer_html(&self, el: NodeId) -> String {
        let state = self.state.borrow();
        state.element(el).map(|e| e.html()).unwrap_or_default()
    }

    pub fn class_name(&self, el: NodeId) -> String {
        self.attribute(&el, "class").unwrap_or_default()
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.state.borrow().focused
    }

    pub fn scroll_top(&self, el: NodeId) -> usize {
        self.state
            .borrow()
            .scroll_top
            .get(&el)
            .copied()
            .unwrap_or(0)
    }

    /// Content height in rows; every child element occupies one row.
    pub fn scroll_height(&self, el: NodeId) -> usize {
        self.children(el).len()
    }

    pub fn set_attribute(&self, el: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        self.state.borrow_mut().update_attributes(el, |attrs| {
            match attrs.iter_mut().find(|(n, _)| *n == name) {
                Some(slot) => slot.1 = value.to_string(),
                None => attrs.push((name, value.to_string())),
            }
        });
    }

    pub fn remove_attribute(&self, el: NodeId, name: &str) {
        let name = name.to_ascii_lowercase();
        self.state
            .borrow_mut()
            .update_attributes(el, |attrs| attrs.retain(|(n, _)| *n != name));
    }
}

impl Document for MemoryDocument {
    type Element = NodeId;

    fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        let state = self.state.borrow();
        state
            .attached()
            .find(|el| el.value().id() == Some(id))
            .map(|el| NodeId(el.id()))
    }

    fn query_selector(&self, selectors: &Selector) -> Option<NodeId> {
        let state = self.state.borrow();
        state
            .html
            .root_element()
            .select(selectors)
            .next()
            .map(|el| NodeId(el.id()))
    }

    fn create_element(&self, tag: &str) -> NodeId {
        // Tags that cannot stand alone in body content become a bare fragment node
        let node = element_node(tag, &[]).unwrap_or(Node::Fragment);
        NodeId(self.state.borrow_mut().html.tree.orphan(node).id())
    }

    fn set_class_name(&self, el: &NodeId, class: &str) {
        self.set_attribute(*el, "class", class);
    }

    fn set_text_content(&self, el: &NodeId, text: &str) {
        let mut state = self.state.borrow_mut();
        let tree = &mut state.html.tree;
        let Some(node) = tree.get(el.0) else {
            return;
        };
        let children: Vec<_> = node.children().map(|c| c.id()).collect();
        for child in children {
            if let Some(mut child) = tree.get_mut(child) {
                child.detach();
            }
        }
        if text.is_empty() {
            return;
        }
        let text = tree.orphan(Node::Text(Text { text: text.into() })).id();
        if let Some(mut node) = tree.get_mut(el.0) {
            node.append_id(text);
        }
    }

    fn append_child(&self, parent: &NodeId, child: &NodeId) {
        let mut state = self.state.borrow_mut();
        let tree = &mut state.html.tree;
        let Some(target) = tree.get(parent.0) else {
            return;
        };
        // A node cannot become its own descendant
        if target.ancestors().chain([target]).any(|n| n.id() == child.0) {
            return;
        }
        if let Some(mut node) = tree.get_mut(child.0) {
            node.detach();
        }
        if let Some(mut node) = tree.get_mut(parent.0) {
            node.append_id(child.0);
        }
    }

    fn insert_before(&self, parent: &NodeId, child: &NodeId, reference: &NodeId) {
        let under_parent = {
            let state = self.state.borrow();
            state
                .html
                .tree
                .get(reference.0)
                .and_then(|r| r.parent())
                .is_some_and(|p| p.id() == parent.0)
        };
        if !under_parent || child == reference {
            self.append_child(parent, child);
            return;
        }

        let mut state = self.state.borrow_mut();
        let tree = &mut state.html.tree;
        let Some(target) = tree.get(parent.0) else {
            return;
        };
        if target.ancestors().chain([target]).any(|n| n.id() == child.0) {
            return;
        }
        if let Some(mut node) = tree.get_mut(child.0) {
            node.detach();
        }
        if let Some(mut node) = tree.get_mut(reference.0) {
            node.insert_id_before(child.0);
        }
    }

    fn parent(&self, el: &NodeId) -> Option<NodeId> {
        let state = self.state.borrow();
        state
            .html
            .tree
            .get(el.0)?
            .parent()
            .map(|p| NodeId(p.id()))
    }

    fn scroll_to_bottom(&self, el: &NodeId) {
        let height = self.scroll_height(*el);
        self.state.borrow_mut().scroll_top.insert(*el, height);
    }

    fn value(&self, el: &NodeId) -> String {
        self.state
            .borrow()
            .values
            .get(el)
            .cloned()
            .unwrap_or_default()
    }

    fn set_value(&self, el: &NodeId, value: &str) {
        self.state.borrow_mut().values.insert(*el, value.to_string());
    }

    fn focus(&self, el: &NodeId) {
        self.state.borrow_mut().focused = Some(*el);
    }

    fn is_disabled(&self, el: &NodeId) -> bool {
        self.attribute(el, "disabled").is_some()
    }

    fn set_disabled(&self, el: &NodeId, disabled: bool) {
        if disabled {
            self.set_attribute(*el, "disabled", "");
        } else {
            self.remove_attribute(*el, "disabled");
        }
    }

    fn attribute(&self, el: &NodeId, name: &str) -> Option<String> {
        let state = self.state.borrow();
        state.element(*el)?.value().attr(name).map(str::to_string)
    }
}

/// Builds a detached element node by parsing its markup.
///
/// Names are reduced to characters valid in markup; values are escaped.
fn element_node(tag: &str, attrs: &[(String, String)]) -> Option<Node> {
    let tag = markup_name(tag);
    if tag.is_empty() {
        return None;
    }
    let mut markup = format!("<{tag}");
    for (name, value) in attrs {
        let name = markup_name(name);
        if !name.is_empty() {
            markup.push_str(&format!(r#" {name}="{}""#, escape_attribute(value)));
        }
    }
    markup.push_str(&format!("></{tag}>"));

    let fragment = Html::parse_fragment(&markup);
    fragment
        .root_element()
        .children()
        .find_map(ElementRef::wrap)
        .filter(|el| el.value().name() == tag)
        .map(|el| Node::Element(el.value().clone()))
}

fn markup_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'))
        .collect::<String>()
        .to_ascii_lowercase()
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
