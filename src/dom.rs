use super::*;

const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROW_SIZE: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone)]
pub(crate) enum NodeType {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) node_type: NodeType,
}

#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub(crate) tag_name: String,
    // Source order is kept so serialization is stable.
    pub(crate) attrs: Vec<(String, String)>,
}

impl Element {
    pub(crate) fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn set_attr(&mut self, name: &str, value: String) {
        if let Some(slot) = self.attrs.iter_mut().find(|(key, _)| key == name) {
            slot.1 = value;
        } else {
            self.attrs.push((name.to_string(), value));
        }
    }

    fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(key, _)| key != name);
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Dom {
    nodes: Vec<Node>,
    pub(crate) root: NodeId,
    id_index: HashMap<String, NodeId>,
}

impl Dom {
    pub(crate) fn new() -> Self {
        let root = Node {
            parent: None,
            children: Vec::new(),
            node_type: NodeType::Document,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            id_index: HashMap::new(),
        }
    }

    fn create_node(&mut self, parent: Option<NodeId>, node_type: NodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            node_type,
        });
        if let Some(parent_id) = parent {
            self.nodes[parent_id.0].children.push(id);
        }
        id
    }

    pub(crate) fn create_element(
        &mut self,
        parent: NodeId,
        tag_name: String,
        attrs: Vec<(String, String)>,
    ) -> NodeId {
        let element = Element { tag_name, attrs };
        let id_attr = element.attr("id").map(ToOwned::to_owned);
        let id = self.create_node(Some(parent), NodeType::Element(element));
        if let Some(id_attr) = id_attr {
            // First occurrence wins, like getElementById.
            self.id_index.entry(id_attr).or_insert(id);
        }
        id
    }

    pub(crate) fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        self.create_node(Some(parent), NodeType::Text(text))
    }

    /// Copies the children of `fragment`'s document node under `parent`.
    /// Returns the ids of the top-level nodes created.
    pub(crate) fn append_fragment(&mut self, parent: NodeId, fragment: &Dom) -> Result<Vec<NodeId>> {
        if self.element(parent).is_none() && parent != self.root {
            return Err(Error::Runtime("append target is not an element".into()));
        }
        let mut created = Vec::new();
        for child in fragment.children(fragment.root) {
            created.push(self.import_node(parent, fragment, *child));
        }
        Ok(created)
    }

    fn import_node(&mut self, parent: NodeId, fragment: &Dom, source: NodeId) -> NodeId {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            let node_type = fragment.nodes[source.0].node_type.clone();
            let id = match node_type {
                NodeType::Element(element) => {
                    self.create_element(parent, element.tag_name, element.attrs)
                }
                NodeType::Text(text) => self.create_text(parent, text),
                NodeType::Document => return parent,
            };
            for child in fragment.children(source) {
                self.import_node(id, fragment, *child);
            }
            id
        })
    }

    pub(crate) fn contains(&self, node_id: NodeId) -> bool {
        node_id.0 < self.nodes.len()
    }

    pub(crate) fn element(&self, node_id: NodeId) -> Option<&Element> {
        match &self.nodes.get(node_id.0)?.node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, node_id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(node_id.0)?.node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn tag_name(&self, node_id: NodeId) -> Option<&str> {
        self.element(node_id).map(|e| e.tag_name.as_str())
    }

    pub(crate) fn attr(&self, node_id: NodeId, name: &str) -> Option<&str> {
        self.element(node_id).and_then(|e| e.attr(name))
    }

    pub(crate) fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.nodes.get(node_id.0).and_then(|node| node.parent)
    }

    pub(crate) fn children(&self, node_id: NodeId) -> &[NodeId] {
        self.nodes
            .get(node_id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn by_id(&self, id: &str) -> Option<NodeId> {
        self.id_index.get(id).copied()
    }

    pub(crate) fn is_descendant_of(&self, node_id: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = self.parent(node_id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Walks from `node_id` (inclusive) through its parents and returns the
    /// first element carrying `class_name`.
    pub(crate) fn closest_with_class(&self, node_id: NodeId, class_name: &str) -> Option<NodeId> {
        let mut cursor = Some(node_id);
        while let Some(current) = cursor {
            if self
                .element(current)
                .is_some_and(|element| has_class(element, class_name))
            {
                return Some(current);
            }
            cursor = self.parent(current);
        }
        None
    }

    pub(crate) fn class_contains(&self, node_id: NodeId, class_name: &str) -> Result<bool> {
        let element = self
            .element(node_id)
            .ok_or_else(|| Error::Runtime("classList target is not an element".into()))?;
        Ok(has_class(element, class_name))
    }

    pub(crate) fn class_list(&self, node_id: NodeId) -> Result<Vec<String>> {
        let element = self
            .element(node_id)
            .ok_or_else(|| Error::Runtime("classList target is not an element".into()))?;
        Ok(class_tokens(element.attr("class")))
    }

    pub(crate) fn class_add(&mut self, node_id: NodeId, class_name: &str) -> Result<()> {
        let element = self
            .element_mut(node_id)
            .ok_or_else(|| Error::Runtime("classList target is not an element".into()))?;
        let mut classes = class_tokens(element.attr("class"));
        if !classes.iter().any(|name| name == class_name) {
            classes.push(class_name.to_string());
        }
        set_class_attr(element, &classes);
        Ok(())
    }

    pub(crate) fn class_remove(&mut self, node_id: NodeId, class_name: &str) -> Result<()> {
        let element = self
            .element_mut(node_id)
            .ok_or_else(|| Error::Runtime("classList target is not an element".into()))?;
        let mut classes = class_tokens(element.attr("class"));
        classes.retain(|name| name != class_name);
        set_class_attr(element, &classes);
        Ok(())
    }

    pub(crate) fn class_toggle(&mut self, node_id: NodeId, class_name: &str) -> Result<bool> {
        if self.class_contains(node_id, class_name)? {
            self.class_remove(node_id, class_name)?;
            Ok(false)
        } else {
            self.class_add(node_id, class_name)?;
            Ok(true)
        }
    }

    /// Elements under `root` in document order, excluding `root` itself.
    pub(crate) fn descendant_elements(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(root).iter().rev().copied().collect();
        while let Some(node_id) = stack.pop() {
            if self.element(node_id).is_some() {
                out.push(node_id);
            }
            stack.extend(self.children(node_id).iter().rev().copied());
        }
        out
    }

    pub(crate) fn elements_by_class_name(&self, class_name: &str) -> Vec<NodeId> {
        self.descendant_elements(self.root)
            .into_iter()
            .filter(|node_id| {
                self.element(*node_id)
                    .is_some_and(|element| has_class(element, class_name))
            })
            .collect()
    }

    pub(crate) fn text_content(&self, node_id: NodeId) -> String {
        let mut out = String::new();
        self.write_text_content(node_id, &mut out);
        out
    }

    fn write_text_content(&self, node_id: NodeId, out: &mut String) {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            match self.nodes.get(node_id.0).map(|node| &node.node_type) {
                Some(NodeType::Text(text)) => out.push_str(text),
                Some(NodeType::Document | NodeType::Element(_)) => {
                    for child in self.children(node_id) {
                        self.write_text_content(*child, out);
                    }
                }
                None => {}
            }
        })
    }

    pub(crate) fn dump_node(&self, node_id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node_id, &mut out);
        out
    }

    fn write_node(&self, node_id: NodeId, out: &mut String) {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            let Some(node) = self.nodes.get(node_id.0) else {
                return;
            };
            match &node.node_type {
                NodeType::Document => {
                    for child in &node.children {
                        self.write_node(*child, out);
                    }
                }
                NodeType::Text(text) => {
                    let raw = node
                        .parent
                        .and_then(|parent| self.tag_name(parent))
                        .is_some_and(|tag| matches!(tag, "script" | "style"));
                    if raw {
                        out.push_str(text);
                    } else {
                        push_escaped(out, text, false);
                    }
                }
                NodeType::Element(element) => {
                    out.push('<');
                    out.push_str(&element.tag_name);
                    for (k, v) in &element.attrs {
                        out.push(' ');
                        out.push_str(k);
                        out.push_str("=\"");
                        push_escaped(out, v, true);
                        out.push('"');
                    }
                    out.push('>');
                    if html::is_void_tag(&element.tag_name) {
                        return;
                    }
                    for child in &node.children {
                        self.write_node(*child, out);
                    }
                    out.push_str("</");
                    out.push_str(&element.tag_name);
                    out.push('>');
                }
            }
        })
    }
}

fn push_escaped(out: &mut String, src: &str, in_attr: bool) {
    for ch in src.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' if in_attr => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

pub(crate) fn has_class(element: &Element, class_name: &str) -> bool {
    element
        .attr("class")
        .map(|classes| classes.split_ascii_whitespace().any(|c| c == class_name))
        .unwrap_or(false)
}

pub(crate) fn class_tokens(class_attr: Option<&str>) -> Vec<String> {
    class_attr
        .map(|value| {
            value
                .split_ascii_whitespace()
                .map(ToOwned::to_owned)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
}

fn set_class_attr(element: &mut Element, classes: &[String]) {
    if classes.is_empty() {
        element.remove_attr("class");
    } else {
        element.set_attr("class", classes.join(" "));
    }
}
