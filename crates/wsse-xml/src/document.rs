#![forbid(unsafe_code)]

//! Owned, mutable XML tree.
//!
//! Nodes live in an arena owned by [`Document`] and are addressed by
//! [`NodeId`]. Detaching a node only unlinks it; the slot stays allocated
//! until the document is dropped, so stale ids never alias a different node.

use std::collections::BTreeMap;
use wsse_core::{ns, Error};

/// Handle to a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A namespace-qualified name as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub prefix: Option<String>,
    pub local_name: String,
    pub namespace_uri: Option<String>,
}

impl QName {
    /// Build a name; an empty `prefix` or `namespace_uri` means none.
    pub fn new(prefix: &str, local_name: &str, namespace_uri: &str) -> Self {
        Self {
            prefix: (!prefix.is_empty()).then(|| prefix.to_owned()),
            local_name: local_name.to_owned(),
            namespace_uri: (!namespace_uri.is_empty()).then(|| namespace_uri.to_owned()),
        }
    }

    /// An unprefixed name in no namespace.
    pub fn local(local_name: &str) -> Self {
        Self::new("", local_name, "")
    }

    /// `prefix:local` or just `local`.
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.local_name),
            None => self.local_name.clone(),
        }
    }

    /// Match on local name and namespace URI (`""` for no namespace).
    pub fn is(&self, local_name: &str, namespace_uri: &str) -> bool {
        self.local_name == local_name
            && self.namespace_uri.as_deref().unwrap_or("") == namespace_uri
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: QName,
    /// Declarations made on this element, as `(prefix, uri)`; `""` is the
    /// default namespace and an empty URI undeclares it.
    pub namespace_declarations: Vec<(String, String)>,
    pub attributes: Vec<Attribute>,
}

impl Element {
    /// Look up an attribute value by local name and namespace (`None` for
    /// unqualified attributes).
    pub fn attribute(&self, local_name: &str, namespace_uri: Option<&str>) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| {
                a.name.local_name == local_name && a.name.namespace_uri.as_deref() == namespace_uri
            })
            .map(|a| a.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingInstruction {
    pub target: String,
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element(Element),
    Text(String),
    Comment(String),
    ProcessingInstruction(ProcessingInstruction),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An XML document held as an arena of nodes.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
}

const FRAGMENT_WRAPPER: &str = "wsse-fragment";

impl Document {
    /// An empty document containing only the root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Parse XML text into an owned tree. DTDs are rejected.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let source =
            roxmltree::Document::parse(text).map_err(|e| Error::XmlParse(e.to_string()))?;
        let mut doc = Self::new();
        let root = doc.root();
        doc.import(text, source.root(), Some(root))?;
        Ok(doc)
    }

    /// Parse `text` as mixed content in the namespace scope of `context`.
    ///
    /// The returned top-level nodes are detached; the caller splices them
    /// into the tree.
    pub fn parse_fragment(&mut self, context: NodeId, text: &str) -> Result<Vec<NodeId>, Error> {
        let mut wrapper = String::with_capacity(text.len() + 128);
        wrapper.push('<');
        wrapper.push_str(FRAGMENT_WRAPPER);
        for (prefix, uri) in self.in_scope_namespaces(context) {
            if prefix.is_empty() {
                wrapper.push_str(" xmlns=\"");
            } else {
                wrapper.push_str(" xmlns:");
                wrapper.push_str(&prefix);
                wrapper.push_str("=\"");
            }
            wrapper.push_str(&crate::writer::escape_attr(&uri));
            wrapper.push('"');
        }
        wrapper.push('>');
        wrapper.push_str(text);
        wrapper.push_str("</");
        wrapper.push_str(FRAGMENT_WRAPPER);
        wrapper.push('>');

        let source = roxmltree::Document::parse(&wrapper)
            .map_err(|e| Error::XmlParse(format!("decrypted content: {e}")))?;
        self.import(&wrapper, source.root_element(), None)
    }

    /// Copy the children of `source` into this arena, attached under
    /// `parent` or left detached when `parent` is `None`.
    ///
    /// Returns the ids of the copied top-level nodes.
    fn import(
        &mut self,
        input: &str,
        source: roxmltree::Node<'_, '_>,
        parent: Option<NodeId>,
    ) -> Result<Vec<NodeId>, Error> {
        let mut top = Vec::new();
        let mut stack: Vec<(roxmltree::Node<'_, '_>, Option<NodeId>)> =
            source.children().rev().map(|c| (c, parent)).collect();

        while let Some((node, target)) = stack.pop() {
            let kind = match node.node_type() {
                roxmltree::NodeType::Element => NodeKind::Element(import_element(input, node)),
                roxmltree::NodeType::Text => NodeKind::Text(node.text().unwrap_or("").to_owned()),
                roxmltree::NodeType::Comment => {
                    NodeKind::Comment(node.text().unwrap_or("").to_owned())
                }
                roxmltree::NodeType::PI => match node.pi() {
                    Some(pi) => NodeKind::ProcessingInstruction(ProcessingInstruction {
                        target: pi.target.to_owned(),
                        data: pi.value.map(str::to_owned),
                    }),
                    None => continue,
                },
                roxmltree::NodeType::Root => continue,
            };
            let id = self.push(kind);
            match target {
                Some(t) => self.link_last(t, id),
                None => top.push(id),
            }
            if node.is_element() {
                for child in node.children().rev() {
                    stack.push((child, Some(id)));
                }
            }
        }
        Ok(top)
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn link_last(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    fn check(&self, id: NodeId) -> Result<(), Error> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(Error::MalformedInput(format!("unknown node {}", id.0)))
        }
    }

    // ── Navigation ───────────────────────────────────────────────────

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The single top-level element.
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root())
            .iter()
            .copied()
            .find(|c| self.element(*c).is_some())
    }

    pub fn node_kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.0).map(|n| &n.kind)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.node_kind(id) {
            Some(NodeKind::Element(e)) => Some(e),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match self.nodes.get_mut(id.0).map(|n| &mut n.kind) {
            Some(NodeKind::Element(e)) => Some(e),
            _ => None,
        }
    }

    /// Whether `id` is an element with the given local name and namespace.
    pub fn is_element(&self, id: NodeId, local_name: &str, namespace_uri: &str) -> bool {
        self.element(id)
            .is_some_and(|e| e.name.is(local_name, namespace_uri))
    }

    pub fn attribute(&self, id: NodeId, local_name: &str, namespace_uri: Option<&str>) -> Option<&str> {
        self.element(id)
            .and_then(|e| e.attribute(local_name, namespace_uri))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.element(*c).is_some())
            .collect()
    }

    pub fn first_element_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|c| self.element(*c).is_some())
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = self.children(self.parent(id)?);
        let pos = siblings.iter().position(|s| *s == id)?;
        pos.checked_sub(1).map(|p| siblings[p])
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = self.children(self.parent(id)?);
        let pos = siblings.iter().position(|s| *s == id)?;
        siblings.get(pos + 1).copied()
    }

    /// Pre-order traversal of `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            stack: if id.0 < self.nodes.len() { vec![id] } else { Vec::new() },
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for n in self.descendants(id) {
            if let Some(NodeKind::Text(t)) = self.node_kind(n) {
                out.push_str(t);
            }
        }
        out
    }

    /// Prefix → URI bindings visible at `id`, excluding the `xml` prefix.
    pub fn in_scope_namespaces(&self, id: NodeId) -> BTreeMap<String, String> {
        let mut levels = Vec::new();
        let mut current = Some(id);
        while let Some(n) = current {
            if let Some(e) = self.element(n) {
                levels.push(&e.namespace_declarations);
            }
            current = self.parent(n);
        }

        let mut result = BTreeMap::new();
        for decls in levels.into_iter().rev() {
            for (prefix, uri) in decls {
                if uri.is_empty() {
                    result.remove(prefix);
                } else {
                    result.insert(prefix.clone(), uri.clone());
                }
            }
        }
        result
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    // ── Construction ─────────────────────────────────────────────────

    /// Create a detached element.
    pub fn create_element(&mut self, name: QName) -> NodeId {
        self.push(NodeKind::Element(Element {
            name,
            namespace_declarations: Vec::new(),
            attributes: Vec::new(),
        }))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_owned()))
    }

    /// Set (or replace) an attribute on an element.
    pub fn set_attribute(&mut self, id: NodeId, name: QName, value: &str) -> Result<(), Error> {
        let elem = self
            .element_mut(id)
            .ok_or_else(|| Error::MalformedInput("attribute target is not an element".into()))?;
        match elem.attributes.iter_mut().find(|a| {
            a.name.local_name == name.local_name && a.name.namespace_uri == name.namespace_uri
        }) {
            Some(existing) => existing.value = value.to_owned(),
            None => elem.attributes.push(Attribute {
                name,
                value: value.to_owned(),
            }),
        }
        Ok(())
    }

    /// Declare `prefix` (`""` for the default namespace) on an element.
    pub fn declare_namespace(&mut self, id: NodeId, prefix: &str, uri: &str) -> Result<(), Error> {
        let elem = self
            .element_mut(id)
            .ok_or_else(|| Error::MalformedInput("namespace target is not an element".into()))?;
        match elem
            .namespace_declarations
            .iter_mut()
            .find(|(p, _)| p == prefix)
        {
            Some(existing) => existing.1 = uri.to_owned(),
            None => elem
                .namespace_declarations
                .push((prefix.to_owned(), uri.to_owned())),
        }
        Ok(())
    }

    /// Replace all children of `id` with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<(), Error> {
        self.check(id)?;
        for child in std::mem::take(&mut self.nodes[id.0].children) {
            self.nodes[child.0].parent = None;
        }
        let t = self.create_text(text);
        self.link_last(id, t);
        Ok(())
    }

    // ── Mutation ─────────────────────────────────────────────────────

    fn can_adopt(&self, parent: NodeId, child: NodeId) -> Result<(), Error> {
        self.check(parent)?;
        self.check(child)?;
        if child == self.root() {
            return Err(Error::MalformedInput("the document root cannot be moved".into()));
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(Error::MalformedInput("cannot insert a node into itself".into()));
        }
        Ok(())
    }

    /// Unlink a node from its parent. No-op for detached nodes.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.parent(id) {
            self.nodes[parent.0].children.retain(|c| *c != id);
            self.nodes[id.0].parent = None;
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), Error> {
        self.can_adopt(parent, child)?;
        self.detach(child);
        self.link_last(parent, child);
        Ok(())
    }

    /// Insert `child` as the first child of `parent`.
    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), Error> {
        self.can_adopt(parent, child)?;
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(0, child);
        Ok(())
    }

    /// Insert `new` immediately before `reference` under the same parent.
    pub fn insert_before(&mut self, reference: NodeId, new: NodeId) -> Result<(), Error> {
        let parent = self
            .parent(reference)
            .ok_or_else(|| Error::MalformedInput("reference node is detached".into()))?;
        self.can_adopt(parent, new)?;
        self.detach(new);
        let pos = self.nodes[parent.0]
            .children
            .iter()
            .position(|c| *c == reference)
            .ok_or_else(|| Error::MalformedInput("reference node is detached".into()))?;
        self.nodes[new.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(pos, new);
        Ok(())
    }

    /// Put `replacements`, in order, where `old` stood and detach `old`.
    pub fn replace_with(&mut self, old: NodeId, replacements: &[NodeId]) -> Result<(), Error> {
        for r in replacements {
            self.insert_before(old, *r)?;
        }
        self.detach(old);
        Ok(())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator returned by [`Document::descendants`].
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.doc.children(id).iter().rev().copied());
        Some(id)
    }
}

/// Copy one element's name, declarations and attributes out of `roxmltree`.
fn import_element(input: &str, node: roxmltree::Node<'_, '_>) -> Element {
    // roxmltree resolves names but does not keep prefixes; read the tag as
    // written in the source.
    let raw = input.get(node.range().start + 1..).unwrap_or("");
    let end = raw
        .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .unwrap_or(raw.len());
    let prefix = raw[..end].split_once(':').map(|(p, _)| p).unwrap_or("");
    let tag = node.tag_name();
    let name = QName::new(prefix, tag.name(), tag.namespace().unwrap_or(""));

    let inherited: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|p| p.namespaces().map(|n| (n.name(), n.uri())).collect())
        .unwrap_or_default();
    let mut namespace_declarations = Vec::new();
    for n in node.namespaces() {
        if n.name() == Some(ns::prefix::XML) {
            continue;
        }
        if !inherited.contains(&(n.name(), n.uri())) {
            namespace_declarations.push((n.name().unwrap_or("").to_owned(), n.uri().to_owned()));
        }
    }
    let has_default = node.namespaces().any(|n| n.name().is_none());
    if !has_default && inherited.iter().any(|(p, _)| p.is_none()) {
        namespace_declarations.push((String::new(), String::new()));
    }

    let attributes = node
        .attributes()
        .map(|a| {
            let prefix = match a.namespace() {
                None => "",
                Some(ns::XML) => ns::prefix::XML,
                Some(uri) => node
                    .namespaces()
                    .find(|n| n.uri() == uri && n.name().is_some())
                    .and_then(|n| n.name())
                    .unwrap_or(""),
            };
            Attribute {
                name: QName::new(prefix, a.name(), a.namespace().unwrap_or("")),
                value: a.value().to_owned(),
            }
        })
        .collect();

    Element {
        name,
        namespace_declarations,
        attributes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope"><soap:Header/><soap:Body id="TheBody"><ns:Ping xmlns:ns="urn:ping">42</ns:Ping></soap:Body></soap:Envelope>"#;

    #[test]
    fn test_parse_keeps_prefixes_and_declarations() {
        let doc = Document::parse(SAMPLE).unwrap();
        let env = doc.document_element().unwrap();
        let e = doc.element(env).unwrap();
        assert_eq!(e.name.qualified(), "soap:Envelope");
        assert_eq!(
            e.namespace_declarations,
            vec![("soap".to_owned(), ns::SOAP12.to_owned())]
        );

        let body = doc.element_children(env)[1];
        assert_eq!(doc.attribute(body, "id", None), Some("TheBody"));
        let ping = doc.first_element_child(body).unwrap();
        let p = doc.element(ping).unwrap();
        assert_eq!(p.name.qualified(), "ns:Ping");
        assert_eq!(p.namespace_declarations.len(), 1);
        assert_eq!(doc.text_content(ping), "42");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(Document::parse("<a><b></a>"), Err(Error::XmlParse(_))));
    }

    #[test]
    fn test_undeclared_default_namespace() {
        let doc = Document::parse(r#"<a xmlns="urn:x"><b xmlns=""/></a>"#).unwrap();
        let a = doc.document_element().unwrap();
        let b = doc.first_element_child(a).unwrap();
        assert_eq!(
            doc.element(b).unwrap().namespace_declarations,
            vec![(String::new(), String::new())]
        );
        assert!(doc.in_scope_namespaces(b).is_empty());
    }

    #[test]
    fn test_prefixed_attribute() {
        let doc = Document::parse(
            r#"<a xmlns:wsu="urn:wsu"><b wsu:Id="x1" Id="x2"/></a>"#,
        )
        .unwrap();
        let a = doc.document_element().unwrap();
        let b = doc.first_element_child(a).unwrap();
        assert_eq!(doc.attribute(b, "Id", Some("urn:wsu")), Some("x1"));
        assert_eq!(doc.attribute(b, "Id", None), Some("x2"));
        let attr = &doc.element(b).unwrap().attributes[0];
        assert_eq!(attr.name.qualified(), "wsu:Id");
    }

    #[test]
    fn test_prepend_and_insert_before() {
        let mut doc = Document::parse("<r><b/></r>").unwrap();
        let r = doc.document_element().unwrap();
        let b = doc.first_element_child(r).unwrap();
        let a = doc.create_element(QName::local("a"));
        doc.prepend_child(r, a).unwrap();
        let x = doc.create_element(QName::local("x"));
        doc.insert_before(b, x).unwrap();
        let names: Vec<String> = doc
            .element_children(r)
            .iter()
            .map(|c| doc.element(*c).unwrap().name.local_name.clone())
            .collect();
        assert_eq!(names, ["a", "x", "b"]);
        assert_eq!(doc.previous_sibling(b), Some(x));
        assert_eq!(doc.next_sibling(a), Some(x));
    }

    #[test]
    fn test_cannot_insert_into_descendant() {
        let mut doc = Document::parse("<r><c/></r>").unwrap();
        let r = doc.document_element().unwrap();
        let c = doc.first_element_child(r).unwrap();
        assert!(doc.append_child(c, r).is_err());
    }

    #[test]
    fn test_parse_fragment_uses_context_namespaces() {
        let mut doc = Document::parse(
            r#"<e:Envelope xmlns:e="urn:e" xmlns:ns="urn:ping"><e:Body/></e:Envelope>"#,
        )
        .unwrap();
        let env = doc.document_element().unwrap();
        let body = doc.first_element_child(env).unwrap();
        let nodes = doc.parse_fragment(body, "<ns:Ping>42</ns:Ping>tail").unwrap();
        assert_eq!(nodes.len(), 2);
        let ping = doc.element(nodes[0]).unwrap();
        assert!(ping.name.is("Ping", "urn:ping"));
        assert!(ping.namespace_declarations.is_empty());
        assert_eq!(doc.parent(nodes[0]), None);
        assert!(matches!(doc.node_kind(nodes[1]), Some(NodeKind::Text(t)) if t == "tail"));
    }

    #[test]
    fn test_descendants_is_preorder() {
        let doc = Document::parse("<a><b><c/></b><d/></a>").unwrap();
        let a = doc.document_element().unwrap();
        let names: Vec<String> = doc
            .descendants(a)
            .filter_map(|n| doc.element(n).map(|e| e.name.local_name.clone()))
            .collect();
        assert_eq!(names, ["a", "b", "c", "d"]);
    }

    #[test]
    fn test_deep_tree_does_not_overflow() {
        // roxmltree caps nesting depth, so build the chain by hand.
        let depth = 5_000;
        let mut doc = Document::new();
        let mut parent = doc.root();
        for _ in 0..depth {
            let n = doc.create_element(QName::local("n"));
            doc.append_child(parent, n).unwrap();
            parent = n;
        }
        assert_eq!(doc.descendants(doc.root()).count(), depth + 1);
        assert_eq!(doc.in_scope_namespaces(parent).len(), 0);
    }
}
