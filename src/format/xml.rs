use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// One XML element subtree. Records in XML streams are carried as
/// subtrees rather than lines; fields address attributes, child
/// elements, or the element text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    pub text: String,
}

impl XmlNode {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    #[inline]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attribute<K, V>(&mut self, name: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.attributes.push((name.into(), value.into()));
    }

    #[inline]
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn add_child(&mut self, child: XmlNode) {
        self.children.push(child);
    }

    /// Whether the element carries the standard nil marker.
    pub fn is_nil(&self) -> bool {
        self.attribute("xsi:nil")
            .or_else(|| self.attribute("nil"))
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false)
    }

    pub fn set_nil(&mut self) {
        self.set_attribute("xsi:nil", "true");
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        write_node(self, &mut out);
        out
    }
}

/// Parses a document into its root element subtree.
pub(crate) fn parse_document(text: &str) -> std::result::Result<XmlNode, String> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(start) => stack.push(node_from_start(&start)?),
            Event::Empty(start) => {
                let node = node_from_start(&start)?;
                attach(&mut stack, &mut root, node);
            }
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    let unescaped = t.unescape().map_err(|e| e.to_string())?;
                    top.text.push_str(&unescaped);
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    let raw = c.into_inner();
                    top.text.push_str(&String::from_utf8_lossy(&raw));
                }
            }
            Event::End(_) => {
                let mut node = stack.pop().ok_or("unbalanced element close")?;
                // whitespace between child elements is not content
                if !node.children.is_empty() && node.text.trim().is_empty() {
                    node.text.clear();
                }
                attach(&mut stack, &mut root, node);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err("unclosed element".to_string());
    }
    root.ok_or_else(|| "document has no root element".to_string())
}

fn node_from_start(start: &BytesStart<'_>) -> std::result::Result<XmlNode, String> {
    let name = String::from_utf8_lossy(start.name().local_name().as_ref()).into_owned();
    let mut node = XmlNode::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| e.to_string())?
            .into_owned();
        node.attributes.push((key, value));
    }
    Ok(node)
}

fn attach(stack: &mut Vec<XmlNode>, root: &mut Option<XmlNode>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            if root.is_none() {
                *root = Some(node);
            }
        }
    }
}

/// Serializes a subtree. Escaping is handled here so builders work with
/// plain text throughout.
pub(crate) fn write_node(node: &XmlNode, out: &mut String) {
    out.push('<');
    out.push_str(&node.name);
    for (key, value) in &node.attributes {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        escape_into(value, out);
        out.push('"');
    }
    if node.text.is_empty() && node.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    escape_into(&node.text, out);
    for child in &node.children {
        write_node(child, out);
    }
    out.push_str("</");
    out.push_str(&node.name);
    out.push('>');
}

fn escape_into(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subtree() {
        let root = parse_document(
            r#"<batch>
                <order id="1"><sku>A&amp;B</sku><qty>2</qty></order>
                <order id="2"/>
            </batch>"#,
        )
        .unwrap();

        assert_eq!(root.name, "batch");
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.text, "");

        let first = &root.children[0];
        assert_eq!(first.attribute("id"), Some("1"));
        assert_eq!(first.child("sku").unwrap().text, "A&B");
        assert_eq!(first.child("qty").unwrap().text, "2");
        assert!(first.child("missing").is_none());
    }

    #[test]
    fn nil_marker() {
        let root = parse_document(r#"<r><a xsi:nil="true"/><b>x</b></r>"#).unwrap();
        assert!(root.children[0].is_nil());
        assert!(!root.children[1].is_nil());

        let mut node = XmlNode::new("a");
        node.set_nil();
        assert_eq!(node.to_xml(), r#"<a xsi:nil="true"/>"#);
    }

    #[test]
    fn write_round_trip() {
        let mut order = XmlNode::new("order");
        order.set_attribute("id", "7");
        let mut sku = XmlNode::new("sku");
        sku.text.push_str("a<b>&c");
        order.add_child(sku);

        let xml = order.to_xml();
        assert_eq!(xml, r#"<order id="7"><sku>a&lt;b&gt;&amp;c</sku></order>"#);
        assert_eq!(parse_document(&xml).unwrap(), order);
    }

    #[test]
    fn rejects_unbalanced() {
        assert!(parse_document("<a><b></a>").is_err());
        assert!(parse_document("  ").is_err());
    }

    #[test]
    fn namespaced_names_match_locally() {
        let root = parse_document(r#"<ns:r xmlns:ns="urn:x"><ns:f>1</ns:f></ns:r>"#).unwrap();
        assert_eq!(root.name, "r");
        assert_eq!(root.children[0].name, "f");
    }
}
