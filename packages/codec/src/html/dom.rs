//! Tolerant DOM builder over the token stream.
//!
//! Follows the forgiving parts of browser parsing that matter for pasted
//! and hand-edited content: void elements, implied end tags for `p`, `li`
//! and table cells, raw text in `script`/`style`, and stray end tags being
//! ignored. Unterminated comments and tags are errors.

use crate::error::CodecError;
use logos::Logos;

use crate::html::lexer::{describe_error, Token};

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    fn new(tag: impl Into<String>, attrs: Vec<(String, String)>) -> Self {
        Self {
            tag: tag.into(),
            attrs,
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    /// Value of one declaration in the inline `style` attribute
    pub fn style(&self, property: &str) -> Option<&str> {
        self.attr("style")?.split(';').find_map(|declaration| {
            let (name, value) = declaration.split_once(':')?;
            (name.trim().eq_ignore_ascii_case(property)).then(|| value.trim())
        })
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// First descendant element with the given tag
    pub fn find(&self, tag: &str) -> Option<&Element> {
        for element in self.elements() {
            if element.tag == tag {
                return Some(element);
            }
            if let Some(found) = element.find(tag) {
                return Some(found);
            }
        }
        None
    }

    pub fn text_content(&self) -> String {
        let mut text = String::new();
        collect_text(&self.children, &mut text);
        text
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => collect_text(&element.children, out),
            Node::Comment(_) => {}
        }
    }
}

fn is_void(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

fn is_raw_text(tag: &str) -> bool {
    matches!(tag, "script" | "style" | "textarea" | "title")
}

/// Whether opening `next` implicitly closes an open `open`
fn implies_end(open: &str, next: &str) -> bool {
    match open {
        "p" => matches!(
            next,
            "p" | "div"
                | "h1"
                | "h2"
                | "h3"
                | "h4"
                | "h5"
                | "h6"
                | "ul"
                | "ol"
                | "pre"
                | "blockquote"
                | "table"
                | "hr"
                | "figure"
        ),
        "li" => next == "li",
        "td" | "th" => matches!(next, "td" | "th" | "tr"),
        "tr" => next == "tr",
        _ => false,
    }
}

/// Parse markup into a synthetic `#root` element
pub fn parse(source: &str) -> Result<Element, CodecError> {
    let mut stack = vec![Element::new("#root", Vec::new())];
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let token = result.map_err(|_| CodecError::Markup {
            offset: span.start,
            message: describe_error(&source[span.start..]).to_string(),
        })?;

        match token {
            Token::Comment(body) => push_child(&mut stack, Node::Comment(body.to_string())),
            Token::Declaration => {}
            Token::StartTag(raw) => {
                let (tag, attrs, self_closing) = parse_start_tag(raw);
                while stack.len() > 1 && implies_end(&stack[stack.len() - 1].tag, &tag) {
                    pop(&mut stack);
                }
                let element = Element::new(tag.clone(), attrs);
                if is_void(&tag) || self_closing {
                    push_child(&mut stack, Node::Element(element));
                    continue;
                }
                stack.push(element);
                if is_raw_text(&tag) {
                    // Skip straight to the matching end tag
                    let rest = lexer.remainder();
                    let end = rest
                        .to_ascii_lowercase()
                        .find(&format!("</{}", tag))
                        .unwrap_or(rest.len());
                    if end > 0 {
                        push_child(&mut stack, Node::Text(decode_entities(&rest[..end])));
                    }
                    lexer.bump(end);
                }
            }
            Token::EndTag(raw) => close(&mut stack, &tag_name(raw)),
            Token::Text(text) => push_text(&mut stack, &decode_entities(text)),
            Token::Lt => push_text(&mut stack, "<"),
        }
    }

    while stack.len() > 1 {
        pop(&mut stack);
    }
    Ok(stack.remove(0))
}

fn push_child(stack: &mut [Element], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

fn push_text(stack: &mut [Element], text: &str) {
    let Some(parent) = stack.last_mut() else {
        return;
    };
    if let Some(Node::Text(previous)) = parent.children.last_mut() {
        previous.push_str(text);
    } else {
        parent.children.push(Node::Text(text.to_string()));
    }
}

fn pop(stack: &mut Vec<Element>) {
    if let Some(element) = stack.pop() {
        push_child(stack, Node::Element(element));
    }
}

/// Close the nearest open `tag`; end tags with no open element are ignored
fn close(stack: &mut Vec<Element>, tag: &str) {
    let Some(index) = stack.iter().rposition(|e| e.tag == tag) else {
        return;
    };
    if index == 0 {
        return;
    }
    while stack.len() > index {
        pop(stack);
    }
}

fn tag_name(end_tag: &str) -> String {
    end_tag
        .trim_start_matches("</")
        .trim_end_matches('>')
        .trim()
        .to_ascii_lowercase()
}

/// Split `<tag a="1" b c='2' />` into its name, attributes and the
/// self-closing flag
fn parse_start_tag(raw: &str) -> (String, Vec<(String, String)>, bool) {
    let inner = raw.trim_start_matches('<').trim_end_matches('>');
    let self_closing = inner.ends_with('/');
    let inner = inner.trim_end_matches('/');

    let name_end = inner
        .find(|c: char| c.is_whitespace())
        .unwrap_or(inner.len());
    let tag = inner[..name_end].to_ascii_lowercase();

    let mut attrs = Vec::new();
    let mut chars = inner[name_end..].chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == '/').is_some() {}
        let mut name = String::new();
        while let Some(c) = chars.next_if(|c| !c.is_whitespace() && *c != '=' && *c != '/') {
            name.push(c);
        }
        if name.is_empty() {
            break;
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let mut value = String::new();
        if chars.next_if_eq(&'=').is_some() {
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            match chars.peek().copied() {
                Some(quote @ ('"' | '\'')) => {
                    chars.next();
                    for c in chars.by_ref() {
                        if c == quote {
                            break;
                        }
                        value.push(c);
                    }
                }
                _ => {
                    while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                        value.push(c);
                    }
                }
            }
        }
        attrs.push((name.to_ascii_lowercase(), decode_entities(&value)));
    }

    (tag, attrs, self_closing)
}

/// Decode named and numeric character references. Unknown references are
/// kept as written.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').filter(|end| *end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            decode_entity(entity).map(|c| (c, end + 1))
        });
        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    if let Some(number) = entity.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse().ok()?,
        };
        return char::from_u32(code);
    }
    let c = match entity {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "hellip" => '\u{2026}',
        "copy" => '\u{a9}',
        _ => return None,
    };
    Some(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first(root: &Element) -> &Element {
        root.elements().next().unwrap()
    }

    #[test]
    fn test_parse_nested_elements() {
        let root = parse(r#"<div class="a b"><p>Hi <strong>there</strong></p></div>"#).unwrap();
        let div = first(&root);
        assert!(div.has_class("b"));
        assert_eq!(div.text_content(), "Hi there");
        assert_eq!(div.find("strong").unwrap().text_content(), "there");
    }

    #[test]
    fn test_implied_paragraph_end() {
        let root = parse("<p>one<p>two").unwrap();
        let tags: Vec<_> = root.elements().map(|e| e.text_content()).collect();
        assert_eq!(tags, vec!["one", "two"]);
    }

    #[test]
    fn test_void_and_stray_end_tags() {
        let root = parse("<p>a<br>b</span></p>").unwrap();
        let p = first(&root);
        assert_eq!(p.children.len(), 3);
        assert_eq!(p.text_content(), "ab");
    }

    #[test]
    fn test_attributes() {
        let root = parse(r#"<img src='x.png' alt="A &amp; B" hidden data-w=640/>"#).unwrap();
        let img = first(&root);
        assert_eq!(img.attr("src"), Some("x.png"));
        assert_eq!(img.attr("alt"), Some("A & B"));
        assert_eq!(img.attr("hidden"), Some(""));
        assert_eq!(img.attr("data-w"), Some("640"));
    }

    #[test]
    fn test_style_lookup() {
        let root = parse(r#"<p style="color: red; text-align: center">x</p>"#).unwrap();
        assert_eq!(first(&root).style("text-align"), Some("center"));
    }

    #[test]
    fn test_script_is_raw_text() {
        let root = parse("<script>if (a<b) {}</script><p>x</p>").unwrap();
        let script = first(&root);
        assert_eq!(script.text_content(), "if (a<b) {}");
        assert_eq!(root.elements().count(), 2);
    }

    #[test]
    fn test_entities() {
        assert_eq!(decode_entities("&lt;a&gt; &#65;&#x42; &bogus; &"), "<a> AB &bogus; &");
    }

    #[test]
    fn test_unterminated_comment_fails() {
        assert!(matches!(
            parse("<p>x</p><!-- never closed"),
            Err(CodecError::Markup { offset: 8, .. })
        ));
    }
}
