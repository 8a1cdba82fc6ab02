//! Indented markup writer

#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub pretty: bool,
    pub indent: String,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            pretty: true,
            indent: "  ".to_string(),
        }
    }
}

pub(crate) struct Context {
    options: WriteOptions,
    depth: usize,
    buffer: String,
}

impl Context {
    pub fn new(options: WriteOptions) -> Self {
        Self {
            options,
            depth: 0,
            buffer: String::new(),
        }
    }

    pub fn add(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    pub fn add_line(&mut self, text: &str) {
        if self.options.pretty {
            self.add_indent();
        }
        self.add(text);
        if self.options.pretty {
            self.add("\n");
        }
    }

    fn add_indent(&mut self) {
        for _ in 0..self.depth {
            self.buffer.push_str(&self.options.indent);
        }
    }

    pub fn indent(&mut self) {
        self.depth += 1;
    }

    pub fn dedent(&mut self) {
        if self.depth > 0 {
            self.depth -= 1;
        }
    }

    pub fn get_output(self) -> String {
        let mut output = self.buffer;
        let trimmed = output.trim_end().len();
        output.truncate(trimmed);
        output
    }
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pretty_output_indents_children() {
        let mut ctx = Context::new(WriteOptions::default());
        ctx.add_line("<ul>");
        ctx.indent();
        ctx.add_line("<li>a</li>");
        ctx.dedent();
        ctx.add_line("</ul>");
        assert_eq!(ctx.get_output(), "<ul>\n  <li>a</li>\n</ul>");
    }

    #[test]
    fn test_compact_output() {
        let mut ctx = Context::new(WriteOptions {
            pretty: false,
            indent: String::new(),
        });
        ctx.add_line("<p>a</p>");
        ctx.add_line("<p>b</p>");
        assert_eq!(ctx.get_output(), "<p>a</p><p>b</p>");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }
}
