use super::compose;
use anyhow::{anyhow, Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use luthor_runtime::Composition;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Html,
    Markdown,
}

impl Format {
    /// Format implied by a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("html" | "htm") => Ok(Format::Html),
            Some("md" | "markdown") => Ok(Format::Markdown),
            _ => Err(anyhow!(
                "Cannot tell the format of {}. Use .html, .htm, .md or .markdown",
                path.display()
            )),
        }
    }

    fn other(self) -> Self {
        match self {
            Format::Html => Format::Markdown,
            Format::Markdown => Format::Html,
        }
    }
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// Document to read
    pub input: PathBuf,

    /// Target format (defaults to the other one)
    #[arg(short, long, value_enum)]
    pub to: Option<Format>,

    /// Write here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub async fn convert(args: ConvertArgs, cwd: &Path) -> Result<()> {
    let input = cwd.join(&args.input);
    let source = fs::read_to_string(&input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let from = Format::from_path(&input)?;
    let to = args.to.unwrap_or_else(|| from.other());

    let composition = compose(cwd)?;
    let converted = convert_source(&composition, &source, from, to).await?;
    composition.dispose();

    match args.output {
        Some(output) => {
            let output = cwd.join(output);
            fs::write(&output, &converted)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!(
                "  {} {} → {}",
                "✓".green(),
                args.input.display(),
                output.display()
            );
        }
        None => print!("{}", converted),
    }
    Ok(())
}

/// Load `source` into the editor and export it again
pub async fn convert_source(composition: &Composition, source: &str, from: Format, to: Format) -> Result<String> {
    let import = match from {
        Format::Html => "importFromHTML",
        Format::Markdown => "importFromMarkdown",
    };
    let outcome = composition
        .call(import, json!({ "content": source, "preventFocus": true }))
        .await?;
    tracing::debug!(%outcome, "document loaded");

    let export = match to {
        Format::Html => "exportToHTML",
        Format::Markdown => "exportToMarkdown",
    };
    match composition.call(export, Value::Null).await? {
        Value::String(text) => Ok(text),
        other => Err(anyhow!("{} returned {} instead of text", export, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use luthor_extensions::presets;

    fn composition() -> Composition {
        Composition::builder()
            .extensions(presets::extensive())
            .build()
            .unwrap()
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(Format::from_path(Path::new("a/notes.MD")).unwrap(), Format::Markdown);
        assert_eq!(Format::from_path(Path::new("page.htm")).unwrap(), Format::Html);
        assert!(Format::from_path(Path::new("notes.txt")).is_err());
    }

    #[tokio::test]
    async fn test_markdown_to_html() {
        let html = convert_source(&composition(), "# Title\n\nSome **bold** text", Format::Markdown, Format::Html)
            .await
            .unwrap();
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<strong>bold</strong>"));
    }

    #[tokio::test]
    async fn test_convert_writes_output_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("page.html"), "<h2>Hi</h2><ul><li>one</li></ul>").unwrap();

        let args = ConvertArgs {
            input: PathBuf::from("page.html"),
            to: None,
            output: Some(PathBuf::from("page.md")),
        };
        convert(args, dir.path()).await.unwrap();

        let markdown = fs::read_to_string(dir.path().join("page.md")).unwrap();
        assert!(markdown.starts_with("## Hi"));
        assert!(markdown.contains("- one"));
    }
}
