//! # Media
//!
//! Images and embedded frames. None of these have native text syntax, so
//! each node type carries a [`BlockCodec`] that the codecs use to write and
//! rebuild it. Reconstruction fills every missing field with a default, and
//! the insert commands reuse it to validate their arguments.

use luthor_codec::html::escape_html;
use luthor_document::{Block, DocumentHandle, EditorState, Mutation, Selection};
use luthor_runtime::fields::{number_or, one_of, optional_number, optional_string, string_or};
use luthor_runtime::{
    parse_args, BlockCodec, Category, Cleanup, CommandDef, CommandError, Extension,
    ExtensionContext, NodeTypeSpec, Outcome, StateQuery, UiContribution,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::support::insertion_index;

pub const DEFAULT_WIDTH: u64 = 720;
pub const DEFAULT_HEIGHT: u64 = 405;
pub const DEFAULT_ALIGNMENT: &str = "center";
pub const DEFAULT_FRAME_TITLE: &str = "Embedded Content";

const ALIGNMENTS: &[&str] = &["left", "center", "right"];

/// Node types owned by the media extension
pub const MEDIA_TYPES: &[&str] = &["image", "youtube-embed", "iframe-embed", "embed"];

fn text(attrs: &Map<String, Value>, key: &str) -> String {
    attrs.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn number(attrs: &Map<String, Value>, key: &str) -> Option<u64> {
    attrs.get(key).and_then(Value::as_u64)
}

fn size_attrs(attrs: &Map<String, Value>) -> String {
    let mut out = String::new();
    for key in ["width", "height"] {
        if let Some(value) = number(attrs, key) {
            out.push_str(&format!(" {}=\"{}\"", key, value));
        }
    }
    out
}

/// Embed URL for a YouTube watch, short, share or embed link
pub fn youtube_embed_url(url: &str) -> Option<String> {
    let url = url.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let rest = rest.strip_prefix("www.").or_else(|| rest.strip_prefix("m.")).unwrap_or(rest);

    let id = if let Some(path) = rest.strip_prefix("youtu.be/") {
        path
    } else if let Some(path) = rest
        .strip_prefix("youtube.com/embed/")
        .or_else(|| rest.strip_prefix("youtube-nocookie.com/embed/"))
        .or_else(|| rest.strip_prefix("youtube.com/shorts/"))
    {
        path
    } else if let Some(query) = rest.strip_prefix("youtube.com/watch?") {
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("v="))?
    } else {
        return None;
    };

    let id: String = id
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    (!id.is_empty()).then(|| format!("https://www.youtube.com/embed/{}", id))
}

/// Start offset in seconds from a `start=` or `t=` query parameter
fn start_param(url: &str) -> Option<u64> {
    let (_, query) = url.split_once('?')?;
    query.split('&').find_map(|pair| {
        let value = pair.strip_prefix("start=").or_else(|| pair.strip_prefix("t="))?;
        value.trim_end_matches('s').parse().ok()
    })
}

fn is_http(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

#[derive(Debug, Default)]
pub struct ImageCodec;

impl BlockCodec for ImageCodec {
    fn node_type(&self) -> &str {
        "image"
    }

    fn reconstruct(&self, payload: &Value) -> Map<String, Value> {
        let mut attrs = Map::new();
        attrs.insert("src".into(), json!(string_or(payload, "src", "")));
        attrs.insert("alt".into(), json!(string_or(payload, "alt", "")));
        if let Some(caption) = optional_string(payload, "caption") {
            attrs.insert("caption".into(), json!(caption));
        }
        attrs.insert(
            "alignment".into(),
            json!(one_of(payload, "alignment", ALIGNMENTS, DEFAULT_ALIGNMENT)),
        );
        for key in ["width", "height"] {
            if let Some(value) = optional_number(payload, key) {
                attrs.insert(key.into(), json!(value));
            }
        }
        attrs
    }

    fn placeholder(&self, attrs: &Map<String, Value>) -> String {
        let alt = text(attrs, "alt");
        let alt = if alt.is_empty() { "Image".to_string() } else { alt };
        format!("![{}]({})", alt, text(attrs, "src"))
    }

    fn render_html(&self, attrs: &Map<String, Value>) -> Option<String> {
        let img = format!(
            "<img src=\"{}\" alt=\"{}\"{}>",
            escape_html(&text(attrs, "src")),
            escape_html(&text(attrs, "alt")),
            size_attrs(attrs)
        );
        let alignment = escape_html(&text(attrs, "alignment"));
        Some(match attrs.get("caption").and_then(Value::as_str) {
            Some(caption) => format!(
                "<figure data-align=\"{}\">{}<figcaption>{}</figcaption></figure>",
                alignment,
                img,
                escape_html(caption)
            ),
            None => format!("<figure data-align=\"{}\">{}</figure>", alignment, img),
        })
    }
}

#[derive(Debug, Default)]
pub struct YouTubeCodec;

impl BlockCodec for YouTubeCodec {
    fn node_type(&self) -> &str {
        "youtube-embed"
    }

    fn reconstruct(&self, payload: &Value) -> Map<String, Value> {
        let raw = string_or(payload, "src", "");
        let src = youtube_embed_url(&raw).unwrap_or_else(|| raw.clone());
        let start = optional_number(payload, "start")
            .or_else(|| start_param(&raw))
            .unwrap_or(0);

        let mut attrs = Map::new();
        attrs.insert("src".into(), json!(src));
        attrs.insert("width".into(), json!(number_or(payload, "width", DEFAULT_WIDTH)));
        attrs.insert("height".into(), json!(number_or(payload, "height", DEFAULT_HEIGHT)));
        attrs.insert(
            "alignment".into(),
            json!(one_of(payload, "alignment", ALIGNMENTS, DEFAULT_ALIGNMENT)),
        );
        attrs.insert("start".into(), json!(start));
        attrs
    }

    fn placeholder(&self, attrs: &Map<String, Value>) -> String {
        format!("**[YouTube Embed: {}]**", text(attrs, "src"))
    }

    fn render_html(&self, attrs: &Map<String, Value>) -> Option<String> {
        let mut src = text(attrs, "src");
        if let Some(start) = number(attrs, "start").filter(|start| *start > 0) {
            src.push_str(&format!("?start={}", start));
        }
        Some(format!(
            "<iframe src=\"{}\"{} title=\"YouTube video\" frameborder=\"0\" allowfullscreen></iframe>",
            escape_html(&src),
            size_attrs(attrs)
        ))
    }
}

#[derive(Debug, Default)]
pub struct IframeCodec;

impl BlockCodec for IframeCodec {
    fn node_type(&self) -> &str {
        "iframe-embed"
    }

    fn reconstruct(&self, payload: &Value) -> Map<String, Value> {
        let mut attrs = Map::new();
        attrs.insert("src".into(), json!(string_or(payload, "src", "")));
        attrs.insert("width".into(), json!(number_or(payload, "width", DEFAULT_WIDTH)));
        attrs.insert("height".into(), json!(number_or(payload, "height", DEFAULT_HEIGHT)));
        attrs.insert(
            "alignment".into(),
            json!(one_of(payload, "alignment", ALIGNMENTS, DEFAULT_ALIGNMENT)),
        );
        attrs.insert("title".into(), json!(string_or(payload, "title", DEFAULT_FRAME_TITLE)));
        attrs
    }

    fn placeholder(&self, attrs: &Map<String, Value>) -> String {
        let title = text(attrs, "title");
        let label = if title.is_empty() { text(attrs, "src") } else { title };
        format!("**[Iframe Embed: {}]**", label)
    }

    fn render_html(&self, attrs: &Map<String, Value>) -> Option<String> {
        Some(format!(
            "<iframe src=\"{}\"{} title=\"{}\"></iframe>",
            escape_html(&text(attrs, "src")),
            size_attrs(attrs),
            escape_html(&text(attrs, "title"))
        ))
    }
}

/// Generic embed. Exported to HTML through the payload wrapper.
#[derive(Debug, Default)]
pub struct EmbedCodec;

impl BlockCodec for EmbedCodec {
    fn node_type(&self) -> &str {
        "embed"
    }

    fn reconstruct(&self, payload: &Value) -> Map<String, Value> {
        let mut attrs = Map::new();
        attrs.insert("url".into(), json!(string_or(payload, "url", "")));
        attrs.insert("width".into(), json!(number_or(payload, "width", DEFAULT_WIDTH)));
        attrs.insert("height".into(), json!(number_or(payload, "height", DEFAULT_HEIGHT)));
        attrs.insert(
            "alignment".into(),
            json!(one_of(payload, "alignment", ALIGNMENTS, DEFAULT_ALIGNMENT)),
        );
        attrs
    }

    fn placeholder(&self, attrs: &Map<String, Value>) -> String {
        format!("**[Embed: {}]**", text(attrs, "url"))
    }
}

/// Media block under the selection anchor
fn anchor_media(state: &EditorState) -> Option<(String, String)> {
    match state.anchor_block()? {
        Block::Custom { key, node_type, .. } if MEDIA_TYPES.contains(&node_type.as_str()) => {
            Some((key.clone(), node_type.clone()))
        }
        _ => None,
    }
}

/// Insert a media block after the anchor and select it
fn insert_media(
    document: &DocumentHandle,
    codec: &dyn BlockCodec,
    payload: &Value,
) -> Result<String, CommandError> {
    let attrs = codec.reconstruct(payload);
    let node_type = codec.node_type().to_string();
    let key = document.update("media-insert", |ctx| {
        let index = insertion_index(ctx.state());
        let block = ctx.factory().custom(node_type, attrs);
        let key = block.key().to_string();
        ctx.apply(Mutation::InsertBlock { index, block })?;
        ctx.set_selection(Some(Selection::collapsed(key.clone(), 0)));
        Ok(key)
    })?;
    Ok(key)
}

#[derive(Deserialize)]
struct SourceArgs {
    #[serde(alias = "url")]
    src: String,
}

#[derive(Deserialize)]
struct UrlArgs {
    url: String,
}

#[derive(Deserialize)]
struct AlignmentArgs {
    alignment: String,
}

#[derive(Deserialize)]
struct ResizeArgs {
    width: u64,
    #[serde(default)]
    height: Option<u64>,
}

#[derive(Debug, Default)]
pub struct MediaExtension;

impl Extension for MediaExtension {
    fn id(&self) -> &str {
        "media"
    }

    fn categories(&self) -> &[Category] {
        &[Category::Toolbar, Category::Floating]
    }

    fn register(&self, _document: &DocumentHandle) -> anyhow::Result<Cleanup> {
        Ok(Cleanup::noop())
    }

    fn node_types(&self) -> Vec<NodeTypeSpec> {
        vec![
            NodeTypeSpec::new("image").with_codec(Arc::new(ImageCodec)),
            NodeTypeSpec::new("youtube-embed").with_codec(Arc::new(YouTubeCodec)),
            NodeTypeSpec::new("iframe-embed").with_codec(Arc::new(IframeCodec)),
            NodeTypeSpec::new("embed").with_codec(Arc::new(EmbedCodec)),
        ]
    }

    fn commands(&self, ctx: &ExtensionContext) -> Vec<CommandDef> {
        let document = ctx.document.clone();
        let image = CommandDef::new("insertImage", move |args| {
            let source: SourceArgs = parse_args("insertImage", args.clone())?;
            if source.src.trim().is_empty() {
                return Err(CommandError::invalid_arguments("insertImage", "src is empty"));
            }
            Ok(Outcome::value(insert_media(&document, &ImageCodec, &args)?))
        })
        .feature("image");

        let document = ctx.document.clone();
        let youtube = CommandDef::new("insertYouTubeEmbed", move |args| {
            let source: SourceArgs = parse_args("insertYouTubeEmbed", args.clone())?;
            if youtube_embed_url(&source.src).is_none() {
                return Err(CommandError::invalid_arguments(
                    "insertYouTubeEmbed",
                    format!("'{}' is not a YouTube link", source.src),
                ));
            }
            let mut payload = args;
            if let Value::Object(map) = &mut payload {
                map.insert("src".into(), json!(source.src));
            }
            Ok(Outcome::value(insert_media(&document, &YouTubeCodec, &payload)?))
        })
        .feature("youTubeEmbed");

        let document = ctx.document.clone();
        let iframe = CommandDef::new("insertIframeEmbed", move |args| {
            let source: SourceArgs = parse_args("insertIframeEmbed", args.clone())?;
            if !is_http(source.src.trim()) {
                return Err(CommandError::invalid_arguments(
                    "insertIframeEmbed",
                    "src must be an http(s) URL",
                ));
            }
            let mut payload = args;
            if let Value::Object(map) = &mut payload {
                map.insert("src".into(), json!(source.src.trim()));
            }
            Ok(Outcome::value(insert_media(&document, &IframeCodec, &payload)?))
        })
        .feature("iframeEmbed");

        let document = ctx.document.clone();
        let embed = CommandDef::new("insertEmbed", move |args| {
            let source: UrlArgs = parse_args("insertEmbed", args.clone())?;
            if !is_http(source.url.trim()) {
                return Err(CommandError::invalid_arguments("insertEmbed", "url must be an http(s) URL"));
            }
            Ok(Outcome::value(insert_media(&document, &EmbedCodec, &args)?))
        })
        .feature("embed");

        let document = ctx.document.clone();
        let align = CommandDef::new("setMediaAlignment", move |args| {
            let args: AlignmentArgs = parse_args("setMediaAlignment", args)?;
            let alignment = args.alignment.trim().to_ascii_lowercase();
            if !ALIGNMENTS.contains(&alignment.as_str()) {
                return Err(CommandError::invalid_arguments(
                    "setMediaAlignment",
                    format!("unknown alignment '{}'", args.alignment),
                ));
            }
            let Some((key, _)) = document.read(anchor_media) else {
                return Ok(Outcome::value(false));
            };
            document.update("media-align", |ctx| {
                ctx.apply(Mutation::SetAttribute {
                    node_id: key,
                    name: "alignment".to_string(),
                    value: json!(alignment),
                })
            })?;
            Ok(Outcome::value(true))
        })
        .fallback(json!(false));

        let document = ctx.document.clone();
        let resize = CommandDef::new("resizeMedia", move |args| {
            let args: ResizeArgs = parse_args("resizeMedia", args)?;
            if args.width == 0 || args.height == Some(0) {
                return Err(CommandError::invalid_arguments("resizeMedia", "sizes must be positive"));
            }
            let Some((key, _)) = document.read(anchor_media) else {
                return Ok(Outcome::value(false));
            };
            document.update("media-resize", |ctx| {
                ctx.apply(Mutation::SetAttribute {
                    node_id: key.clone(),
                    name: "width".to_string(),
                    value: json!(args.width),
                })?;
                if let Some(height) = args.height {
                    ctx.apply(Mutation::SetAttribute {
                        node_id: key,
                        name: "height".to_string(),
                        value: json!(height),
                    })?;
                }
                Ok(())
            })?;
            Ok(Outcome::value(true))
        })
        .fallback(json!(false));

        [image, youtube, iframe, embed, align, resize]
            .into_iter()
            .map(CommandDef::formatting)
            .collect()
    }

    fn state_queries(&self, _ctx: &ExtensionContext) -> Vec<StateQuery> {
        vec![
            StateQuery::sync("isImageSelected", |state| {
                json!(matches!(anchor_media(state), Some((_, ref t)) if t == "image"))
            }),
            StateQuery::sync("isEmbedSelected", |state| {
                json!(matches!(anchor_media(state), Some((_, ref t)) if t != "image"))
            }),
        ]
    }

    fn ui_contributions(&self) -> Vec<UiContribution> {
        vec![
            UiContribution::new("image", Category::Toolbar, "Image").command("insertImage"),
            UiContribution::new("youtube", Category::Toolbar, "YouTube").command("insertYouTubeEmbed"),
            UiContribution::new("iframe", Category::Toolbar, "Embed page").command("insertIframeEmbed"),
            UiContribution::new("mediaAlign", Category::Floating, "Align").command("setMediaAlignment"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use luthor_document::Document;

    #[test]
    fn test_youtube_urls_normalize() {
        let expected = Some("https://www.youtube.com/embed/dQw4w9WgXcQ".to_string());
        assert_eq!(youtube_embed_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42"), expected);
        assert_eq!(youtube_embed_url("youtu.be/dQw4w9WgXcQ"), expected);
        assert_eq!(youtube_embed_url("https://youtube.com/shorts/dQw4w9WgXcQ"), expected);
        assert_eq!(youtube_embed_url("https://vimeo.com/1"), None);
    }

    #[test]
    fn test_youtube_defaults_and_start_from_url() {
        let attrs = YouTubeCodec.reconstruct(&json!({"src": "https://youtu.be/abc?t=30"}));
        assert_eq!(attrs["src"], json!("https://www.youtube.com/embed/abc"));
        assert_eq!(attrs["width"], json!(720));
        assert_eq!(attrs["height"], json!(405));
        assert_eq!(attrs["alignment"], json!("center"));
        assert_eq!(attrs["start"], json!(30));
        assert_eq!(YouTubeCodec.placeholder(&attrs), "**[YouTube Embed: https://www.youtube.com/embed/abc]**");
    }

    #[test]
    fn test_image_keeps_optional_fields_absent() {
        let attrs = ImageCodec.reconstruct(&json!({"src": "a.png", "width": "bad"}));
        assert!(!attrs.contains_key("width"));
        assert!(!attrs.contains_key("caption"));
        assert_eq!(ImageCodec.placeholder(&attrs), "![Image](a.png)");

        let attrs = ImageCodec.reconstruct(&json!({"src": "a.png", "alt": "A", "caption": "Cap"}));
        let html = ImageCodec.render_html(&attrs).unwrap();
        assert!(html.contains("<figcaption>Cap</figcaption>"));
    }

    #[test]
    fn test_iframe_title_default() {
        let attrs = IframeCodec.reconstruct(&json!({"src": "https://example.com"}));
        assert_eq!(attrs["title"], json!(DEFAULT_FRAME_TITLE));
        assert_eq!(IframeCodec.placeholder(&attrs), "**[Iframe Embed: Embedded Content]**");
    }

    #[test]
    fn test_insert_then_resize_and_align() {
        let document = DocumentHandle::new(Document::new("media"));
        let ctx = ExtensionContext {
            document: document.clone(),
            node_types: Default::default(),
        };
        let commands = MediaExtension.commands(&ctx);
        let run = |name: &str, args: Value| {
            let command = commands.iter().find(|c| c.name == name).unwrap();
            match command.invoke(args).unwrap() {
                Outcome::Ready(value) => value,
                Outcome::Pending(_) => panic!("{} should be synchronous", name),
            }
        };

        run("insertYouTubeEmbed", json!({"url": "https://www.youtube.com/watch?v=abc"}));
        assert_eq!(run("resizeMedia", json!({"width": 640, "height": 360})), json!(true));
        assert_eq!(run("setMediaAlignment", json!({"alignment": "Left"})), json!(true));

        document.read(|state| match &state.tree.children[1] {
            Block::Custom { node_type, attrs, .. } => {
                assert_eq!(node_type, "youtube-embed");
                assert_eq!(attrs["width"], json!(640));
                assert_eq!(attrs["height"], json!(360));
                assert_eq!(attrs["alignment"], json!("left"));
            }
            other => panic!("expected embed, got {:?}", other),
        });
    }

    #[test]
    fn test_insert_rejects_bad_sources() {
        let document = DocumentHandle::new(Document::new("media"));
        let ctx = ExtensionContext {
            document,
            node_types: Default::default(),
        };
        let commands = MediaExtension.commands(&ctx);
        let youtube = commands.iter().find(|c| c.name == "insertYouTubeEmbed").unwrap();
        assert!(matches!(
            youtube.invoke(json!({"src": "https://vimeo.com/1"})),
            Err(CommandError::InvalidArguments { .. })
        ));
        let iframe = commands.iter().find(|c| c.name == "insertIframeEmbed").unwrap();
        assert!(matches!(
            iframe.invoke(json!({"src": "javascript:alert(1)"})),
            Err(CommandError::InvalidArguments { .. })
        ));
    }
}
