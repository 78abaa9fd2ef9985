//! Markdown → platform body.

use comrak::{markdown_to_html, Options};

use quill_core::config::BodyFormat;

fn options() -> Options<'static> {
    let mut options = Options::default();
    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.footnotes = true;
    // Bodies carry hand-written HTML (<img>, <figure>) that must survive.
    options.render.r#unsafe = true;
    options
}

/// Format a rewritten body for the platform.
pub fn format_body(markdown: &str, format: BodyFormat) -> String {
    match format {
        BodyFormat::Html => markdown_to_html(markdown, &options()),
        BodyFormat::Markdown => markdown.to_owned(),
    }
}
