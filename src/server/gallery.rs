// server/gallery.rs
//! Renders the video gallery page

use std::fmt::Write;

use percent_encoding::{
    AsciiSet,
    CONTROLS,
    utf8_percent_encode,
};

/// Characters that can't appear raw in a single path segment of the `/uploads/` links
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'\'')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

pub const EMPTY_MESSAGE: &str = "No videos uploaded yet.";

const HEAD: &str = r#"<html>
<head>
  <title>Uploaded Dashcam Videos</title>
  <style>
    body {
      background: #181c20;
      color: #f5f6fa;
      font-family: 'Segoe UI', Arial, sans-serif;
      margin: 0;
      padding: 0;
    }
    .container {
      max-width: 900px;
      margin: 40px auto;
      padding: 24px;
      background: #23272b;
      border-radius: 16px;
      box-shadow: 0 4px 24px rgba(0,0,0,0.3);
    }
    h1 {
      text-align: center;
      margin-bottom: 32px;
      font-size: 2.5rem;
      letter-spacing: 1px;
    }
    .gallery {
      display: flex;
      flex-wrap: wrap;
      gap: 32px;
      justify-content: center;
    }
    .video-card {
      background: #2d3238;
      border-radius: 12px;
      box-shadow: 0 2px 8px rgba(0,0,0,0.2);
      padding: 16px;
      width: 320px;
      display: flex;
      flex-direction: column;
      align-items: center;
    }
    video {
      border-radius: 8px;
      width: 100%;
      margin-bottom: 8px;
    }
    .filename {
      font-size: 1rem;
      color: #b2becd;
      word-break: break-all;
      margin-bottom: 4px;
    }
    .download-link {
      color: #00b894;
      text-decoration: none;
      font-weight: bold;
      margin-top: 4px;
    }
    .download-link:hover {
      text-decoration: underline;
    }
  </style>
</head>
<body>
  <div class="container">
    <h1>Uploaded Dashcam Videos</h1>
    <div class="gallery">
"#;

const TAIL: &str = "    </div>\n  </div>\n</body>\n</html>\n";

/// # Render the gallery page for a list of stored file names
///
/// Each name gets a card with a player, a caption, and a download link, all pointing at
/// `/uploads/<name>`. An empty list renders a placeholder instead.
pub fn render<S: AsRef<str>>(names: &[S]) -> String {
    let mut html = String::from(HEAD);

    if names.is_empty() {
        let _ = writeln!(html, "      <p>{EMPTY_MESSAGE}</p>");
    }

    for name in names {
        let name = name.as_ref();
        let href = escape(&format!("/uploads/{}", utf8_percent_encode(name, SEGMENT)));
        let caption = escape(name);

        let _ = write!(
            html,
            r#"      <div class="video-card">
        <video controls src="{href}"></video>
        <div class="filename">{caption}</div>
        <a class="download-link" href="{href}" download>Download</a>
      </div>
"#
        );
    }

    html.push_str(TAIL);
    html
}

/// Escape text for use in HTML content and quoted attributes
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            | '&' => out.push_str("&amp;"),
            | '<' => out.push_str("&lt;"),
            | '>' => out.push_str("&gt;"),
            | '"' => out.push_str("&quot;"),
            | '\'' => out.push_str("&#39;"),
            | _ => out.push(c),
        }
    }
    out
}
