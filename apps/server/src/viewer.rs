//! Browser side of a kiosk display: a chrome-less page that polls the rotation endpoints and
//! swaps a full-window frame, plus the sanitizer applied to inline pages in strict mode.

use maplit::{hashmap, hashset};
use slideshow_core::kinds::decorate_if_needed;

/// Seconds to wait before asking again when a deck has no pages or the server is unreachable
pub const IDLE_RETRY_SECONDS: u32 = 10;

/// Render the viewer for `deck`
pub fn viewer_html(deck: &str) -> String {
    // JSON string literal, so the name is safe to embed in the script
    let deck_literal = serde_json::to_string(deck).unwrap_or_else(|_| "\"\"".to_string());
    VIEWER_TEMPLATE
        .replace("{{title}}", &html_escape(deck))
        .replace("{{deck}}", &deck_literal.replace("</", "<\\/"))
        .replace("{{retry_ms}}", &(u64::from(IDLE_RETRY_SECONDS) * 1000).to_string())
}

/// Markup served for an inline page. Strict mode passes it through ammonia first and decorates
/// the result again, since the document wrapper does not survive cleaning.
pub fn inline_document(html: &str, strict_html: bool) -> String {
    if !strict_html {
        return html.to_string();
    }
    let cleaned = ammonia::Builder::new()
        .tags(hashset![
            "p", "br", "strong", "em", "code", "pre", "span", "div",
            "h1", "h2", "h3", "h4", "h5", "h6",
            "ul", "ol", "li", "blockquote", "a", "img",
            "table", "thead", "tbody", "tr", "td", "th"
        ])
        .tag_attributes(hashmap![
            "a" => hashset!["href", "title"],
            "img" => hashset!["src", "alt", "title", "width", "height"],
            "span" => hashset!["class"],
            "div" => hashset!["class"]
        ])
        .clean_content_tags(hashset!["script", "style"])
        .strip_comments(true)
        .link_rel(Some("noopener noreferrer"))
        .clean(html)
        .to_string();
    decorate_if_needed(&cleaned)
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

const VIEWER_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>{{title}}</title>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
        html, body { margin: 0; height: 100%; overflow: hidden; background: #000; }
        iframe { border: 0; width: 100%; height: 100%; display: block; background: #fff; }
        #idle { display: none; color: #ccc; font: 2em sans-serif; text-align: center; padding-top: 40vh; }
    </style>
</head>
<body>
    <iframe id="frame"></iframe>
    <div id="idle">No pages to show</div>
    <script>
        const base = "/decks/" + encodeURIComponent({{deck}});
        const frame = document.getElementById("frame");
        const idle = document.getElementById("idle");
        let index = -1;

        function idleFor(ms) {
            frame.style.display = "none";
            idle.style.display = "block";
            setTimeout(poll, ms);
        }

        async function poll() {
            const url = index < 0 ? base + "/first" : base + "/next?index=" + index;
            let payload;
            try {
                const response = await fetch(url, { cache: "no-store" });
                if (!response.ok) throw new Error(response.statusText);
                payload = await response.json();
            } catch (err) {
                return idleFor({{retry_ms}});
            }
            if (!payload) {
                index = -1;
                return idleFor({{retry_ms}});
            }
            frame.src = payload.target.type === "navigate"
                ? payload.target.url
                : base + "/pages/" + payload.index + "/content";
            idle.style.display = "none";
            frame.style.display = "block";
            index = payload.index;
            setTimeout(poll, payload.durationMs);
        }

        poll();
    </script>
</body>
</html>
"#;
