//! Assembles a Code Bundle into a self-contained document for a sandboxed frame.
//! Extraction is regex based and never fails: missing tags fall back to looser rules.

use crate::bundle::CodeBundle;
use regex::Regex;
use std::fmt::Write;
use std::sync::OnceLock;

/// Reset injected ahead of the user's CSS.
const PREVIEW_BASE_STYLES: &str = "* { box-sizing: border-box; }\n\
body { margin: 0; padding: 0; min-height: 100vh; }";

/// Keeps `#fragment` links inside the frame and scrolls smoothly to the target.
const HASH_NAVIGATION_SCRIPT: &str = "document.addEventListener('click', function (e) {\n\
  var target = e.target && e.target.closest ? e.target.closest('a') : null;\n\
  if (!target) return;\n\
  var href = target.getAttribute('href');\n\
  if (href && href.startsWith('#')) {\n\
    e.preventDefault();\n\
    e.stopPropagation();\n\
    var el = href.length > 1 ? document.querySelector(href) : null;\n\
    if (el) el.scrollIntoView({ behavior: 'smooth' });\n\
  }\n\
});";

fn head_regex() -> &'static Regex {
    static HEAD_REGEX: OnceLock<Regex> = OnceLock::new();
    // `<head\b` alone would also match `<header>`.
    HEAD_REGEX.get_or_init(|| Regex::new(r"(?is)<head(?:\s[^>]*)?>(.*?)</head\s*>").unwrap())
}

fn body_regex() -> &'static Regex {
    static BODY_REGEX: OnceLock<Regex> = OnceLock::new();
    BODY_REGEX.get_or_init(|| Regex::new(r"(?is)<body(?:\s[^>]*)?>(.*?)</body\s*>").unwrap())
}

fn body_open_regex() -> &'static Regex {
    static BODY_OPEN_REGEX: OnceLock<Regex> = OnceLock::new();
    BODY_OPEN_REGEX.get_or_init(|| Regex::new(r"(?is)<body(?:\s[^>]*)?>").unwrap())
}

fn head_close_regex() -> &'static Regex {
    static HEAD_CLOSE_REGEX: OnceLock<Regex> = OnceLock::new();
    HEAD_CLOSE_REGEX.get_or_init(|| Regex::new(r"(?i)</head\s*>").unwrap())
}

fn external_reference_regexes() -> &'static [Regex; 3] {
    static EXTERNAL_REGEXES: OnceLock<[Regex; 3]> = OnceLock::new();
    EXTERNAL_REGEXES.get_or_init(|| {
        [
            Regex::new(r"(?i)<link[^>]*\.css[^>]*>").unwrap(),
            Regex::new(r"(?is)<script[^>]*src[^>]*\.js[^>]*>\s*</script\s*>").unwrap(),
            Regex::new(r#"(?i)<script[^>]*src\s*=\s*["'][^"']*\.js["'][^>]*>"#).unwrap(),
        ]
    })
}

/// Inner content of the first `<head>` block, or empty.
pub fn extract_head(html: &str) -> &str {
    head_regex()
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or("")
}

/// Inner content of the first `<body>` block.
///
/// Without a complete `<body>…</body>` pair: everything after an unclosed
/// `<body>` tag, else everything after `</head>`, else the whole input.
pub fn extract_body(html: &str) -> &str {
    if let Some(m) = body_regex().captures(html).and_then(|c| c.get(1)) {
        return m.as_str();
    }
    if let Some(open) = body_open_regex().find(html) {
        return &html[open.end()..];
    }
    match head_close_regex().find(html) {
        Some(close) => &html[close.end()..],
        None => html,
    }
}

/// Removes stylesheet links and external scripts that cannot load inside the frame.
pub fn strip_external_references(head: &str) -> String {
    let mut cleaned = head.to_string();
    for re in external_reference_regexes() {
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }
    cleaned
}

/// Builds the full frame document from the three sources.
pub fn assemble_document(html: &str, css: &str, js: &str) -> String {
    let head = strip_external_references(extract_head(html));
    let body = extract_body(html);

    let mut doc = String::with_capacity(html.len() + css.len() + js.len() + 1024);
    // Writing into a String cannot fail.
    let _ = write!(
        doc,
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
{head}
<style>
{base}
/* User CSS */
{css}
</style>
</head>
<body>
{body}
<script>
{nav}
try {{
{js}
}} catch (e) {{
  console.error('Preview JS Error:', e);
}}
</script>
</body>
</html>
"#,
        head = head.trim(),
        base = PREVIEW_BASE_STYLES,
        css = css,
        body = body,
        nav = HASH_NAVIGATION_SCRIPT,
        js = js,
    );
    doc
}

/// Permissions granted to the isolated frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxPolicy {
    pub allow_scripts: bool,
    pub allow_same_origin: bool,
    pub allow_modals: bool,
    pub allow_forms: bool,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            allow_scripts: true,
            allow_same_origin: true,
            allow_modals: true,
            allow_forms: true,
        }
    }
}

impl SandboxPolicy {
    /// Value of the frame's `sandbox` attribute. Top navigation and popups are
    /// never granted.
    pub fn to_attribute(&self) -> String {
        let mut tokens = Vec::with_capacity(4);
        if self.allow_scripts {
            tokens.push("allow-scripts");
        }
        if self.allow_same_origin {
            tokens.push("allow-same-origin");
        }
        if self.allow_modals {
            tokens.push("allow-modals");
        }
        if self.allow_forms {
            tokens.push("allow-forms");
        }
        tokens.join(" ")
    }
}

/// One mounted frame: its document and the sandbox it runs under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewFrame {
    pub srcdoc: String,
    pub sandbox: String,
    /// Incremented each time the frame content is replaced.
    pub generation: u64,
}

impl PreviewFrame {
    /// `<iframe>` markup for the host page.
    pub fn to_iframe(&self) -> String {
        format!(
            r#"<iframe title="preview" sandbox="{}" srcdoc="{}"></iframe>"#,
            self.sandbox,
            escape_attribute(&self.srcdoc)
        )
    }
}

/// Memoised renderer: the frame is rebuilt only when html, css or js change.
#[derive(Debug, Default)]
pub struct PreviewRenderer {
    policy: SandboxPolicy,
    cached: Option<(CodeBundle, PreviewFrame)>,
    reloads: u64,
}

impl PreviewRenderer {
    pub fn new(policy: SandboxPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    pub fn policy(&self) -> SandboxPolicy {
        self.policy
    }

    /// Returns the frame for `bundle`, reassembling only on input change.
    pub fn render(&mut self, bundle: &CodeBundle) -> &PreviewFrame {
        if !matches!(&self.cached, Some((inputs, _)) if inputs == bundle) {
            self.cached = None;
        }
        let policy = self.policy;
        let reloads = &mut self.reloads;
        let (_, frame) = self.cached.get_or_insert_with(|| {
            *reloads += 1;
            tracing::debug!(generation = *reloads, "preview: reassembling frame");
            let frame = PreviewFrame {
                srcdoc: assemble_document(&bundle.html, &bundle.css, &bundle.js),
                sandbox: policy.to_attribute(),
                generation: *reloads,
            };
            (bundle.clone(), frame)
        });
        frame
    }

    pub fn current(&self) -> Option<&PreviewFrame> {
        self.cached.as_ref().map(|(_, frame)| frame)
    }

    /// Number of times the frame content was replaced.
    pub fn reloads(&self) -> u64 {
        self.reloads
    }
}

fn escape_attribute(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_head_and_body_with_attributes() {
        let html = r#"<HTML><Head lang="en"><title>T</title></HEAD><Body class="x"><p>hi</p></BODY></HTML>"#;
        assert_eq!(extract_head(html), "<title>T</title>");
        assert_eq!(extract_body(html), "<p>hi</p>");
    }

    #[test]
    fn test_header_is_not_mistaken_for_head() {
        let html = "<body><header class=\"top\">Nav</header><p>x</p></body>";
        assert_eq!(extract_head(html), "");
        assert!(extract_body(html).contains("<header class=\"top\">Nav</header>"));
    }

    #[test]
    fn test_body_fallback_after_head() {
        let html = "<html><head><title>T</title></head><h1>Hi</h1></html>";
        assert_eq!(extract_body(html), "<h1>Hi</h1></html>");
    }

    #[test]
    fn test_body_fallback_whole_input() {
        assert_eq!(extract_body("<h1>Only</h1>"), "<h1>Only</h1>");
        assert_eq!(extract_body(""), "");
    }

    #[test]
    fn test_unclosed_body_uses_rest() {
        assert_eq!(extract_body("<body><p>open"), "<p>open");
    }

    #[test]
    fn test_strip_external_references() {
        let head = r#"<title>x</title>
<link rel="stylesheet" href="foo.css">
<script src="bar.js"></script>
<script src='baz.js' defer>
<link rel="icon" href="favicon.png">"#;
        let cleaned = strip_external_references(head);
        assert!(!cleaned.contains("foo.css"));
        assert!(!cleaned.contains("bar.js"));
        assert!(!cleaned.contains("baz.js"));
        assert!(cleaned.contains("<title>x</title>"));
        assert!(cleaned.contains("favicon.png"));
    }

    #[test]
    fn test_assemble_injects_css_and_guarded_js() {
        let doc = assemble_document("<body><p>x</p></body>", "p { color: red; }", "boom();");
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains(r#"<meta charset="UTF-8">"#));
        assert!(doc.contains("name=\"viewport\""));
        let reset = doc.find("box-sizing: border-box").unwrap();
        let user = doc.find("p { color: red; }").unwrap();
        assert!(reset < user);
        assert!(doc.contains("try {\nboom();\n} catch (e)"));
        assert!(doc.contains("href.startsWith('#')"));
    }

    #[test]
    fn test_sandbox_attribute() {
        assert_eq!(
            SandboxPolicy::default().to_attribute(),
            "allow-scripts allow-same-origin allow-modals allow-forms"
        );
        let locked = SandboxPolicy {
            allow_same_origin: false,
            allow_modals: false,
            ..Default::default()
        };
        assert_eq!(locked.to_attribute(), "allow-scripts allow-forms");
    }

    #[test]
    fn test_renderer_memoises_on_inputs() {
        let mut renderer = PreviewRenderer::default();
        let bundle = CodeBundle::new("<p>a</p>", "", "");
        assert_eq!(renderer.render(&bundle).generation, 1);
        assert_eq!(renderer.render(&bundle.clone()).generation, 1);
        assert_eq!(renderer.reloads(), 1);

        let changed = bundle.with(crate::bundle::Language::Css, "p{}");
        assert_eq!(renderer.render(&changed).generation, 2);
    }

    #[test]
    fn test_iframe_escapes_srcdoc() {
        let mut renderer = PreviewRenderer::default();
        let frame = renderer.render(&CodeBundle::new("<p title=\"q\">&</p>", "", ""));
        let iframe = frame.to_iframe();
        assert!(iframe.contains("&lt;p title=&quot;q&quot;&gt;&amp;&lt;/p&gt;"));
        assert!(iframe.contains(r#"sandbox="allow-scripts allow-same-origin allow-modals allow-forms""#));
    }
}
