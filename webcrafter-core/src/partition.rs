//! Text plumbing between gateway responses and the Code Bundle.
//!
//! A generation or whole-bundle refinement comes back as a single HTML
//! document; [`partition_response`] splits it into the three editor files.
//! Going the other way, [`inline_for_refinement`] folds the files back into
//! one document. Single-file refinements are cleaned with
//! [`clean_code_block`] and checked with [`validate_refinement`].

use crate::bundle::{CodeBundle, Language};
use crate::error::{PlaygroundError, PlaygroundResult};
use regex::Regex;
use std::sync::OnceLock;

/// Shortest single-file refinement accepted.
pub const MIN_REFINEMENT_LEN: usize = 10;

/// Below this length an HTML result without any tag is treated as prose.
const MIN_BARE_HTML_LEN: usize = 50;

/// How far into a response a language marker may sit and still be trusted
/// as the start of the code.
const PREAMBLE_WINDOW: usize = 200;

const STYLESHEET_LINK: &str = "    <link rel=\"stylesheet\" href=\"index.css\">\n";
const SCRIPT_TAG: &str = "    <script src=\"index.js\"></script>\n";

fn fence_regex() -> &'static Regex {
    static FENCE_REGEX: OnceLock<Regex> = OnceLock::new();
    FENCE_REGEX.get_or_init(|| Regex::new(r"(?i)```(?:html|css|javascript|js)?").unwrap())
}

fn fenced_block_regex() -> &'static Regex {
    static FENCED_BLOCK_REGEX: OnceLock<Regex> = OnceLock::new();
    FENCED_BLOCK_REGEX.get_or_init(|| Regex::new(r"(?is)```[a-z]*\n?(.*?)\n?```").unwrap())
}

fn style_block_regex() -> &'static Regex {
    static STYLE_BLOCK_REGEX: OnceLock<Regex> = OnceLock::new();
    STYLE_BLOCK_REGEX.get_or_init(|| Regex::new(r"(?is)<style[^>]*>(.*?)</style>").unwrap())
}

fn script_block_regex() -> &'static Regex {
    static SCRIPT_BLOCK_REGEX: OnceLock<Regex> = OnceLock::new();
    SCRIPT_BLOCK_REGEX.get_or_init(|| Regex::new(r"(?is)<script[^>]*>(.*?)</script>").unwrap())
}

fn blank_lines_regex() -> &'static Regex {
    static BLANK_LINES_REGEX: OnceLock<Regex> = OnceLock::new();
    BLANK_LINES_REGEX.get_or_init(|| Regex::new(r"\n\s*\n").unwrap())
}

fn any_tag_regex() -> &'static Regex {
    static ANY_TAG_REGEX: OnceLock<Regex> = OnceLock::new();
    ANY_TAG_REGEX.get_or_init(|| Regex::new(r"<[^>]*>").unwrap())
}

/// Local file references removed before the files are inlined.
fn local_reference_regexes() -> &'static [Regex; 4] {
    static LOCAL_REFERENCE_REGEXES: OnceLock<[Regex; 4]> = OnceLock::new();
    LOCAL_REFERENCE_REGEXES.get_or_init(|| {
        [
            Regex::new(r#"(?i)<link[^>]*href=["']index\.css["'][^>]*>"#).unwrap(),
            Regex::new(r#"(?i)<link[^>]*href=["']style\.css["'][^>]*>"#).unwrap(),
            Regex::new(r#"(?i)<script[^>]*src=["']index\.js["'][^>]*></script>"#).unwrap(),
            Regex::new(r#"(?i)<script[^>]*src=["']script\.js["'][^>]*></script>"#).unwrap(),
        ]
    })
}

/// Lead-ins models put in front of the code.
fn chatty_prefix_regexes() -> &'static [Regex; 7] {
    static CHATTY_PREFIX_REGEXES: OnceLock<[Regex; 7]> = OnceLock::new();
    CHATTY_PREFIX_REGEXES.get_or_init(|| {
        [
            Regex::new(r"(?i)^Here is (?:the |updated |the updated )?(?:code|file|content)(?: for (?:the file )?.*?)?[:\n]").unwrap(),
            Regex::new(r"(?i)^Here['’]s (?:the |updated )?(?:code|file|content)[:\n]").unwrap(),
            Regex::new(r"(?i)^Updated (?:code|file|content)[:\n]").unwrap(),
            Regex::new(r"(?i)^(?:The |Updated )?(?:code|file) (?:is|below|follows)[:\n]").unwrap(),
            Regex::new(r"(?i)^file:.*?\n").unwrap(),
            Regex::new(r"(?i)^filename:.*?\n").unwrap(),
            Regex::new(r"(?i)^index\.(?:css|js):\n").unwrap(),
        ]
    })
}

fn css_start_regexes() -> &'static [Regex; 2] {
    static CSS_START_REGEXES: OnceLock<[Regex; 2]> = OnceLock::new();
    CSS_START_REGEXES.get_or_init(|| {
        [
            Regex::new(r"(?i)@[a-z-]+|:root").unwrap(),
            Regex::new(r"(?m)^[a-zA-Z#.\[][^{]*\{").unwrap(),
        ]
    })
}

fn js_start_regex() -> &'static Regex {
    static JS_START_REGEX: OnceLock<Regex> = OnceLock::new();
    JS_START_REGEX.get_or_init(|| {
        Regex::new(r"(?m)^(?:const|function|let|var|class|export|import|/\*|//|\(|\[|document|window|console)").unwrap()
    })
}

fn js_shape_regex() -> &'static Regex {
    static JS_SHAPE_REGEX: OnceLock<Regex> = OnceLock::new();
    JS_SHAPE_REGEX.get_or_init(|| {
        Regex::new(r"const|function|let|var|class|export|import|document|window|console|=>|\(|\[").unwrap()
    })
}

/// Concatenated inner contents of every `regex` match, each trimmed and
/// followed by a blank line, plus `text` with the matches removed.
fn extract_blocks(text: &str, regex: &Regex) -> (String, String) {
    let mut extracted = String::new();
    for caps in regex.captures_iter(text) {
        let inner = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        extracted.push_str(inner.trim());
        extracted.push_str("\n\n");
    }
    let remaining = regex.replace_all(text, "").into_owned();
    (extracted, remaining)
}

fn insert_before(haystack: &mut String, marker: &str, insertion: &str) -> bool {
    match haystack.find(marker) {
        Some(at) => {
            haystack.insert_str(at, insertion);
            true
        }
        None => false,
    }
}

/// Splits a single-document gateway response into html, css and js.
///
/// Inline `<style>` and `<script>` blocks move into their own files and
/// the HTML gets `index.css` / `index.js` references in their place, so the
/// editor shows the same three-file layout as a template.
pub fn partition_response(content: &str) -> CodeBundle {
    let unfenced = fence_regex().replace_all(content, "");
    let unfenced = unfenced.replace("```", "");
    let content = unfenced.trim();

    let (css, html) = extract_blocks(content, style_block_regex());
    let (js, html) = extract_blocks(&html, script_block_regex());
    let mut html = blank_lines_regex().replace_all(&html, "\n").into_owned();

    if !css.is_empty() && !html.contains("index.css") {
        insert_before(&mut html, "</head>", STYLESHEET_LINK);
    }
    if !js.is_empty() && !html.contains("index.js") {
        insert_before(&mut html, "</body>", SCRIPT_TAG);
    }

    tracing::debug!(
        html = html.len(),
        css = css.len(),
        js = js.len(),
        "partitioned gateway response"
    );
    CodeBundle { html, css, js }
}

/// Folds css and js back into the html as inline blocks, dropping the
/// local file references they replace.
pub fn inline_for_refinement(bundle: &CodeBundle) -> String {
    let mut document = bundle.html.clone();
    for regex in local_reference_regexes() {
        document = regex.replace_all(&document, "").into_owned();
    }

    if !bundle.css.trim().is_empty() {
        let style = format!("<style>\n{}\n</style>", bundle.css);
        if document.contains("</head>") {
            document = document.replacen("</head>", &format!("{}\n</head>", style), 1);
        } else {
            document = format!("{}\n{}", style, document);
        }
    }

    if !bundle.js.trim().is_empty() {
        let script = format!("<script>\n{}\n</script>", bundle.js);
        if document.contains("</body>") {
            document = document.replacen("</body>", &format!("{}\n</body>", script), 1);
        } else {
            document = format!("{}\n{}", document, script);
        }
    }
    document
}

/// Strips what models wrap around a single file: markdown fences, `<style>`
/// or `<script>` wrappers, "Here is the code:" lead-ins, and any preamble
/// before the first line that looks like the target language.
///
/// With no `language`, the kind is guessed from the content.
pub fn clean_code_block(content: &str, language: Option<Language>) -> String {
    if content.is_empty() {
        return String::new();
    }

    let clean = fenced_block_regex().replace_all(content, "$1");
    let clean = clean.replace("```", "");
    let clean = style_block_regex().replace_all(clean.trim(), "$1");
    let mut clean = script_block_regex().replace_all(&clean, "$1").into_owned();

    for prefix in chatty_prefix_regexes() {
        clean = prefix.replace(&clean, "").trim().to_string();
    }

    let looks_like_css = clean.contains('{') || clean.contains('@') || clean.contains(':');
    let looks_like_js = ["const ", "function ", "let ", "var "].iter().any(|kw| clean.contains(kw));

    match language {
        Some(Language::Css) => clean = clean_css(clean),
        Some(Language::Js) => clean = clean_js(clean),
        Some(Language::Html) => clean = clean_html(clean),
        None if looks_like_css => clean = clean_css(clean),
        None if looks_like_js => clean = clean_js(clean),
        None => clean = clean_html(clean),
    }
    clean.trim().to_string()
}

fn skip_to(text: String, regex: &Regex) -> Option<String> {
    let m = regex.find(&text)?;
    (m.start() < PREAMBLE_WINDOW).then(|| text[m.start()..].to_string())
}

fn drop_tags(text: String) -> String {
    if text.contains('<') {
        any_tag_regex().replace_all(&text, "").trim().to_string()
    } else {
        text
    }
}

fn clean_css(mut text: String) -> String {
    for regex in css_start_regexes() {
        if let Some(found) = skip_to(text.clone(), regex) {
            text = found;
            break;
        }
    }
    drop_tags(text)
}

fn clean_js(text: String) -> String {
    let text = skip_to(text.clone(), js_start_regex()).unwrap_or(text);
    drop_tags(text)
}

fn clean_html(text: String) -> String {
    if !(text.contains("<!DOCTYPE") || text.contains("<html") || text.contains("<head")) {
        return text;
    }
    let start = ["<!DOCTYPE", "<html", "<head"]
        .iter()
        .filter_map(|marker| text.find(marker))
        .min();
    match start {
        Some(at) if at > 0 && at < PREAMBLE_WINDOW => text[at..].to_string(),
        _ => text,
    }
}

/// Checks a cleaned single-file refinement before it replaces the file.
/// A CSS or JS result still wrapped in its tag is unwrapped once more;
/// any other markup left over is rejected.
pub fn validate_refinement(content: &str, language: Language) -> PlaygroundResult<String> {
    if content.is_empty() {
        return Err(PlaygroundError::EmptyResult);
    }
    let len = content.chars().count();
    if len < MIN_REFINEMENT_LEN {
        return Err(PlaygroundError::ResultTooShort {
            language,
            len,
            min: MIN_REFINEMENT_LEN,
        });
    }

    let has_document_markup = |text: &str, wrapper: &str| {
        text.contains(wrapper) || text.contains("<html") || text.contains("<!DOCTYPE")
    };

    match language {
        Language::Css => {
            let mut css = content.to_string();
            if has_document_markup(&css, "<style") {
                css = style_block_regex().replace_all(&css, "$1").trim().to_string();
                if css.contains('<') {
                    return Err(PlaygroundError::UnexpectedMarkup { language });
                }
            }
            if !(css.contains('{') || css.contains('@') || css.contains(':')) {
                return Err(PlaygroundError::NotCode { language });
            }
            Ok(css)
        }
        Language::Js => {
            let mut js = content.to_string();
            if has_document_markup(&js, "<script") {
                js = script_block_regex().replace_all(&js, "$1").trim().to_string();
                if js.contains('<') {
                    return Err(PlaygroundError::UnexpectedMarkup { language });
                }
            }
            if !js_shape_regex().is_match(&js) {
                return Err(PlaygroundError::NotCode { language });
            }
            Ok(js)
        }
        Language::Html => {
            let lower = content.to_lowercase();
            let apologetic = ["sorry", "cannot", "unable"].iter().any(|w| lower.contains(w));
            if apologetic || (len < MIN_BARE_HTML_LEN && !content.contains('<')) {
                return Err(PlaygroundError::ApologyInsteadOfHtml);
            }
            Ok(content.to_string())
        }
    }
}

/// Rejects prompts with nothing but whitespace.
pub fn validate_prompt(prompt: &str) -> PlaygroundResult<&str> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        Err(PlaygroundError::EmptyPrompt)
    } else {
        Ok(trimmed)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = "```html\n<!DOCTYPE html>\n<html>\n<head>\n<title>T</title>\n<style>\n  body { color: red; }\n</style>\n</head>\n<body>\n<h1>Hi</h1>\n\n\n<script>\n  console.log(1);\n</script>\n</body>\n</html>\n```";

    #[test]
    fn test_partition_splits_inline_blocks() {
        let bundle = partition_response(RESPONSE);
        assert_eq!(bundle.css, "body { color: red; }\n\n");
        assert_eq!(bundle.js, "console.log(1);\n\n");
        assert!(!bundle.html.contains("<style"));
        assert!(!bundle.html.contains("console.log"));
        assert!(!bundle.html.contains("```"));
        assert!(bundle.html.starts_with("<!DOCTYPE html>"));
        assert!(bundle
            .html
            .contains("    <link rel=\"stylesheet\" href=\"index.css\">\n</head>"));
        assert!(bundle.html.contains("    <script src=\"index.js\"></script>\n</body>"));
        assert!(!bundle.html.contains("\n\n"));
    }

    #[test]
    fn test_partition_keeps_existing_references() {
        let response = "<html><head><link rel=\"stylesheet\" href=\"index.css\"><style>p{}</style></head><body></body></html>";
        let bundle = partition_response(response);
        assert_eq!(bundle.css, "p{}\n\n");
        assert_eq!(bundle.html.matches("index.css").count(), 1);
        assert_eq!(bundle.js, "");
    }

    #[test]
    fn test_partition_plain_html() {
        let bundle = partition_response("  <main>ok</main>  ");
        assert_eq!(bundle, CodeBundle::new("<main>ok</main>", "", ""));
    }

    #[test]
    fn test_inline_for_refinement() {
        let bundle = CodeBundle::new(
            "<html><head><link rel=\"stylesheet\" href=\"index.css\"></head><body><p>x</p><script src=\"index.js\"></script></body></html>",
            "p { color: blue; }",
            "go();",
        );
        let doc = inline_for_refinement(&bundle);
        assert_eq!(
            doc,
            "<html><head><style>\np { color: blue; }\n</style>\n</head><body><p>x</p><script>\ngo();\n</script>\n</body></html>"
        );
    }

    #[test]
    fn test_inline_without_head_or_body() {
        let bundle = CodeBundle::new("<p>x</p>", "a{}", "b();");
        assert_eq!(
            inline_for_refinement(&bundle),
            "<style>\na{}\n</style>\n<p>x</p>\n<script>\nb();\n</script>"
        );
        let blank = CodeBundle::new("<p>x</p>", "  ", "");
        assert_eq!(inline_for_refinement(&blank), "<p>x</p>");
    }

    #[test]
    fn test_clean_css_response() {
        let raw = "Here is the updated code:\n```css\n<style>\nbody { margin: 0; }\n</style>\n```";
        assert_eq!(clean_code_block(raw, Some(Language::Css)), "body { margin: 0; }");
    }

    #[test]
    fn test_clean_js_skips_preamble() {
        let raw = "Sure thing, see below\nconst x = 1;\nconsole.log(x);";
        assert_eq!(
            clean_code_block(raw, Some(Language::Js)),
            "const x = 1;\nconsole.log(x);"
        );
    }

    #[test]
    fn test_clean_html_skips_preamble() {
        let raw = "Result follows\n<!DOCTYPE html>\n<html></html>";
        assert_eq!(
            clean_code_block(raw, Some(Language::Html)),
            "<!DOCTYPE html>\n<html></html>"
        );
        assert_eq!(clean_code_block("", None), "");
    }

    #[test]
    fn test_validate_css() {
        assert_eq!(
            validate_refinement("body { margin: 0; }", Language::Css),
            Ok("body { margin: 0; }".to_string())
        );
        assert_eq!(
            validate_refinement("<style>a { b: c; }</style>", Language::Css),
            Ok("a { b: c; }".to_string())
        );
        assert_eq!(
            validate_refinement("<html><style>a{}</style></html>", Language::Css),
            Err(PlaygroundError::UnexpectedMarkup { language: Language::Css })
        );
        assert_eq!(
            validate_refinement("just some words", Language::Css),
            Err(PlaygroundError::NotCode { language: Language::Css })
        );
    }

    #[test]
    fn test_validate_js_and_length() {
        assert!(validate_refinement("document.title = 'x';", Language::Js).is_ok());
        assert_eq!(
            validate_refinement("x = 1", Language::Js),
            Err(PlaygroundError::ResultTooShort {
                language: Language::Js,
                len: 5,
                min: MIN_REFINEMENT_LEN
            })
        );
        assert_eq!(
            validate_refinement("nothing useful here", Language::Js),
            Err(PlaygroundError::NotCode { language: Language::Js })
        );
        assert_eq!(validate_refinement("", Language::Js), Err(PlaygroundError::EmptyResult));
    }

    #[test]
    fn test_validate_html_rejects_apology() {
        assert_eq!(
            validate_refinement("I'm sorry, I cannot do that.", Language::Html),
            Err(PlaygroundError::ApologyInsteadOfHtml)
        );
        assert_eq!(
            validate_refinement("plain words, no markup", Language::Html),
            Err(PlaygroundError::ApologyInsteadOfHtml)
        );
        assert!(validate_refinement("<main><h1>Hello</h1></main>", Language::Html).is_ok());
    }

    #[test]
    fn test_validate_prompt() {
        assert_eq!(validate_prompt("  a cafe site "), Ok("a cafe site"));
        assert_eq!(validate_prompt(" \n "), Err(PlaygroundError::EmptyPrompt));
    }
}
