use std::env;
use std::fs;
use std::path::Path;
use std::process;
use webcrafter_core::{assemble_preview, CodeBundle, PreviewRenderer, SandboxPolicy};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: webcrafter-preview [--iframe] <index.html> [index.css] [index.js]");
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  webcrafter-preview site/index.html site/index.css site/index.js");
        eprintln!("  webcrafter-preview --iframe page.html > frame.html");
        process::exit(1);
    }

    let iframe = args[1] == "--iframe";
    let files: Vec<&str> = args[1..].iter().map(|s| s.as_str()).filter(|a| *a != "--iframe").collect();

    let bundle = match read_bundle(&files) {
        Ok(bundle) => bundle,
        Err(e) => {
            eprintln!("✗ {}", e);
            process::exit(1);
        }
    };

    if iframe {
        let mut renderer = PreviewRenderer::new(SandboxPolicy::default());
        println!("{}", renderer.render(&bundle).to_iframe());
    } else {
        println!("{}", assemble_preview(&bundle));
    }
}

fn read_bundle(files: &[&str]) -> Result<CodeBundle, String> {
    let [html, rest @ ..] = files else {
        return Err("no html file given".to_string());
    };
    let read = |path: &str| {
        fs::read_to_string(Path::new(path)).map_err(|e| format!("Failed to read {}: {}", path, e))
    };

    let mut bundle = CodeBundle::new(read(*html)?, "", "");
    // Extra files are matched to css/js by extension.
    for path in rest {
        match Path::new(path).extension().and_then(|e| e.to_str()) {
            Some("css") => bundle.css = read(*path)?,
            Some("js") => bundle.js = read(*path)?,
            _ => return Err(format!("{}: expected a .css or .js file", path)),
        }
    }
    Ok(bundle)
}
