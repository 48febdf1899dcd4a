//! Problem statement assembly from structured sections

use serde::{Deserialize, Serialize};

/// Structured problem statement as found in imported bundles
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProblemSource {
    pub description: Option<String>,
    pub input: Option<String>,
    pub output: Option<String>,
    #[serde(default)]
    pub samples: Vec<(String, String)>,
    pub hint: Option<String>,
    pub source: Option<String>,
}

/// Output flavour for [`build_content`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFormat {
    Markdown,
    Html,
}

/// Render a statement from its sections
pub fn build_content(source: &ProblemSource, format: ContentFormat) -> String {
    let heading = |title: &str| match format {
        ContentFormat::Markdown => format!("## {}", title),
        ContentFormat::Html => format!("<h2>{}</h2>", title),
    };

    let mut parts: Vec<String> = Vec::new();
    let mut section = |title: &str, body: &Option<String>| {
        if let Some(body) = body.as_deref().filter(|b| !b.is_empty()) {
            parts.push(heading(title));
            parts.push(body.to_string());
        }
    };

    section("Description", &source.description);
    section("Input Format", &source.input);
    section("Output Format", &source.output);

    let mut samples: Vec<String> = source
        .samples
        .iter()
        .enumerate()
        .map(|(i, (input, output))| match format {
            ContentFormat::Markdown => [
                heading(&format!("Sample Input {}", i + 1)),
                "```".to_string(),
                input.clone(),
                "```".to_string(),
                heading(&format!("Sample Output {}", i + 1)),
                "```".to_string(),
                output.clone(),
                "```".to_string(),
            ]
            .join("\n"),
            ContentFormat::Html => [
                format!("{}<pre>", heading(&format!("Sample Input {}", i + 1))),
                input.clone(),
                format!("</pre>{}<pre>", heading(&format!("Sample Output {}", i + 1))),
                output.clone(),
                "</pre>".to_string(),
            ]
            .join("\n"),
        })
        .collect();

    let mut tail: Vec<String> = Vec::new();
    for (title, body) in [("Hint", &source.hint), ("Source", &source.source)] {
        if let Some(body) = body.as_deref().filter(|b| !b.is_empty()) {
            tail.push(heading(title));
            tail.push(body.to_string());
        }
    }

    parts.append(&mut samples);
    parts.append(&mut tail);
    parts.join("\n")
}
