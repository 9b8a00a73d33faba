use url::Url;

/// Series metadata read from the index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Work {
    pub title: String,
    pub author: String,
    pub artist: String,
    pub posted_on: String,
    pub genres: Vec<String>,
}

impl Work {
    /// Name of the work's output directory
    pub fn directory_name(&self) -> String {
        sanitize_name(&self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub name: String,
    pub source_url: Url,
}

impl Chapter {
    pub fn directory_name(&self) -> String {
        sanitize_name(&self.name)
    }
}

/// Makes a title safe to use as a single path component.
pub fn sanitize_name(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '/' | '\\' | '<' | '>' | '|' | '*' => ' ',
            _ => c,
        })
        .filter(|c| !matches!(c, ':' | '"' | '?'))
        .collect();
    let cleaned = cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let cleaned = cleaned.trim_end_matches('.').trim();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "untitled".into()
    } else {
        cleaned.into()
    }
}
