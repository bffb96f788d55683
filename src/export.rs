use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::llm::response::{MediaResult, Recommendation, ResultView, TextResult};

pub fn language_extension(language: &str) -> &'static str {
    match language.trim().to_lowercase().as_str() {
        "python" => "py",
        "javascript" => "js",
        "typescript" => "ts",
        "html" => "html",
        "css" => "css",
        "java" => "java",
        "csharp" => "cs",
        "cpp" => "cpp",
        "ruby" => "rb",
        "go" => "go",
        "rust" => "rs",
        "shell" => "sh",
        "json" => "json",
        "sql" => "sql",
        _ => "txt",
    }
}

fn image_extension(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

pub fn recommendations_text(items: &[Recommendation]) -> String {
    items
        .iter()
        .map(|item| {
            format!(
                "Title: {}\nType: {}\nReason: {}",
                item.title, item.kind, item.reason
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// File name and contents for every exportable piece of `view`.
pub fn export_entries(view: &ResultView) -> Vec<(String, Vec<u8>)> {
    let mut entries = Vec::new();

    if let Some(image) = view.image() {
        entries.push((
            format!("ai-generated-image.{}", image_extension(&image.mime_type)),
            image.bytes.clone(),
        ));
    } else if let Some(MediaResult::Video { prompt }) = &view.media {
        entries.push(("video_prompt.txt".to_string(), prompt.clone().into_bytes()));
    }

    if let Some(answer) = view.answer() {
        entries.push(("answer.txt".to_string(), answer.as_bytes().to_vec()));
    }
    match &view.text {
        Some(TextResult::Recommendations(items)) => entries.push((
            "recommendations.txt".to_string(),
            recommendations_text(items).into_bytes(),
        )),
        Some(TextResult::Code { language, source }) => entries.push((
            format!("code.{}", language_extension(language)),
            source.clone().into_bytes(),
        )),
        Some(TextResult::Answer(_)) | None => {}
    }

    entries
}

pub async fn export_result(view: &ResultView, dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = export_entries(view);
    if entries.is_empty() {
        return Ok(Vec::new());
    }

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create export directory {}", dir.display()))?;

    let mut written = Vec::with_capacity(entries.len());
    for (name, contents) in entries {
        let path = dir.join(name);
        tokio::fs::write(&path, contents)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Exported {}", path.display());
        written.push(path);
    }
    Ok(written)
}
