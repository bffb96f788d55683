use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::ClassifiedError;
use crate::export::recommendations_text;
use crate::llm::media::{describe_size, EncodedFile};
use crate::llm::response::{MediaResult, ResultView, TextResult};

static ADJACENT_TAGS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(>)(<)(/*)").expect("valid adjacent tag regex"));

pub const EMPTY_RESULT_MESSAGE: &str = "Could not determine response type.";

/// Breaks `><` runs onto separate lines so single-line markup stays readable.
pub fn format_code(source: &str) -> String {
    ADJACENT_TAGS_RE
        .replace_all(source, "${1}\n${2}${3}")
        .into_owned()
}

fn render_media(media: &MediaResult, sections: &mut Vec<String>) {
    match media {
        MediaResult::Image {
            image: Some(image),
            prompt,
        } => sections.push(format!(
            "[Image] {} ({}), prompt: \"{}\"",
            image.mime_type,
            describe_size(image.bytes.len() as u64),
            prompt
        )),
        MediaResult::Image { image: None, prompt } => {
            sections.push(format!("Image Prompt: {prompt}"))
        }
        MediaResult::Video { prompt } => sections.push(format!(
            "Video Generation Concept\nScene Description:\n{prompt}"
        )),
    }
}

fn render_text(text: &TextResult, sections: &mut Vec<String>) {
    match text {
        TextResult::Answer(answer) => sections.push(answer.clone()),
        TextResult::Recommendations(items) => sections.push(recommendations_text(items)),
        TextResult::Code { language, source } => sections.push(format!(
            "```{}\n{}\n```",
            language.to_lowercase(),
            format_code(source)
        )),
    }
}

/// Terminal rendering: media first, then the textual result.
pub fn render_result(view: &ResultView) -> String {
    if view.is_empty() {
        return EMPTY_RESULT_MESSAGE.to_string();
    }

    let mut sections = Vec::new();
    if let Some(media) = &view.media {
        render_media(media, &mut sections);
    }
    if let Some(text) = &view.text {
        render_text(text, &mut sections);
    }
    sections.join("\n\n")
}

pub fn render_error(error: &ClassifiedError) -> String {
    format!("Error: {}", error.message)
}

pub fn render_attachment(file: &EncodedFile) -> String {
    let label = if file.is_image() { "image" } else { "file" };
    format!(
        "Attached {label} {} ({}, {})",
        file.name,
        file.mime_type,
        describe_size(file.size_bytes)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{classify_error, GenerationError, NETWORK_MESSAGE};
    use crate::llm::media::encode_bytes;
    use crate::llm::response::{video_concept, GeneratedImage};

    #[test]
    fn adjacent_tags_are_split() {
        assert_eq!(
            format_code("<div><p>hi</p></div>"),
            "<div>\n<p>hi</p>\n</div>"
        );
        assert_eq!(format_code("let x = 1;"), "let x = 1;");
    }

    #[test]
    fn media_is_rendered_before_text() {
        let view = ResultView {
            text: Some(TextResult::Answer("Cats purr.".to_string())),
            media: Some(MediaResult::Image {
                image: Some(GeneratedImage {
                    bytes: vec![0; 2048],
                    mime_type: "image/png".to_string(),
                }),
                prompt: "a cat".to_string(),
            }),
        };
        assert_eq!(
            render_result(&view),
            "[Image] image/png (2.0 KB), prompt: \"a cat\"\n\nCats purr."
        );
    }

    #[test]
    fn missing_image_falls_back_to_prompt() {
        let view = ResultView {
            text: None,
            media: Some(MediaResult::Image {
                image: None,
                prompt: "a cat".to_string(),
            }),
        };
        assert_eq!(render_result(&view), "Image Prompt: a cat");
    }

    #[test]
    fn video_and_empty_results() {
        let view = ResultView {
            text: None,
            media: Some(video_concept("waves")),
        };
        assert!(render_result(&view).ends_with("Scene Description:\nwaves"));
        assert_eq!(render_result(&ResultView::default()), EMPTY_RESULT_MESSAGE);
    }

    #[test]
    fn attachments_say_whether_they_are_images() {
        let scan = encode_bytes("scan.png", &[0; 1024], "image/png");
        assert_eq!(
            render_attachment(&scan),
            "Attached image scan.png (image/png, 1.0 KB)"
        );
        let notes = encode_bytes("notes.md", b"# hi", "text/markdown");
        assert!(render_attachment(&notes).starts_with("Attached file notes.md"));
    }

    #[test]
    fn errors_show_the_user_message() {
        let classified = classify_error(&GenerationError::Transport("reset".to_string()));
        assert_eq!(render_error(&classified), format!("Error: {NETWORK_MESSAGE}"));
    }
}
