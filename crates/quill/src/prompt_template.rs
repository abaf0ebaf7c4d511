use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Error as TeraError, Tera};

pub const IMAGE_GENERATION_PROMPT: &str = "image_generation.md";
pub const SENTIMENT_PROMPT: &str = "sentiment.md";
pub const PDF_CHAT_PROMPT: &str = "pdf_chat.md";
pub const SUMMARIZE_PDF_PROMPT: &str = "summarize_pdf.md";
pub const TRANSCRIBE_PROMPT: &str = "transcribe.md";

/// Templates compiled into the binary, used when the prompts directory is not on disk
const BUILTIN_PROMPTS: &[(&str, &str)] = &[
    (IMAGE_GENERATION_PROMPT, include_str!("prompts/image_generation.md")),
    (SENTIMENT_PROMPT, include_str!("prompts/sentiment.md")),
    (PDF_CHAT_PROMPT, include_str!("prompts/pdf_chat.md")),
    (SUMMARIZE_PDF_PROMPT, include_str!("prompts/summarize_pdf.md")),
    (TRANSCRIBE_PROMPT, include_str!("prompts/transcribe.md")),
];

/// Get the path to the prompts directory
fn prompts_dir() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir).join("src").join("prompts")
}

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

fn builtin_prompt(template_path: &Path) -> Option<&'static str> {
    let name = template_path.to_str()?;
    BUILTIN_PROMPTS
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|(_, content)| *content)
}

/// Render a template file. Relative names that don't exist are looked up in the
/// prompts directory, then among the built-in templates.
pub fn load_prompt_file<T: Serialize>(
    template_file: impl Into<PathBuf>,
    context_data: &T,
) -> Result<String, TeraError> {
    let template_path = template_file.into();
    let file_path = if !template_path.exists() {
        prompts_dir().join(&template_path)
    } else {
        template_path.clone()
    };

    let template_content = match fs::read_to_string(&file_path) {
        Ok(content) => content,
        Err(e) => builtin_prompt(&template_path)
            .map(str::to_string)
            .ok_or_else(|| TeraError::chain("Failed to read template file", e))?,
    };
    load_prompt(&template_content, context_data)
}
