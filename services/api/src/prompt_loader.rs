use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// File stem of the persona prompt inside the prompts directory.
pub const PERSONA_PROMPT: &str = "persona";

/// Reads every `*.md` file in `dir_path`, keyed by file stem.
pub fn load_prompts(dir_path: &Path) -> Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();

    for entry in fs::read_dir(dir_path)
        .with_context(|| format!("Failed to read prompts directory: {}", dir_path.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem for prompt file")?
                .to_string();

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read prompt file: {}", path.display()))?;

            prompts.insert(prompt_key, content);
        }
    }

    Ok(prompts)
}

/// Returns the persona text, or `None` when the directory or the file is
/// missing or the file is blank.
pub fn load_persona(dir_path: &Path) -> Result<Option<String>> {
    if !dir_path.is_dir() {
        return Ok(None);
    }
    let mut prompts = load_prompts(dir_path)?;
    Ok(prompts
        .remove(PERSONA_PROMPT)
        .filter(|text| !text.trim().is_empty()))
}
