//! TOML parser with helpful error messages

use anyhow::Result;

use super::ManifestFile;

/// Parse envbox.toml content from string
pub fn parse_manifest_str(content: &str) -> Result<ManifestFile> {
    let file: ManifestFile =
        toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;

    for key in file.env.keys() {
        if key.is_empty() {
            anyhow::bail!("[env] contains an empty variable name");
        }
    }

    Ok(file)
}

/// Point at the offending line when the TOML error carries a span
fn enhance_toml_error(error: toml::de::Error, content: &str) -> anyhow::Error {
    let message = error.message().to_string();
    let Some(span) = error.span() else {
        return anyhow::anyhow!("TOML parsing error: {}", message);
    };

    let line_num = content[..span.start.min(content.len())]
        .matches('\n')
        .count()
        + 1;
    anyhow::anyhow!(
        "TOML parsing error at line {}:\n{}\n\nError: {}",
        line_num,
        line_context(content, line_num),
        message
    )
}

/// Get context lines around an error
fn line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2);
    let end = (line_num + 1).min(lines.len());

    lines[start.min(end)..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            let marker = if num == line_num { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, num, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
