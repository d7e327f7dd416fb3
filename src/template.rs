use log::debug;
use std::collections::HashMap;
use thiserror::Error;
use Error::*;

#[derive(Error, Debug)]
pub enum Error {
    #[error("read {path}: {err}")]
    ReadFile { err: std::io::Error, path: String },

    #[error("write {path}: {err}")]
    WriteFile { err: std::io::Error, path: String },

    #[error("template {path} has unresolved placeholder {{{{{key}}}}}")]
    Unresolved { path: String, key: String },
}

/// Render `template_path` into `dest_path`, replacing every `{{key}}`
/// placeholder with its value from `substitutions`.
///
/// If the destination already exists it is treated as an
/// operator-authored override and left untouched. A placeholder with no
/// matching substitution is an error, never silently passed through.
pub fn render(
    template_path: &str,
    dest_path: &str,
    substitutions: &HashMap<&str, String>,
) -> Result<(), Error> {
    if std::fs::metadata(dest_path).is_ok() {
        debug!("{dest_path} already exists, keeping it as-is");
        return Ok(());
    }

    let mut rendered = std::fs::read_to_string(template_path).map_err(|err| ReadFile {
        err,
        path: template_path.to_string(),
    })?;

    for (key, value) in substitutions {
        rendered = rendered.replace(&format!("{{{{{key}}}}}"), value);
    }

    if let Some(key) = unresolved_key(&rendered) {
        return Err(Unresolved {
            path: template_path.to_string(),
            key,
        });
    }

    std::fs::write(dest_path, rendered).map_err(|err| WriteFile {
        err,
        path: dest_path.to_string(),
    })?;

    debug!("rendered {template_path} to {dest_path}");
    Ok(())
}

fn unresolved_key(rendered: &str) -> Option<String> {
    let start = rendered.find("{{")?;
    let rest = &rendered[start + 2..];
    let end = rest.find("}}")?;
    Some(rest[..end].to_string())
}
