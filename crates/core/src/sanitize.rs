use crate::error::IngestError;
use lopdf::{Document, Object};
use std::path::{Path, PathBuf};
use tracing::debug;

const CLEANED_SUFFIX: &str = "_cleaned";
const UTF16_BOM: [u8; 2] = [0xfe, 0xff];

pub fn strip_invalid_utf8(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len());
    let mut rest = bytes;

    while !rest.is_empty() {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                output.push_str(valid);
                break;
            }
            Err(error) => {
                let valid_up_to = error.valid_up_to();
                output.push_str(std::str::from_utf8(&rest[..valid_up_to]).unwrap_or_default());
                let skipped = error.error_len().unwrap_or(rest.len() - valid_up_to);
                rest = &rest[valid_up_to + skipped..];
            }
        }
    }

    output
}

pub fn sanitize_key(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && *c != '\\' && *c != '\'')
        .collect()
}

pub fn cleaned_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}{CLEANED_SUFFIX}.pdf"))
}

pub fn sanitize_pdf(path: &Path) -> Result<PathBuf, IngestError> {
    let mut document = Document::load(path)
        .map_err(|error| IngestError::Pdf(format!("{}: {error}", path.display())))?;

    let pruned = document.prune_objects();
    let emptied = document.delete_zero_length_streams();
    let cleaned_strings = clean_info_strings(&mut document);

    let target = cleaned_path(path);
    document
        .save(&target)
        .map_err(|error| IngestError::Pdf(format!("{}: {error}", target.display())))?;

    debug!(
        source = %path.display(),
        target = %target.display(),
        pruned = pruned.len(),
        emptied = emptied.len(),
        cleaned_strings,
        "sanitized pdf"
    );

    Ok(target)
}

fn clean_info_strings(document: &mut Document) -> usize {
    let info_id = match document.trailer.get(b"Info").and_then(Object::as_reference) {
        Ok(id) => id,
        Err(_) => return 0,
    };
    let info = match document.get_object_mut(info_id).and_then(Object::as_dict_mut) {
        Ok(info) => info,
        Err(_) => return 0,
    };

    let mut cleaned = 0;
    for (_, value) in info.iter_mut() {
        if let Object::String(bytes, _) = value {
            if bytes.starts_with(&UTF16_BOM) {
                continue;
            }
            let text = strip_invalid_utf8(bytes.as_slice());
            if text.len() != bytes.len() {
                *bytes = text.into_bytes();
                cleaned += 1;
            }
        }
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_sequences_are_dropped() {
        let bytes = b"caf\xc3\xa9 \xff\xfebar\xc3";
        assert_eq!(strip_invalid_utf8(bytes), "café bar");
    }

    #[test]
    fn valid_text_is_untouched() {
        assert_eq!(strip_invalid_utf8("Ünïcode ✓".as_bytes()), "Ünïcode ✓");
        assert_eq!(strip_invalid_utf8(b""), "");
    }

    #[test]
    fn keys_lose_spaces_backslashes_and_quotes() {
        assert_eq!(sanitize_key("Chef's \\ Special  Menu"), "ChefsSpecialMenu");
        assert_eq!(sanitize_key("\tA\nB "), "AB");
    }

    #[test]
    fn cleaned_path_sits_next_to_input() {
        assert_eq!(
            cleaned_path(Path::new("/data/menu.pdf")),
            PathBuf::from("/data/menu_cleaned.pdf")
        );
    }

    #[test]
    fn broken_pdf_is_reported() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4\n%broken")?;

        assert!(matches!(sanitize_pdf(&path), Err(IngestError::Pdf(_))));
        assert!(!cleaned_path(&path).exists());
        Ok(())
    }
}
