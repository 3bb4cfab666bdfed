use std::fmt::Display;
use std::fs;
use std::time::Instant;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use console::Style;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::TaskError;

const ANSI_BLUE: Style = Style::new().blue();

pub fn as_overhead(s: Instant) -> impl Display {
    let e = Instant::now();
    let f = format!("(+{}ms)", e.duration_since(s).as_millis());
    ANSI_BLUE.apply_to(f)
}

/// Reads a UTF-8 file, tagging failures with its path.
pub(crate) fn read(path: &Utf8Path) -> Result<String, TaskError> {
    fs::read_to_string(path).map_err(|e| TaskError::Read(path.to_owned(), e))
}

/// Writes `content` to `path` unless the file already holds exactly that.
/// Missing parent folders are created. Returns whether anything was written.
pub(crate) fn write_if_changed(path: &Utf8Path, content: impl AsRef<[u8]>) -> Result<bool, TaskError> {
    let content = content.as_ref();

    if fs::read(path).is_ok_and(|existing| existing == content) {
        debug!("{path} is up to date");
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| TaskError::Write(parent.to_owned(), e))?;
    }

    fs::write(path, content).map_err(|e| TaskError::Write(path.to_owned(), e))?;
    Ok(true)
}

/// Reads a file holding a JSON object. A missing file reads as `None`.
pub(crate) fn read_json_object(
    path: &Utf8Path,
) -> Result<Option<serde_json::Map<String, serde_json::Value>>, TaskError> {
    if !path.exists() {
        return Ok(None);
    }

    let text = read(path)?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| TaskError::Json(path.to_owned(), e))?;

    match value {
        serde_json::Value::Object(map) => Ok(Some(map)),
        _ => Err(TaskError::NotAnObject(path.to_owned())),
    }
}

/// Pretty-prints JSON with a trailing newline, skipping unchanged files.
pub(crate) fn write_json(path: &Utf8Path, value: &impl serde::Serialize) -> Result<bool, TaskError> {
    let mut text =
        serde_json::to_string_pretty(value).map_err(|e| TaskError::Json(path.to_owned(), e))?;
    text.push('\n');
    write_if_changed(path, text)
}

/// Removes a file or a whole directory tree if it exists.
pub(crate) fn remove(path: &Utf8Path) -> Result<bool, TaskError> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else if path.exists() {
        fs::remove_file(path)
    } else {
        return Ok(false);
    };

    result.map_err(|e| TaskError::Remove(path.to_owned(), e))?;
    Ok(true)
}

/// Copies a directory tree, writing only the files whose content differs.
/// Returns the number of files written.
pub(crate) fn copy_rec(src: &Utf8Path, dst: &Utf8Path) -> Result<usize, TaskError> {
    let mut written = 0;

    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = Utf8PathBuf::try_from(entry.into_path())?;
        let relative = path.strip_prefix(src).unwrap_or(&path);

        let data = fs::read(&path).map_err(|e| TaskError::Read(path.clone(), e))?;
        if write_if_changed(&dst.join(relative), data)? {
            written += 1;
        }
    }

    Ok(written)
}

/// Makes `path` relative to `base` when it's absolute and renders it with
/// forward slashes on every platform. Relative paths are kept as they are.
pub fn relativize(base: &Utf8Path, path: &Utf8Path) -> String {
    let relative = if path.is_absolute() {
        diff(path, base).unwrap_or_else(|| path.to_path_buf())
    } else {
        path.to_path_buf()
    };

    relative.as_str().replace('\\', "/")
}

/// Path leading from `base` to `path`, both absolute.
fn diff(path: &Utf8Path, base: &Utf8Path) -> Option<Utf8PathBuf> {
    let path: Vec<_> = normalize(path);
    let base: Vec<_> = normalize(base);

    // Different roots (e.g. drive letters) can't be related.
    if path.first() != base.first() {
        return None;
    }

    let common = path
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = Utf8PathBuf::new();
    for _ in common..base.len() {
        result.push("..");
    }
    for component in &path[common..] {
        result.push(component.as_str());
    }

    Some(result)
}

fn normalize(path: &Utf8Path) -> Vec<Utf8Component<'_>> {
    let mut out: Vec<Utf8Component> = Vec::new();

    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                if matches!(out.last(), Some(Utf8Component::Normal(_))) {
                    out.pop();
                }
            }
            other => out.push(other),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::scratch;

    #[test]
    fn test_relativize_absolute_path() {
        let value = relativize(
            Utf8Path::new("/proj/target"),
            Utf8Path::new("/proj/generated/imports.js"),
        );
        assert_eq!(value, "../generated/imports.js");
    }

    #[test]
    fn test_relativize_keeps_relative_path() {
        let value = relativize(Utf8Path::new("/proj"), Utf8Path::new("dist\\build"));
        assert_eq!(value, "dist/build");
    }

    #[test]
    fn test_relativize_nested_and_identical() {
        assert_eq!(
            relativize(Utf8Path::new("/proj"), Utf8Path::new("/proj/target/classes")),
            "target/classes"
        );
        assert_eq!(relativize(Utf8Path::new("/proj"), Utf8Path::new("/proj")), "");
        assert_eq!(
            relativize(Utf8Path::new("/proj/./a"), Utf8Path::new("/proj/b/../c")),
            "../c"
        );
    }

    #[test]
    fn test_write_if_changed() {
        let (_dir, root) = scratch();
        let file = root.join("nested/out.txt");

        assert!(write_if_changed(&file, "one").unwrap());
        assert!(!write_if_changed(&file, "one").unwrap());
        assert!(write_if_changed(&file, "two").unwrap());
        assert_eq!(fs::read_to_string(&file).unwrap(), "two");
    }

    #[test]
    fn test_copy_rec_counts_changed_files() {
        let (_dir, root) = scratch();
        let src = root.join("src");
        fs::create_dir_all(src.join("deep")).unwrap();
        fs::write(src.join("a.js"), "a").unwrap();
        fs::write(src.join("deep/b.js"), "b").unwrap();

        let dst = root.join("dst");
        assert_eq!(copy_rec(&src, &dst).unwrap(), 2);
        assert_eq!(copy_rec(&src, &dst).unwrap(), 0);
        assert_eq!(fs::read_to_string(dst.join("deep/b.js")).unwrap(), "b");
    }

    #[test]
    fn test_json_object_round_trip() {
        let (_dir, root) = scratch();
        let file = root.join("package.json");
        assert!(read_json_object(&file).unwrap().is_none());

        write_json(&file, &serde_json::json!({ "name": "app" })).unwrap();
        let map = read_json_object(&file).unwrap().unwrap();
        assert_eq!(map["name"], "app");

        fs::write(&file, "[1, 2]").unwrap();
        assert!(matches!(read_json_object(&file), Err(TaskError::NotAnObject(_))));
    }

    #[test]
    fn test_remove_missing_path() {
        let (_dir, root) = scratch();
        assert!(!remove(&root.join("absent")).unwrap());
    }
}
