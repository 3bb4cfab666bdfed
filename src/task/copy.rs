use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::error::TaskError;
use crate::io::{copy_rec, write_if_changed};
use crate::task::{Command, TaskKind};

/// Locations of frontend resources inside a jar.
const RESOURCE_ROOTS: [&str; 2] = ["META-INF/resources/frontend", "META-INF/frontend"];

/// Extracts the frontend resources bundled in jars, or in exploded class
/// folders, into the resources folder.
pub(crate) struct CopyFrontendFiles {
    jars: BTreeSet<Utf8PathBuf>,
    target: Utf8PathBuf,
}

impl CopyFrontendFiles {
    pub fn new(jars: BTreeSet<Utf8PathBuf>, target: Utf8PathBuf) -> Self {
        Self { jars, target }
    }

    fn extract(&self, jar: &Utf8Path) -> Result<usize, TaskError> {
        let file = File::open(jar).map_err(|e| TaskError::Read(jar.to_owned(), e))?;
        let mut archive = ZipArchive::new(file).map_err(|e| TaskError::Archive(jar.to_owned(), e))?;
        let mut written = 0;

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| TaskError::Archive(jar.to_owned(), e))?;

            if entry.is_dir() {
                continue;
            }

            // Entries escaping the archive root are skipped.
            let Some(name) = entry.enclosed_name() else {
                continue;
            };
            let Ok(name) = Utf8PathBuf::try_from(name) else {
                continue;
            };
            let Some(relative) = RESOURCE_ROOTS
                .iter()
                .find_map(|root| name.strip_prefix(root).ok())
            else {
                continue;
            };

            let mut data = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut data)
                .map_err(|e| TaskError::Read(jar.join(&name), e))?;

            if write_if_changed(&self.target.join(relative), data)? {
                written += 1;
            }
        }

        Ok(written)
    }
}

impl Command for CopyFrontendFiles {
    fn kind(&self) -> TaskKind {
        TaskKind::CopyFrontendFiles
    }

    fn execute(&self) -> Result<(), TaskError> {
        let mut written = 0;

        for jar in &self.jars {
            if jar.is_dir() {
                for root in RESOURCE_ROOTS {
                    let folder = jar.join(root);
                    if folder.is_dir() {
                        written += copy_rec(&folder, &self.target)?;
                    }
                }
            } else if jar.is_file() {
                written += self.extract(jar)?;
            } else {
                warn!("Skipping {jar}, it doesn't exist");
            }
        }

        info!("Copied {written} frontend resources into {}", self.target);
        Ok(())
    }
}

/// Copies the project's own frontend resources on top of the jar resources.
pub(crate) struct CopyLocalFrontendFiles {
    source: Utf8PathBuf,
    target: Utf8PathBuf,
}

impl CopyLocalFrontendFiles {
    pub fn new(source: Utf8PathBuf, target: Utf8PathBuf) -> Self {
        Self { source, target }
    }
}

impl Command for CopyLocalFrontendFiles {
    fn kind(&self) -> TaskKind {
        TaskKind::CopyLocalFrontendFiles
    }

    fn execute(&self) -> Result<(), TaskError> {
        if !self.source.is_dir() {
            debug!("No local frontend resources in {}", self.source);
            return Ok(());
        }

        let written = copy_rec(&self.source, &self.target)?;
        info!("Copied {written} local frontend resources into {}", self.target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    use super::*;
    use crate::testing::scratch;

    fn jar(path: &Utf8Path, entries: &[(&str, &str)]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_extracts_only_frontend_entries() {
        let (_dir, root) = scratch();
        let archive = root.join("button.jar");
        jar(
            &archive,
            &[
                ("META-INF/resources/frontend/button.js", "export {}"),
                ("META-INF/frontend/styles/button.css", ":host {}"),
                ("com/example/Button.class", "cafebabe"),
            ],
        );

        let target = root.join("resources");
        let task = CopyFrontendFiles::new(BTreeSet::from([archive]), target.clone());
        task.execute().unwrap();

        assert_eq!(fs::read_to_string(target.join("button.js")).unwrap(), "export {}");
        assert!(target.join("styles/button.css").exists());
        assert!(!target.join("com").exists());
    }

    #[test]
    fn test_exploded_class_folder() {
        let (_dir, root) = scratch();
        let classes = root.join("classes");
        fs::create_dir_all(classes.join("META-INF/frontend")).unwrap();
        fs::write(classes.join("META-INF/frontend/view.js"), "view").unwrap();

        let target = root.join("resources");
        CopyFrontendFiles::new(BTreeSet::from([classes]), target.clone())
            .execute()
            .unwrap();

        assert_eq!(fs::read_to_string(target.join("view.js")).unwrap(), "view");
    }

    #[test]
    fn test_local_files_override_jar_files() {
        let (_dir, root) = scratch();
        let target = root.join("resources");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("theme.css"), "from-jar").unwrap();

        let local = root.join("local");
        fs::create_dir_all(&local).unwrap();
        fs::write(local.join("theme.css"), "local").unwrap();

        CopyLocalFrontendFiles::new(local, target.clone())
            .execute()
            .unwrap();
        assert_eq!(fs::read_to_string(target.join("theme.css")).unwrap(), "local");
    }

    #[test]
    fn test_missing_local_folder_is_fine() {
        let (_dir, root) = scratch();
        CopyLocalFrontendFiles::new(root.join("absent"), root.join("resources"))
            .execute()
            .unwrap();
        assert!(!root.join("resources").exists());
    }
}
