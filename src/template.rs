//! Report templates: sets of files copied into a working directory.

use crate::config;
use once_cell::sync::Lazy;
use regex::bytes::{NoExpand, Regex};
use std::{
    borrow::Cow,
    fmt, fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Token replaced by [`VERSION`] in every materialized file.
pub const VERSION_MARKER: &str = "MOZREPORT_VERSION";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

static MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&regex::escape(VERSION_MARKER)).expect("escaped marker is a valid pattern")
});

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("{0} does not exist")]
    NotFound(PathBuf),
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("{0} already exists")]
    AlreadyExists(PathBuf),
    #[error("could not access {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("could not walk template: {0}")]
    Walk(#[from] walkdir::Error),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> TemplateError + '_ {
    move |source| TemplateError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// A file of a template compiled into the binary.
#[derive(Debug, PartialEq, Eq)]
pub struct EmbeddedFile {
    pub path: &'static str,
    pub contents: &'static [u8],
}

const RMARKDOWN: &[EmbeddedFile] = &[
    EmbeddedFile {
        path: "build.py",
        contents: include_bytes!("../templates/rmarkdown/build.py"),
    },
    EmbeddedFile {
        path: "report.Rmd",
        contents: include_bytes!("../templates/rmarkdown/report.Rmd"),
    },
];

/// Where a template's files come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Embedded(&'static [EmbeddedFile]),
    Directory(PathBuf),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Embedded(_) => f.write_str("<built-in>"),
            Source::Directory(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    pub source: Source,
}

/// The templates shipped inside the binary.
pub fn builtin() -> Vec<Template> {
    vec![Template {
        name: "rmarkdown".to_string(),
        source: Source::Embedded(RMARKDOWN),
    }]
}

impl Template {
    /// A template read from the directory `path`.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Template {
            name: name.into(),
            source: Source::Directory(path.into()),
        }
    }

    /// The built-in templates followed by those under `<user_root>/templates`.
    /// `user_root` defaults to the data directory.
    pub fn discover(user_root: Option<&Path>) -> Result<Vec<Template>, TemplateError> {
        let user_root = match user_root {
            Some(root) => Some(root.to_path_buf()),
            None => match config::data_dir() {
                Ok(dir) => Some(dir),
                Err(err) => {
                    debug!("skipping user templates: {}", err);
                    None
                }
            },
        };
        let mut discovered = builtin();
        let roots: Vec<PathBuf> = user_root.into_iter().collect();
        for template in discover_in(&roots)? {
            push_unique(&mut discovered, template);
        }
        Ok(discovered)
    }

    /// Copies this template into `target`, replacing [`VERSION_MARKER`].
    ///
    /// Not transactional: when a file is refused because it already exists,
    /// files copied before it stay in place.
    pub fn materialize(&self, target: &Path, overwrite: bool) -> Result<(), TemplateError> {
        if !target.exists() {
            return Err(TemplateError::NotFound(target.to_path_buf()));
        }
        if !target.is_dir() {
            return Err(TemplateError::NotADirectory(target.to_path_buf()));
        }

        match &self.source {
            Source::Embedded(files) => {
                for file in files.iter() {
                    copy_file(file.contents, &target.join(file.path), overwrite)?;
                }
            }
            Source::Directory(root) => {
                for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
                    let entry = entry?;
                    let relative = match entry.path().strip_prefix(root) {
                        Ok(relative) => relative,
                        Err(_) => continue,
                    };
                    let destination = target.join(relative);
                    if entry.file_type().is_dir() {
                        fs::create_dir_all(&destination).map_err(io_error(&destination))?;
                        continue;
                    }
                    let contents = fs::read(entry.path()).map_err(io_error(entry.path()))?;
                    copy_file(&contents, &destination, overwrite)?;
                }
            }
        }
        Ok(())
    }
}

fn copy_file(contents: &[u8], destination: &Path, overwrite: bool) -> Result<(), TemplateError> {
    if !overwrite && destination.exists() {
        return Err(TemplateError::AlreadyExists(destination.to_path_buf()));
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    fs::write(destination, substitute_version(contents, VERSION)).map_err(io_error(destination))?;
    debug!(path = %destination.display(), "wrote template file");
    Ok(())
}

fn push_unique(discovered: &mut Vec<Template>, template: Template) {
    if let Some(first) = discovered.iter().find(|t| t.name == template.name) {
        warn!(
            "template {} in {} is shadowed by {}",
            template.name, template.source, first.source
        );
        return;
    }
    discovered.push(template);
}

/// Scans `<root>/templates/*` for each root in order.
///
/// Names are unique in the result: the first root providing a name wins and
/// later ones are reported and skipped. Roots without a `templates`
/// directory are ignored.
pub fn discover_in(roots: &[PathBuf]) -> Result<Vec<Template>, TemplateError> {
    let mut discovered: Vec<Template> = Vec::new();
    for root in roots {
        let templates = root.join("templates");
        if !templates.is_dir() {
            debug!(root = %root.display(), "no templates directory");
            continue;
        }

        let mut found = Vec::new();
        for entry in fs::read_dir(&templates).map_err(io_error(&templates))? {
            let entry = entry.map_err(io_error(&templates))?;
            let path = entry.path();
            if path.is_dir() {
                let name = entry.file_name().to_string_lossy().into_owned();
                found.push(Template::new(name, path));
            }
        }
        found.sort_by(|a, b| a.name.cmp(&b.name));

        for template in found {
            push_unique(&mut discovered, template);
        }
    }
    Ok(discovered)
}

pub fn find<'a>(templates: &'a [Template], name: &str) -> Option<&'a Template> {
    templates.iter().find(|template| template.name == name)
}

pub fn names(templates: &[Template]) -> Vec<&str> {
    templates.iter().map(|template| template.name.as_str()).collect()
}

/// Replaces every [`VERSION_MARKER`] in `contents` by `version`, leaving all
/// other bytes alone.
pub fn substitute_version<'a>(contents: &'a [u8], version: &str) -> Cow<'a, [u8]> {
    MARKER.replace_all(contents, NoExpand(version.as_bytes()))
}
