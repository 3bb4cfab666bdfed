//! Template lookup and placeholder substitution.
//!
//! A template identifier is tried, in order, as a class loader resource, as
//! one of the templates bundled with this crate, and finally as a URL.

use std::fs;

use camino::Utf8PathBuf;

use crate::error::TemplateError;
use crate::finder::ClassFinder;

/// Templates shipped with the crate, keyed by resource name.
const BUNDLED: &[(&str, &str)] = &[
    ("index.html", include_str!("templates/index.html")),
    ("index.ts", include_str!("templates/index.ts")),
    ("tsconfig.json", include_str!("templates/tsconfig.json")),
    ("types.d.ts", include_str!("templates/types.d.ts")),
    ("webpack.config.js", include_str!("templates/webpack.config.js")),
    ("webpack.generated.js", include_str!("templates/webpack.generated.js")),
    ("web-component.js", include_str!("templates/web-component.js")),
    ("connect-client.default.ts", include_str!("templates/connect-client.default.ts")),
];

/// A resolved template together with where it came from.
#[derive(Debug, Clone)]
pub struct Template {
    pub origin: String,
    pub text: String,
}

impl Template {
    pub fn bundled(name: &str) -> Option<Self> {
        BUNDLED
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(key, text)| Template {
                origin: format!("bundled:{key}"),
                text: text.to_string(),
            })
    }

    pub fn resolve(finder: &dyn ClassFinder, name: &str) -> Result<Self, TemplateError> {
        if let Some(path) = finder.resource(name) {
            let text = fs::read_to_string(&path).map_err(|e| TemplateError::Read(path.clone(), e))?;
            return Ok(Template {
                origin: path.into_string(),
                text,
            });
        }

        if let Some(template) = Self::bundled(name) {
            return Ok(template);
        }

        fetch(name)
    }

    /// Replaces every `(token, value)` pair line by line and terminates each
    /// line with `\n`.
    pub fn render(&self, tokens: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(self.text.len());

        for line in self.text.lines() {
            let line = tokens
                .iter()
                .fold(line.to_string(), |line, (token, value)| line.replace(token, value));
            out.push_str(&line);
            out.push('\n');
        }

        out
    }
}

fn fetch(url: &str) -> Result<Template, TemplateError> {
    if let Some(path) = url.strip_prefix("file://") {
        let path = Utf8PathBuf::from(path);
        let text = fs::read_to_string(&path).map_err(|e| TemplateError::Read(path, e))?;
        return Ok(Template {
            origin: url.to_string(),
            text,
        });
    }

    if url.starts_with("http://") || url.starts_with("https://") {
        return fetch_remote(url);
    }

    Err(TemplateError::NotFound(url.to_string()))
}

#[cfg(feature = "remote-templates")]
fn fetch_remote(url: &str) -> Result<Template, TemplateError> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| TemplateError::Http(url.to_string(), Box::new(e)))?;
    let text = response
        .into_string()
        .map_err(|e| TemplateError::Body(url.to_string(), e))?;

    Ok(Template {
        origin: url.to_string(),
        text,
    })
}

#[cfg(not(feature = "remote-templates"))]
fn fetch_remote(url: &str) -> Result<Template, TemplateError> {
    Err(TemplateError::RemoteDisabled(url.to_string()))
}
