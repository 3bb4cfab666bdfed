use std::rc::Rc;

use serde_json::{Value, json};
use tracing::{info, warn};

use crate::config::{Config, FALLBACK_IMPORTS_NAME};
use crate::error::{ScanError, TaskError};
use crate::finder::ClassFinder;
use crate::io::{read_json_object, remove, write_if_changed, write_json};
use crate::manifest::{CssImport, DependencyManifest};
use crate::scanner::{JS_MODULE, ScanStrategy, scan};
use crate::task::package_json::FRONTEND_RESOURCES;
use crate::task::{Command, TaskKind, js_string};

const HEADER: &str = "// Generated by tsumiki. Do not edit, changes are overwritten.";

/// Alias the bundler resolves to the frontend directory.
const FRONTEND_ALIAS: &str = "Frontend/";

const CSS_HELPER: &str = "\
const addCssBlock = function(block, before = false) {
  const tpl = document.createElement('template');
  tpl.innerHTML = block;
  document.head[before ? 'insertBefore' : 'appendChild'](tpl.content, document.head.firstChild);
};";

/// Rewrites the imports file that pulls every discovered frontend dependency
/// into the bundle.
pub(crate) struct UpdateImports {
    finder: Rc<dyn ClassFinder>,
    config: Rc<Config>,
    manifest: Rc<DependencyManifest>,
    /// Also run a full scan and put whatever the primary scan missed into a
    /// lazily loaded chunk.
    fallback: bool,
}

impl UpdateImports {
    pub fn new(
        finder: Rc<dyn ClassFinder>,
        config: Rc<Config>,
        manifest: Rc<DependencyManifest>,
        fallback: bool,
    ) -> Self {
        Self {
            finder,
            config,
            manifest,
            fallback,
        }
    }

    /// Translates an annotation value into an import specifier the bundler
    /// understands.
    fn resolve(&self, module: &str) -> String {
        let module = match module.strip_prefix("frontend://") {
            Some(rest) => format!("./{rest}"),
            None => module.to_string(),
        };

        let Some(local) = module.strip_prefix("./") else {
            return module;
        };

        if self.config.frontend_directory.join(local).exists() {
            return format!("{FRONTEND_ALIAS}{local}");
        }

        if let Some(resources) = &self.config.resources_folder {
            if resources.join(local).exists() {
                return format!("{FRONTEND_RESOURCES}/{local}");
            }
        }

        warn!(
            "Couldn't find {module} in {} or in the frontend resources",
            self.config.frontend_directory
        );
        format!("{FRONTEND_ALIAS}{local}")
    }

    /// Modules declared on the theme class, imported ahead of everything else.
    fn theme_modules(&self, manifest: &DependencyManifest) -> Result<Vec<String>, TaskError> {
        let Some(theme) = &manifest.theme else {
            return Ok(Vec::new());
        };

        let annotations = self
            .finder
            .annotations(&theme.class)
            .map_err(|e| ScanError::Finder(theme.class.clone(), e))?;

        Ok(annotations
            .iter()
            .filter(|annotation| annotation.name == JS_MODULE)
            .filter_map(|annotation| annotation.value())
            .map(str::to_string)
            .collect())
    }

    fn render(&self, manifest: &DependencyManifest, theme_modules: &[String]) -> Vec<String> {
        let mut lines = vec![HEADER.to_string()];
        let mut seen = Vec::new();

        let modules = theme_modules
            .iter()
            .chain(&manifest.modules)
            .chain(&manifest.scripts);

        for module in modules {
            let specifier = self.resolve(module);
            if !seen.contains(&specifier) {
                lines.push(format!("import {};", js_string(&specifier)));
                seen.push(specifier);
            }
        }

        if !manifest.css.is_empty() {
            lines.push(CSS_HELPER.to_string());
            for (i, css) in manifest.css.iter().enumerate() {
                let var = format!("$css_{i}");
                lines.push(format!(
                    "import {var} from {};",
                    js_string(&self.resolve(&css.value))
                ));
                lines.push(format!("addCssBlock(`{}`);", css_block(css, &var, i)));
            }
        }

        if let Some(theme) = &manifest.theme {
            if !theme.variant.is_empty() {
                lines.push(format!(
                    "document.documentElement.setAttribute('theme', {});",
                    js_string(&theme.variant)
                ));
            }
        }

        lines
    }

    fn write_fallback(&self, lines: &mut Vec<String>) -> Result<(), TaskError> {
        let path = self.config.generated_folder.join(FALLBACK_IMPORTS_NAME);

        if !self.fallback {
            if remove(&path)? {
                info!("Removed stale {path}");
            }
            return Ok(());
        }

        let full = scan(
            ScanStrategy::Full,
            self.finder.as_ref(),
            self.config.generate_embeddable_web_components,
        )?;
        let rest = full.difference(&self.manifest);

        write_if_changed(&path, join(self.render(&rest, &[])))?;
        lines.push(format!(
            "export const loadFallback = () => import('./{FALLBACK_IMPORTS_NAME}');"
        ));

        if let Some(data) = &self.config.token_file_data {
            data.borrow_mut()
                .insert("chunks".into(), json!({ "fallback": chunk(&rest) }));
        }

        Ok(())
    }

    /// Merges the token data into the token file, keeping unrelated keys.
    fn write_token_file(&self) -> Result<(), TaskError> {
        let (Some(path), Some(data)) = (&self.config.token_file, &self.config.token_file_data)
        else {
            return Ok(());
        };

        let mut tokens = read_json_object(path)?.unwrap_or_default();
        for (key, value) in data.borrow().iter() {
            tokens.insert(key.clone(), value.clone());
        }

        if write_json(path, &tokens)? {
            info!("Updated token file {path}");
        }
        Ok(())
    }
}

impl Command for UpdateImports {
    fn kind(&self) -> TaskKind {
        TaskKind::UpdateImports
    }

    fn execute(&self) -> Result<(), TaskError> {
        let theme_modules = self.theme_modules(&self.manifest)?;
        let mut lines = self.render(&self.manifest, &theme_modules);

        self.write_fallback(&mut lines)?;

        let path = self.config.imports_file();
        if write_if_changed(&path, join(lines))? {
            info!("Updated {path}");
        }

        self.write_token_file()
    }
}

fn join(lines: Vec<String>) -> String {
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn css_block(css: &CssImport, var: &str, index: usize) -> String {
    let include = css
        .include
        .as_deref()
        .map(|include| format!(" include=\"{}\"", attribute(include)))
        .unwrap_or_default();
    let style = format!("<style{include}>${{{var}}}</style>");

    match (&css.theme_for, &css.id) {
        (Some(theme_for), id) => {
            let id = id.clone().unwrap_or_else(|| format!("tsumiki-css-{index}"));
            format!(
                "<dom-module id=\"{}\" theme-for=\"{}\"><template>{style}</template></dom-module>",
                attribute(&id),
                attribute(theme_for)
            )
        }
        (None, Some(id)) => {
            format!(
                "<dom-module id=\"{}\"><template>{style}</template></dom-module>",
                attribute(id)
            )
        }
        (None, None) => format!("<custom-style>{style}</custom-style>"),
    }
}

/// Escapes an attribute value written into the `addCssBlock` template literal.
fn attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());

    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '\\' | '`' | '$' => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }

    out
}

/// Token file description of the fallback chunk.
fn chunk(rest: &DependencyManifest) -> Value {
    let css: Vec<Value> = rest
        .css
        .iter()
        .map(|css| {
            let mut entry = serde_json::Map::new();
            entry.insert("value".into(), Value::String(css.value.clone()));
            for (key, value) in [
                ("id", &css.id),
                ("include", &css.include),
                ("themeFor", &css.theme_for),
            ] {
                if let Some(value) = value {
                    entry.insert(key.into(), Value::String(value.clone()));
                }
            }
            Value::Object(entry)
        })
        .collect();

    let modules: Vec<&String> = rest.modules.iter().chain(&rest.scripts).collect();
    json!({ "jsModules": modules, "cssImports": css })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::fs;

    use camino::{Utf8Path, Utf8PathBuf};

    use super::*;
    use crate::config::Options;
    use crate::finder::Annotation;
    use crate::manifest::ThemeDefinition;
    use crate::scanner::{CSS_IMPORT, ROUTE};
    use crate::testing::{FakeFinder, scratch};

    fn config(root: &Utf8Path, token: bool) -> Rc<Config> {
        let options = Options {
            resources_folder: Some("target/resources".into()),
            token_file: token.then(|| root.join("token.json")),
            token_file_data: token.then(|| Rc::new(RefCell::new(serde_json::Map::new()))),
            ..Options::new(root)
        };
        Rc::new(Config::resolve(options).unwrap())
    }

    fn touch(path: Utf8PathBuf) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_modules_resolve_to_frontend_or_resources() {
        let (_dir, root) = scratch();
        touch(root.join("frontend/views/main.js"));
        touch(root.join("target/resources/button.js"));

        let mut manifest = DependencyManifest::default();
        manifest.add_module("@acme/router");
        manifest.add_module("./views/main.js");
        manifest.add_module("frontend://button.js");
        manifest.add_module("./missing.js");

        let task = UpdateImports::new(
            Rc::new(FakeFinder::default()),
            config(&root, false),
            Rc::new(manifest),
            false,
        );
        task.execute().unwrap();

        let text = fs::read_to_string(root.join("target/frontend/generated-imports.js")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            &lines[1..],
            [
                "import \"@acme/router\";",
                "import \"Frontend/views/main.js\";",
                "import \"@tsumiki/frontend-resources/button.js\";",
                "import \"Frontend/missing.js\";",
            ]
        );
    }

    #[test]
    fn test_css_and_theme_variant() {
        let (_dir, root) = scratch();
        touch(root.join("frontend/styles/grid.css"));

        let finder = FakeFinder::default().class(
            "themes.Aurora",
            [Annotation::value_of(JS_MODULE, "@acme/aurora-styles/all-imports.js")],
        );

        let mut manifest = DependencyManifest::default();
        manifest.add_css(CssImport {
            theme_for: Some("x-grid".into()),
            include: Some("aurora-badge".into()),
            ..CssImport::new("./styles/grid.css")
        });
        manifest.add_css(CssImport::new("./styles/grid.css"));
        manifest.theme = Some(ThemeDefinition {
            class: "themes.Aurora".into(),
            variant: "dark".into(),
        });

        UpdateImports::new(Rc::new(finder), config(&root, false), Rc::new(manifest), false)
            .execute()
            .unwrap();

        let text = fs::read_to_string(root.join("target/frontend/generated-imports.js")).unwrap();
        assert!(text.starts_with(&format!(
            "{HEADER}\nimport \"@acme/aurora-styles/all-imports.js\";"
        )));
        assert!(text.contains("import $css_0 from \"Frontend/styles/grid.css\";"));
        assert!(text.contains(
            "addCssBlock(`<dom-module id=\"tsumiki-css-0\" theme-for=\"x-grid\"><template><style include=\"aurora-badge\">${$css_0}</style></template></dom-module>`);"
        ));
        assert!(text.contains("addCssBlock(`<custom-style><style>${$css_1}</style></custom-style>`);"));
        assert!(text.ends_with("document.documentElement.setAttribute('theme', \"dark\");\n"));
    }

    #[test]
    fn test_quotes_in_annotation_values_are_escaped() {
        let (_dir, root) = scratch();

        let mut manifest = DependencyManifest::default();
        manifest.add_module("@acme/it's.js");
        manifest.add_css(CssImport {
            id: Some("a\"b`${x}".into()),
            ..CssImport::new("@acme/quote'd.css")
        });
        manifest.theme = Some(ThemeDefinition {
            class: "themes.Aurora".into(),
            variant: "dark' onload='x".into(),
        });

        UpdateImports::new(
            Rc::new(FakeFinder::default()),
            config(&root, false),
            Rc::new(manifest),
            false,
        )
        .execute()
        .unwrap();

        let text = fs::read_to_string(root.join("target/frontend/generated-imports.js")).unwrap();
        assert!(text.contains("import \"@acme/it's.js\";"));
        assert!(text.contains("import $css_0 from \"@acme/quote'd.css\";"));
        assert!(text.contains("<dom-module id=\"a&quot;b\\`\\${x}\">"));
        assert!(text.contains("setAttribute('theme', \"dark' onload='x\");"));
    }

    #[test]
    fn test_fallback_chunk_and_token_file() {
        let (_dir, root) = scratch();
        fs::write(root.join("token.json"), r#"{ "productionMode": true }"#).unwrap();

        let finder = FakeFinder::default()
            .class(
                "app.Main",
                [
                    Annotation::value_of(ROUTE, ""),
                    Annotation::value_of(JS_MODULE, "@acme/elements"),
                ],
            )
            .class("app.Lazy", [Annotation::value_of(CSS_IMPORT, "lazy/styles.css")])
            .class("app.Other", [Annotation::value_of(JS_MODULE, "@acme/grid")]);
        let finder: Rc<dyn ClassFinder> = Rc::new(finder);

        let primary = scan(ScanStrategy::ByteCode, finder.as_ref(), false).unwrap();
        let config = config(&root, true);
        UpdateImports::new(finder, config.clone(), Rc::new(primary), true)
            .execute()
            .unwrap();

        let main = fs::read_to_string(root.join("target/frontend/generated-imports.js")).unwrap();
        assert!(main.contains("import \"@acme/elements\";"));
        assert!(!main.contains("@acme/grid"));
        assert!(main.ends_with(
            "export const loadFallback = () => import('./generated-imports-fallback.js');\n"
        ));

        let fallback =
            fs::read_to_string(root.join("target/frontend/generated-imports-fallback.js")).unwrap();
        assert!(fallback.contains("import \"@acme/grid\";"));
        assert!(fallback.contains("import $css_0 from \"lazy/styles.css\";"));

        let data = config.token_file_data.as_ref().unwrap().borrow();
        assert_eq!(data["chunks"]["fallback"]["jsModules"], json!(["@acme/grid"]));
        assert_eq!(data["chunks"]["fallback"]["cssImports"][0]["value"], "lazy/styles.css");

        let token = read_json_object(&root.join("token.json")).unwrap().unwrap();
        assert_eq!(token["productionMode"], true);
        assert_eq!(token["chunks"], data["chunks"]);
    }

    #[test]
    fn test_stale_fallback_is_removed() {
        let (_dir, root) = scratch();
        touch(root.join("target/frontend/generated-imports-fallback.js"));

        UpdateImports::new(
            Rc::new(FakeFinder::default()),
            config(&root, false),
            Rc::new(DependencyManifest::default()),
            false,
        )
        .execute()
        .unwrap();

        assert!(!root.join("target/frontend/generated-imports-fallback.js").exists());
        assert!(root.join("target/frontend/generated-imports.js").exists());
    }
}
