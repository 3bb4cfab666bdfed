use std::collections::BTreeSet;
use std::fs;
use std::rc::Rc;

use camino::Utf8PathBuf;
use indicatif::HumanCount;
use serde_json::{Map, Value};
use tracing::info;

use crate::config::Config;
use crate::error::TaskError;
use crate::finder::ClassFinder;
use crate::io::{read, read_json_object, relativize, remove, write_if_changed};
use crate::task::openapi::prefix_of;
use crate::task::{Command, TaskKind, js_string, render_into};

const DEFAULT_CLIENT: &str = "connect-client.default.ts";
const CUSTOM_CLIENT: &str = "connect-client.ts";
const MARKER: &str = "// @generated by tsumiki";

/// Turns the OpenAPI document into TypeScript modules calling the endpoints.
pub(crate) struct GenerateConnect {
    finder: Rc<dyn ClassFinder>,
    config: Rc<Config>,
    openapi: Utf8PathBuf,
    output: Utf8PathBuf,
}

impl GenerateConnect {
    pub fn new(
        finder: Rc<dyn ClassFinder>,
        config: Rc<Config>,
        openapi: Utf8PathBuf,
        output: Utf8PathBuf,
    ) -> Self {
        Self {
            finder,
            config,
            openapi,
            output,
        }
    }

    /// Import specifier of the client every endpoint module talks through.
    fn client_import(&self) -> String {
        let custom = self.config.frontend_directory.join(CUSTOM_CLIENT);
        if !custom.exists() {
            return format!("./{}", DEFAULT_CLIENT.trim_end_matches(".ts"));
        }

        let path = relativize(&self.output, &custom.with_extension(""));
        if path.starts_with("../") {
            path
        } else {
            format!("./{path}")
        }
    }

    /// Removes endpoint modules generated earlier for endpoints that are gone.
    fn prune(&self, written: &BTreeSet<String>) -> Result<(), TaskError> {
        let Ok(entries) = fs::read_dir(&self.output) else {
            return Ok(());
        };

        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(".ts") || name == DEFAULT_CLIENT || written.contains(&name) {
                continue;
            }

            let path = self.output.join(&name);
            if read(&path)?.starts_with(MARKER) {
                info!("Removing stale endpoint module {path}");
                remove(&path)?;
            }
        }

        Ok(())
    }
}

impl Command for GenerateConnect {
    fn kind(&self) -> TaskKind {
        TaskKind::GenerateConnect
    }

    fn execute(&self) -> Result<(), TaskError> {
        let document = read_json_object(&self.openapi)?.ok_or_else(|| {
            TaskError::Read(self.openapi.clone(), std::io::ErrorKind::NotFound.into())
        })?;

        render_into(
            self.finder.as_ref(),
            DEFAULT_CLIENT,
            &self.output.join(DEFAULT_CLIENT),
            &[("{{PREFIX}}", prefix_of(&document).to_string())],
        )?;

        let client = self.client_import();
        let mut written = BTreeSet::new();

        for (endpoint, methods) in endpoints(&document) {
            let file = format!("{endpoint}.ts");
            write_if_changed(&self.output.join(&file), module(&endpoint, &methods, &client))?;
            written.insert(file);
        }

        self.prune(&written)?;
        info!(
            "Generated {} endpoint module(s) in {}",
            HumanCount(written.len() as u64),
            self.output
        );
        Ok(())
    }
}

struct Operation {
    name: String,
    params: Vec<(String, String)>,
    returns: String,
}

/// Operations grouped by endpoint, in document order.
fn endpoints(document: &Map<String, Value>) -> Vec<(String, Vec<Operation>)> {
    let mut grouped: Vec<(String, Vec<Operation>)> = Vec::new();
    let Some(paths) = document.get("paths").and_then(Value::as_object) else {
        return grouped;
    };

    for (path, item) in paths {
        let mut segments = path.trim_start_matches('/').splitn(2, '/');
        let (Some(endpoint), Some(method)) = (segments.next(), segments.next()) else {
            continue;
        };
        let post = &item["post"];

        let params = post
            .pointer("/requestBody/content/application~1json/schema/properties")
            .and_then(Value::as_object)
            .map(|properties| {
                properties
                    .iter()
                    .map(|(name, schema)| (name.clone(), ts_type(schema)))
                    .collect()
            })
            .unwrap_or_default();

        let returns = post
            .pointer("/responses/200/content/application~1json/schema")
            .map_or_else(|| "void".to_string(), ts_type);

        let operation = Operation {
            name: method.to_string(),
            params,
            returns,
        };

        match grouped.iter_mut().find(|(name, _)| name == endpoint) {
            Some((_, operations)) => operations.push(operation),
            None => grouped.push((endpoint.to_string(), vec![operation])),
        }
    }

    grouped
}

fn ts_type(schema: &Value) -> String {
    let base = match schema.get("type").and_then(Value::as_str) {
        Some("string") => "string".to_string(),
        Some("integer" | "number") => "number".to_string(),
        Some("boolean") => "boolean".to_string(),
        Some("array") => format!("Array<{}>", ts_type(&schema["items"])),
        Some("object") => match schema.get("additionalProperties") {
            Some(values) => format!("Record<string, {}>", ts_type(values)),
            None => "any".to_string(),
        },
        _ => "any".to_string(),
    };

    if schema.get("nullable").and_then(Value::as_bool) == Some(true) {
        format!("{base} | undefined")
    } else {
        base
    }
}

fn module(endpoint: &str, operations: &[Operation], client: &str) -> String {
    let mut out = format!(
        "{MARKER} from the {endpoint} endpoint. Do not edit.\nimport client from {};\n",
        js_string(client)
    );
    let endpoint = js_string(endpoint);

    for operation in operations {
        let signature: Vec<String> = operation
            .params
            .iter()
            .map(|(name, ty)| format!("{name}: {ty}"))
            .collect();
        let call = if operation.params.is_empty() {
            format!("client.call({endpoint}, {})", js_string(&operation.name))
        } else {
            let names: Vec<&str> = operation
                .params
                .iter()
                .map(|(name, _)| name.as_str())
                .collect();
            format!(
                "client.call({endpoint}, {}, {{ {} }})",
                js_string(&operation.name),
                names.join(", ")
            )
        };

        out.push_str(&format!(
            "\nexport function {}({}): Promise<{}> {{\n  return {call};\n}}\n",
            operation.name,
            signature.join(", "),
            operation.returns
        ));
    }

    out
}
