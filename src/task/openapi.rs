//! OpenAPI description of the `@Endpoint` classes found in Java sources.
//!
//! This is a lightweight reading of the sources, not a Java parser: it finds
//! endpoint classes, their public instance methods and the declared parameter
//! and return types. Anything it doesn't recognize becomes an opaque object
//! schema.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use camino::Utf8PathBuf;
use regex::Regex;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::error::TaskError;
use crate::io::{read, write_json};
use crate::task::{Command, TaskKind};

pub(crate) const DEFAULT_PREFIX: &str = "/connect";
const PREFIX_PROPERTY: &str = "endpoint.prefix";

static ENDPOINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"@Endpoint(?:\s*\(\s*(?:value\s*=\s*)?"([^"]*)"\s*\))?\s*(?:@\w+(?:\([^)]*\))?\s*)*(?:public\s+)?(?:final\s+)?class\s+(\w+)"#,
    )
    .expect("valid regex")
});

static METHOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"public\s+(static\s+)?(?:final\s+)?(?:<[^>]+>\s+)?([\w.]+(?:<[^()]*?>)?(?:\[\])*)\s+(\w+)\s*\(([^)]*)\)",
    )
    .expect("valid regex")
});

static PARAM_ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@\w+(?:\([^)]*\))?").expect("valid regex"));

#[derive(Debug, PartialEq)]
struct Method {
    name: String,
    returns: String,
    params: Vec<(String, String)>,
}

#[derive(Debug, PartialEq)]
struct Endpoint {
    name: String,
    methods: Vec<Method>,
}

/// Scans the endpoint sources and writes the OpenAPI document.
pub(crate) struct GenerateOpenApi {
    sources: Utf8PathBuf,
    properties: Option<Utf8PathBuf>,
    output: Utf8PathBuf,
}

impl GenerateOpenApi {
    pub fn new(sources: Utf8PathBuf, properties: Option<Utf8PathBuf>, output: Utf8PathBuf) -> Self {
        Self {
            sources,
            properties,
            output,
        }
    }

    fn prefix(&self) -> Result<String, TaskError> {
        let Some(path) = self.properties.as_deref().filter(|path| path.is_file()) else {
            return Ok(DEFAULT_PREFIX.into());
        };

        Ok(property(&read(path)?, PREFIX_PROPERTY).unwrap_or_else(|| DEFAULT_PREFIX.into()))
    }

    fn endpoints(&self) -> Result<Vec<Endpoint>, TaskError> {
        let pattern = format!("{}/**/*.java", glob::Pattern::escape(self.sources.as_str()));
        let mut endpoints = Vec::new();

        for path in glob::glob(&pattern)? {
            let path = Utf8PathBuf::try_from(path?)?;
            let found = parse(&read(&path)?);
            if !found.is_empty() {
                debug!("Found {} endpoint(s) in {path}", found.len());
            }
            endpoints.extend(found);
        }

        Ok(endpoints)
    }
}

impl Command for GenerateOpenApi {
    fn kind(&self) -> TaskKind {
        TaskKind::GenerateOpenApi
    }

    fn execute(&self) -> Result<(), TaskError> {
        let endpoints = self.endpoints()?;
        let document = document(&endpoints, &self.prefix()?);

        if write_json(&self.output, &document)? {
            info!(
                "Wrote OpenAPI description of {} endpoint(s) to {}",
                endpoints.len(),
                self.output
            );
        }
        Ok(())
    }
}

/// Value of `key` in a `.properties` file.
fn property(text: &str, key: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .find_map(|line| {
            let split = line.find(['=', ':'])?;
            let (name, value) = (line[..split].trim(), line[split + 1..].trim());
            (name == key).then(|| value.to_string())
        })
}

fn parse(source: &str) -> Vec<Endpoint> {
    let source = strip_comments(source);
    let mut endpoints = Vec::new();

    for class in ENDPOINT.captures_iter(&source) {
        let (Some(whole), Some(class_name)) = (class.get(0), class.get(2)) else {
            continue;
        };
        let Some(open) = source[whole.end()..].find('{') else {
            continue;
        };
        let body = members(&source, whole.end() + open);

        let name = class
            .get(1)
            .map(|m| m.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(class_name.as_str());

        let methods = METHOD
            .captures_iter(&body)
            .filter(|method| method.get(1).is_none())
            .map(|method| Method {
                returns: method[2].to_string(),
                name: method[3].to_string(),
                params: params(&method[4]),
            })
            .collect();

        endpoints.push(Endpoint {
            name: name.to_string(),
            methods,
        });
    }

    endpoints
}

/// Byte offset just past the string or char literal opening at `start`.
fn literal_end(source: &str, start: usize) -> usize {
    let rest = &source[start..];
    if rest.starts_with("\"\"\"") {
        return rest[3..]
            .find("\"\"\"")
            .map_or(source.len(), |end| start + 3 + end + 3);
    }

    let quote = rest.chars().next().unwrap_or('"');
    let mut escaped = false;

    for (offset, c) in rest.char_indices().skip(1) {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            // unterminated literal
            '\n' => return start + offset + 1,
            c if c == quote => return start + offset + 1,
            _ => {}
        }
    }

    source.len()
}

/// Drops line and block comments, leaving string and char literals intact.
fn strip_comments(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len());
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        match (bytes[i], bytes.get(i + 1).copied()) {
            (b'"' | b'\'', _) => i = literal_end(source, i),
            (b'/', Some(b'/')) => {
                out.push_str(&source[copied..i]);
                i = source[i..].find('\n').map_or(bytes.len(), |end| i + end);
                copied = i;
            }
            (b'/', Some(b'*')) => {
                out.push_str(&source[copied..i]);
                out.push(' ');
                i = source[i + 2..]
                    .find("*/")
                    .map_or(bytes.len(), |end| i + 2 + end + 2);
                copied = i;
            }
            _ => i += 1,
        }
    }

    out.push_str(&source[copied..]);
    out
}

/// Member declarations of the class body whose `{` sits at `open`. Nested
/// blocks collapse to `{}` and literals to `""`, so only the class's own
/// members are left.
fn members(source: &str, open: usize) -> String {
    let mut out = String::new();
    let mut depth = 0usize;
    let mut i = open;

    while let Some(c) = source[i..].chars().next() {
        match c {
            '"' | '\'' => {
                if depth == 1 {
                    out.push_str("\"\"");
                }
                i = literal_end(source, i);
                continue;
            }
            '{' => {
                depth += 1;
                if depth == 2 {
                    out.push('{');
                }
            }
            '}' => {
                depth = depth.saturating_sub(1);
                match depth {
                    0 => break,
                    1 => out.push('}'),
                    _ => {}
                }
            }
            c if depth == 1 => out.push(c),
            _ => {}
        }
        i += c.len_utf8();
    }

    out
}

fn params(list: &str) -> Vec<(String, String)> {
    split_top_level(list)
        .into_iter()
        .filter_map(|param| {
            let param = PARAM_ANNOTATION.replace_all(param, "");
            let param = param.trim().trim_start_matches("final ").trim();
            let split = param.rfind(char::is_whitespace)?;
            let (ty, name) = (param[..split].trim(), param[split..].trim());
            Some((name.to_string(), ty.replace("...", "[]")))
        })
        .collect()
}

/// Splits on commas outside of generic brackets.
fn split_top_level(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in list.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&list[start..]);

    parts.into_iter().filter(|part| !part.trim().is_empty()).collect()
}

fn document(endpoints: &[Endpoint], prefix: &str) -> Value {
    let mut paths = Map::new();
    let mut referenced = BTreeSet::new();

    for endpoint in endpoints {
        for method in &endpoint.methods {
            let mut operation = Map::new();
            operation.insert("tags".into(), json!([endpoint.name]));
            operation.insert(
                "operationId".into(),
                json!(format!("{}_{}_POST", endpoint.name, method.name)),
            );

            if !method.params.is_empty() {
                let properties: Map<String, Value> = method
                    .params
                    .iter()
                    .map(|(name, ty)| (name.clone(), schema(ty, &mut referenced)))
                    .collect();
                operation.insert(
                    "requestBody".into(),
                    json!({
                        "content": {
                            "application/json": {
                                "schema": { "type": "object", "properties": properties }
                            }
                        }
                    }),
                );
            }

            let response = match schema(&method.returns, &mut referenced) {
                Value::Null => json!({ "description": "" }),
                schema => json!({
                    "description": "",
                    "content": { "application/json": { "schema": schema } }
                }),
            };
            operation.insert("responses".into(), json!({ "200": response }));

            paths.insert(
                format!("/{}/{}", endpoint.name, method.name),
                json!({ "post": operation }),
            );
        }
    }

    let tags: Vec<Value> = endpoints
        .iter()
        .map(|endpoint| json!({ "name": endpoint.name }))
        .collect();
    let schemas: Map<String, Value> = referenced
        .into_iter()
        .map(|name| (name, json!({ "type": "object" })))
        .collect();

    json!({
        "openapi": "3.0.1",
        "info": { "title": "Tsumiki application", "version": "0.0.1" },
        "servers": [{ "url": prefix, "description": "Tsumiki backend" }],
        "tags": tags,
        "paths": paths,
        "components": { "schemas": schemas },
    })
}

/// OpenAPI schema of a Java type, `Null` for `void`.
fn schema(ty: &str, referenced: &mut BTreeSet<String>) -> Value {
    let ty = ty.trim();

    if let Some(inner) = ty.strip_suffix("[]") {
        return json!({ "type": "array", "items": schema(inner, referenced) });
    }

    let (base, args) = match ty.split_once('<') {
        Some((base, rest)) => (base, split_top_level(rest.strip_suffix('>').unwrap_or(rest))),
        None => (ty, Vec::new()),
    };
    let base = base.rsplit('.').next().unwrap_or(base);
    let arg = |i: usize, referenced: &mut BTreeSet<String>| {
        args.get(i)
            .map(|arg| schema(arg, referenced))
            .unwrap_or_else(|| json!({}))
    };

    match base {
        "void" | "Void" => Value::Null,
        "String" | "char" | "Character" | "UUID" => json!({ "type": "string" }),
        "LocalDate" => json!({ "type": "string", "format": "date" }),
        "LocalDateTime" | "Instant" | "Date" => json!({ "type": "string", "format": "date-time" }),
        "int" | "Integer" | "short" | "Short" | "byte" | "Byte" => {
            json!({ "type": "integer", "format": "int32" })
        }
        "long" | "Long" | "BigInteger" => json!({ "type": "integer", "format": "int64" }),
        "double" | "Double" | "float" | "Float" | "BigDecimal" => json!({ "type": "number" }),
        "boolean" | "Boolean" => json!({ "type": "boolean" }),
        "List" | "ArrayList" | "LinkedList" | "Set" | "HashSet" | "Collection" | "Iterable" => {
            json!({ "type": "array", "items": arg(0, referenced) })
        }
        "Map" | "HashMap" | "TreeMap" | "LinkedHashMap" => {
            json!({ "type": "object", "additionalProperties": arg(1, referenced) })
        }
        "Optional" => match arg(0, referenced) {
            Value::Object(mut inner) => {
                inner.insert("nullable".into(), Value::Bool(true));
                Value::Object(inner)
            }
            other => other,
        },
        "Object" => json!({ "type": "object" }),
        name => {
            referenced.insert(name.to_string());
            json!({ "$ref": format!("#/components/schemas/{name}") })
        }
    }
}

/// Reads the endpoint prefix out of a generated OpenAPI document.
pub(crate) fn prefix_of(document: &Map<String, Value>) -> &str {
    document
        .get("servers")
        .and_then(|servers| servers.get(0))
        .and_then(|server| server.get("url"))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_PREFIX)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::io::read_json_object;
    use crate::testing::scratch;

    const SOURCE: &str = r#"
package com.example;

import java.util.List;

/** Users of the shop. */
@Endpoint
@AnonymousAllowed
public class UserEndpoint {

    public UserEndpoint(UserService service) {}

    public Optional<User> findUser(long id) { return null; }

    // public String commented(String out) {}

    public List<String> search(@Nonnull String query, Map<String, List<Integer>> filters, int... pages) {
        return List.of();
    }

    public void logout() {}

    private void hidden(String value) {}

    public static String helper(String value) { return value; }
}

@Endpoint("stats")
class StatsEndpoint {
    public double average() { return 0; }
}
"#;

    #[test]
    fn test_parse_endpoints_and_methods() {
        let endpoints = parse(SOURCE);
        assert_eq!(endpoints.len(), 2);

        let users = &endpoints[0];
        assert_eq!(users.name, "UserEndpoint");
        let names: Vec<_> = users.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["findUser", "search", "logout"]);
        assert_eq!(
            users.methods[1].params,
            [
                ("query".to_string(), "String".to_string()),
                ("filters".to_string(), "Map<String, List<Integer>>".to_string()),
                ("pages".to_string(), "int[]".to_string()),
            ]
        );

        assert_eq!(endpoints[1].name, "stats");
        assert_eq!(endpoints[1].methods[0].returns, "double");
    }

    #[test]
    fn test_nested_class_members_are_skipped() {
        let endpoints = parse(
            r#"
@Endpoint
public class ShopEndpoint {
    public List<Item> items() { if (true) { return List.of(); } return null; }

    public static class Item {
        public String getName() { return name; }
        public void setName(String name) {}
    }

    public int count() { return 0; }
}

class Helper {
    public String unrelated() { return ""; }
}
"#,
        );

        assert_eq!(endpoints.len(), 1);
        let names: Vec<_> = endpoints[0].methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["items", "count"]);
    }

    #[test]
    fn test_comment_markers_inside_literals() {
        let endpoints = parse(
            r#"
@Endpoint
public class LinkEndpoint {
    private static final String URL = "http://example.com/*"; public String link() { return URL; }
    private static final char SLASH = '/'; public char slash() { return '}'; }
    private static final String BRACE = "{ \" }"; public String brace() { return BRACE; }
    /* public String hidden() {} */
}
"#,
        );

        let names: Vec<_> = endpoints[0].methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["link", "slash", "brace"]);
    }

    #[test]
    fn test_strip_comments_keeps_literals() {
        assert_eq!(
            strip_comments("a = \"//x\"; // gone\nb = '/'; /* gone */c"),
            "a = \"//x\"; \nb = '/';  c"
        );
    }

    #[test]
    fn test_schemas() {
        let mut referenced = BTreeSet::new();
        assert_eq!(schema("void", &mut referenced), Value::Null);
        assert_eq!(
            schema("Map<String, List<Integer>>", &mut referenced),
            json!({
                "type": "object",
                "additionalProperties": {
                    "type": "array",
                    "items": { "type": "integer", "format": "int32" }
                }
            })
        );
        assert_eq!(
            schema("Optional<User>", &mut referenced),
            json!({ "$ref": "#/components/schemas/User", "nullable": true })
        );
        assert!(referenced.contains("User"));
    }

    #[test]
    fn test_prefix_from_properties() {
        assert_eq!(
            property("# comment\nserver.port=8080\nendpoint.prefix = /api\n", PREFIX_PROPERTY),
            Some("/api".into())
        );
        assert_eq!(property("endpoint.prefixes=/x", PREFIX_PROPERTY), None);
    }

    #[test]
    fn test_writes_document() {
        let (_dir, root) = scratch();
        let sources = root.join("src/main/java/com/example");
        fs::create_dir_all(&sources).unwrap();
        fs::write(sources.join("UserEndpoint.java"), SOURCE).unwrap();
        fs::write(root.join("application.properties"), "endpoint.prefix=/api").unwrap();

        let output = root.join("target/openapi.json");
        GenerateOpenApi::new(
            root.join("src/main/java"),
            Some(root.join("application.properties")),
            output.clone(),
        )
        .execute()
        .unwrap();

        let document = read_json_object(&output).unwrap().unwrap();
        assert_eq!(prefix_of(&document), "/api");
        assert!(document["paths"].get("/UserEndpoint/search").is_some());
        assert!(document["paths"].get("/stats/average").is_some());
        assert_eq!(
            document["paths"]["/UserEndpoint/logout"]["post"]["responses"]["200"],
            json!({ "description": "" })
        );
    }
}
