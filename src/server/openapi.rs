//! OpenAPI 3 description of the HTTP surface, rendered from the route table.

use serde_json::{json, Map, Value};

/// Request payload carried by a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    None,
    Json,
    Multipart,
}

#[derive(Debug, Clone, Copy)]
pub struct RouteDoc {
    pub method: &'static str,
    pub path: &'static str,
    pub summary: &'static str,
    pub protected: bool,
    pub payload: Payload,
    pub query: &'static [&'static str],
}

const fn route(
    method: &'static str,
    path: &'static str,
    summary: &'static str,
    protected: bool,
    payload: Payload,
) -> RouteDoc {
    RouteDoc {
        method,
        path,
        summary,
        protected,
        payload,
        query: &[],
    }
}

pub static ROUTES: &[RouteDoc] = &[
    route("get", "/", "Liveness probe", false, Payload::None),
    route("post", "/sheet/write_row", "Append `item` to `sheet_name`, extending the header with new fields", true, Payload::Json),
    route("post", "/sheet/write_passthrough", "Append every field except `sheet_name` as one row", true, Payload::Json),
    route("post", "/sheet/write_passthrough_log", "Append the whole payload to the sandbox sheet", true, Payload::Json),
    route("post", "/log", "Append an event to the log sheet", true, Payload::Json),
    route("post", "/integration/log", "Append an event to the integration log sheet", true, Payload::Json),
    route("post", "/updateSheetHeaders", "Replace the header row, keeping data rows", true, Payload::Json),
    route("post", "/sheet/set_headers", "Clear the sheet and write a new header row", true, Payload::Json),
    route("post", "/sheet/update_structure", "Drop `remove_columns` from the header and every row", true, Payload::Json),
    route("post", "/sheet/create", "Create a sheet, optionally with a header row", true, Payload::Json),
    route("post", "/sheet/delete", "Delete a sheet", true, Payload::Json),
    route("post", "/sheet/rename", "Rename a sheet", true, Payload::Json),
    route("post", "/sheet/get_headers", "Header row of a sheet", false, Payload::Json),
    route("post", "/sheet/get_all", "Every row of a sheet, header included", false, Payload::Json),
    route("get", "/sheet/list_all", "Names of every sheet", false, Payload::None),
    route("get", "/inventory/{sheet_name}", "Data rows as records keyed by header", false, Payload::None),
    route("get", "/inventory/structured/{sheet_name}", "Header and data rows, split", false, Payload::None),
    RouteDoc {
        query: &["range"],
        ..route("get", "/inventory/raw/{sheet_name}", "Cell values inside an A1 range", false, Payload::None)
    },
    RouteDoc {
        query: &["key_column"],
        ..route("get", "/inventory/item/{sheet_name}/{item_name}", "First record matching a value, ignoring case", false, Payload::None)
    },
    route("post", "/upload/file", "Upload a file into a folder chosen from its name", true, Payload::Multipart),
    RouteDoc {
        query: &["folder_id"],
        ..route("get", "/health/drive", "List a few files in a folder to check file store access", false, Payload::None)
    },
    route("get", "/openapi.yaml", "This document", false, Payload::None),
];

fn path_params(path: &str) -> impl Iterator<Item = &str> {
    path.split('/')
        .filter_map(|seg| seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
}

fn operation(doc: &RouteDoc) -> Value {
    let mut parameters: Vec<Value> = path_params(doc.path)
        .map(|name| json!({"name": name, "in": "path", "required": true, "schema": {"type": "string"}}))
        .collect();
    parameters.extend(
        doc.query
            .iter()
            .map(|name| json!({"name": name, "in": "query", "required": false, "schema": {"type": "string"}})),
    );

    let mut op = Map::new();
    op.insert("summary".into(), json!(doc.summary));
    if !parameters.is_empty() {
        op.insert("parameters".into(), Value::Array(parameters));
    }
    match doc.payload {
        Payload::None => {}
        Payload::Json => {
            op.insert(
                "requestBody".into(),
                json!({"required": true, "content": {"application/json": {"schema": {"type": "object"}}}}),
            );
        }
        Payload::Multipart => {
            op.insert(
                "requestBody".into(),
                json!({
                    "required": true,
                    "content": {"multipart/form-data": {"schema": {
                        "type": "object",
                        "required": ["file"],
                        "properties": {
                            "file": {"type": "string", "format": "binary"},
                            "folder_id": {"type": "string"}
                        }
                    }}}
                }),
            );
        }
    }
    if doc.protected {
        op.insert("security".into(), json!([{"queryKey": []}, {"bearerKey": []}]));
    }
    op.insert(
        "responses".into(),
        json!({
            "200": {"description": "Success"},
            "default": {
                "description": "Error",
                "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Error"}}}
            }
        }),
    );
    Value::Object(op)
}

/// The full document as a JSON value.
pub fn document() -> Value {
    let mut paths = Map::new();
    for doc in ROUTES {
        let entry = paths
            .entry(doc.path.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(methods) = entry {
            methods.insert(doc.method.to_string(), operation(doc));
        }
    }

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "sheetbridge",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "JSON gateway over spreadsheet tables and a file store"
        },
        "paths": paths,
        "components": {
            "securitySchemes": {
                "queryKey": {"type": "apiKey", "in": "query", "name": "key"},
                "bearerKey": {"type": "http", "scheme": "bearer"}
            },
            "schemas": {
                "Error": {
                    "type": "object",
                    "properties": {"error": {"type": "string"}}
                }
            }
        }
    })
}

pub fn render() -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(&document())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented_once() {
        let doc = document();
        let paths = doc["paths"].as_object().unwrap();
        let operations: usize = paths.values().map(|m| m.as_object().unwrap().len()).sum();
        assert_eq!(operations, ROUTES.len());
        assert!(paths.contains_key("/inventory/item/{sheet_name}/{item_name}"));
    }

    #[test]
    fn parameters_and_security() {
        let doc = document();
        let item = &doc["paths"]["/inventory/item/{sheet_name}/{item_name}"]["get"];
        let names: Vec<&str> = item["parameters"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["sheet_name", "item_name", "key_column"]);
        assert!(item.get("security").is_none());

        let write = &doc["paths"]["/sheet/write_row"]["post"];
        assert!(write["security"].is_array());
        assert!(write["requestBody"]["content"]["application/json"].is_object());
    }

    #[test]
    fn renders_yaml() {
        let yaml = render().unwrap();
        assert!(yaml.starts_with("openapi:"));
        assert!(yaml.contains("/upload/file"));
        let back: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert!(back["paths"]["/sheet/list_all"]["get"].is_mapping());
    }
}
