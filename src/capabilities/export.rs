//! Schema export: `{ "tools": [...], "resources": [...] }`.

use serde_json::{json, Value};

use super::catalog::Catalog;

/// Render the whole catalog in its exported JSON form, sorted by name.
pub fn export_schema(catalog: &Catalog) -> Value {
    let snapshot = catalog.all();
    json!({
        "tools": snapshot.tools.iter().map(|t| t.to_json()).collect::<Vec<_>>(),
        "resources": snapshot.resources.iter().map(|r| r.to_json()).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::handler::{
        FormalParameter, FormalType, HandlerDecl, ResourceMeta, ReturnShape, ToolMeta,
    };

    #[test]
    fn test_export_shape() {
        let catalog = Catalog::new();
        catalog.register_handler(
            &HandlerDecl::new("ExecuteCode", |_| Ok(json!(null)))
                .tool(
                    ToolMeta::new()
                        .with_description("Execute C# code in the editor")
                        .with_example("editor_execute_code(code=\"Debug.Log(1)\")"),
                )
                .param(FormalParameter::new("code", FormalType::Str).described("Code to run"))
                .returns(ReturnShape::Primitive(FormalType::Str)),
            Some("editor"),
        );
        catalog.register_handler(
            &HandlerDecl::new("GetLogs", |_| Ok(json!([])))
                .resource(ResourceMeta::new("unity://logs/{max_logs}").with_description("Editor logs"))
                .param(FormalParameter::new("max_logs", FormalType::Int).with_default(100)),
            None,
        );

        let schema = export_schema(&catalog);
        let tool = &schema["tools"][0];
        assert_eq!(tool["name"], "editor_execute_code");
        assert_eq!(tool["inputSchema"]["type"], "object");
        assert_eq!(tool["inputSchema"]["properties"]["code"]["type"], "string");
        assert_eq!(tool["inputSchema"]["required"], json!(["code"]));
        assert!(tool.get("outputSchema").is_none());

        let resource = &schema["resources"][0];
        assert_eq!(resource["name"], "get_logs");
        assert_eq!(resource["uri"], "unity://logs/{max_logs}");
        assert_eq!(resource["mimeType"], "application/json");
        assert_eq!(resource["parameters"]["max_logs"]["type"], "number");
        assert_eq!(resource["parameters"]["max_logs"]["required"], false);
        assert!(resource.get("urlPattern").is_none());
    }

    #[test]
    fn test_empty_catalog_exports_empty_lists() {
        let schema = export_schema(&Catalog::new());
        assert_eq!(schema, json!({"tools": [], "resources": []}));
    }
}
