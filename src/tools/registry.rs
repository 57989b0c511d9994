//! Tool definition registry: built-ins merged with caller-supplied definitions.

use std::collections::HashSet;

use serde_json::{Map, Value};

use super::definition::{builtin_definitions, ToolDefinition};

/// Narrows the resolved tool list for a request. The default keeps everything.
#[derive(Debug, Clone, Default)]
pub struct ToolFilter {
    /// When set, only these names survive.
    pub allow: Option<HashSet<String>>,
    pub deny: HashSet<String>,
    /// Tools only offered when the request carries a scope id.
    pub scope_required: HashSet<String>,
}

impl ToolFilter {
    pub fn allow(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allow = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn deny(mut self, name: impl Into<String>) -> Self {
        self.deny.insert(name.into());
        self
    }

    pub fn require_scope(mut self, name: impl Into<String>) -> Self {
        self.scope_required.insert(name.into());
        self
    }

    pub fn is_identity(&self) -> bool {
        self.allow.is_none() && self.deny.is_empty() && self.scope_required.is_empty()
    }

    pub fn apply(&self, tools: Vec<ToolDefinition>, has_scope: bool) -> Vec<ToolDefinition> {
        if self.is_identity() {
            return tools;
        }
        tools
            .into_iter()
            .filter(|tool| {
                self.allow.as_ref().map_or(true, |allow| allow.contains(&tool.name))
                    && !self.deny.contains(&tool.name)
                    && (has_scope || !self.scope_required.contains(&tool.name))
            })
            .collect()
    }
}

/// Resolves the tool list passed to every model call of one run.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    builtins: Vec<ToolDefinition>,
    filter: ToolFilter,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(builtin_definitions())
    }
}

impl ToolRegistry {
    pub fn new(builtins: Vec<ToolDefinition>) -> Self {
        Self {
            builtins,
            filter: ToolFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: ToolFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Merge custom definitions over the built-ins, then apply the filter.
    ///
    /// A custom entry whose name is already present is merged key by key
    /// (custom keys win); a novel name is appended. Entries without a string
    /// `name`, or that do not form a valid definition, are skipped.
    pub fn resolve(&self, custom: Option<&[Value]>, has_scope: bool) -> Vec<ToolDefinition> {
        let merged = match custom {
            None => self.builtins.clone(),
            Some(custom) => merge_definitions(&self.builtins, custom),
        };
        self.filter.apply(merged, has_scope)
    }
}

fn merge_definitions(base: &[ToolDefinition], custom: &[Value]) -> Vec<ToolDefinition> {
    let mut tools = base.to_vec();
    for entry in custom {
        let Some(fields) = entry.as_object() else {
            tracing::debug!("skipping non-object custom tool definition");
            continue;
        };
        let Some(name) = fields.get("name").and_then(Value::as_str) else {
            tracing::debug!("skipping custom tool definition without a name");
            continue;
        };
        let fields = canonical_keys(fields);
        match tools.iter().position(|tool| tool.name == name) {
            Some(index) => {
                let mut merged = match serde_json::to_value(&tools[index]) {
                    Ok(Value::Object(map)) => map,
                    _ => Map::new(),
                };
                merged.extend(fields);
                match serde_json::from_value::<ToolDefinition>(Value::Object(merged)) {
                    Ok(definition) => tools[index] = definition,
                    Err(err) => tracing::debug!(tool = name, error = %err, "skipping invalid tool override"),
                }
            }
            None => match serde_json::from_value::<ToolDefinition>(Value::Object(fields)) {
                Ok(definition) => tools.push(definition),
                Err(err) => tracing::debug!(tool = name, error = %err, "skipping invalid custom tool"),
            },
        }
    }
    tools
}

fn canonical_keys(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(key, value)| {
            let key = if key == "inputSchema" { "input_schema" } else { key.as_str() };
            (key.to_string(), value.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::definition::{READ_FILE_TOOL, SEARCH_DOCUMENTS_TOOL};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn no_custom_returns_builtins() {
        let registry = ToolRegistry::default();
        assert_eq!(registry.resolve(None, true), builtin_definitions());
    }

    #[test]
    fn override_merges_with_builtin() {
        let registry = ToolRegistry::default();
        let custom = vec![json!({"name": READ_FILE_TOOL, "description": "Read a file"})];
        let tools = registry.resolve(Some(custom.as_slice()), true);
        assert_eq!(tools.len(), 2);
        let read = tools.iter().find(|t| t.name == READ_FILE_TOOL).unwrap();
        assert_eq!(read.description.as_deref(), Some("Read a file"));
        assert_eq!(read.input_schema, builtin_definitions()[0].input_schema);
    }

    #[test]
    fn camel_case_schema_overrides_builtin_schema() {
        let registry = ToolRegistry::default();
        let schema = json!({"type": "object", "properties": {"path": {"type": "string"}}});
        let custom = vec![json!({"name": READ_FILE_TOOL, "inputSchema": schema})];
        let tools = registry.resolve(Some(custom.as_slice()), true);
        assert_eq!(tools[0].input_schema, schema);
        assert!(tools[0].description.is_some());
    }

    #[test]
    fn novel_tools_are_appended_and_nameless_skipped() {
        let registry = ToolRegistry::default();
        let custom = vec![
            json!({"description": "no name", "input_schema": {}}),
            json!({"name": "get_weather", "input_schema": {"type": "object"}}),
            json!("garbage"),
        ];
        let tools = registry.resolve(Some(custom.as_slice()), true);
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec![READ_FILE_TOOL, SEARCH_DOCUMENTS_TOOL, "get_weather"]);
    }

    #[test]
    fn repeated_override_is_idempotent() {
        let registry = ToolRegistry::default();
        let entry = json!({"name": SEARCH_DOCUMENTS_TOOL, "description": "Find passages"});
        let once = registry.resolve(Some(&[entry.clone()][..]), true);
        let twice = registry.resolve(Some(&[entry.clone(), entry][..]), true);
        assert_eq!(once, twice);
        assert_eq!(
            twice.iter().filter(|t| t.name == SEARCH_DOCUMENTS_TOOL).count(),
            1
        );
    }

    #[test]
    fn filter_drops_scope_tools_without_scope() {
        let registry = ToolRegistry::default().with_filter(
            ToolFilter::default()
                .require_scope(READ_FILE_TOOL)
                .deny("get_weather"),
        );
        let custom = vec![json!({"name": "get_weather", "input_schema": {"type": "object"}})];
        let tools = registry.resolve(Some(custom.as_slice()), false);
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec![SEARCH_DOCUMENTS_TOOL]);
        assert_eq!(registry.resolve(None, true).len(), 2);
    }

    #[test]
    fn allow_list_restricts() {
        let registry =
            ToolRegistry::default().with_filter(ToolFilter::default().allow([READ_FILE_TOOL]));
        let tools = registry.resolve(None, true);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, READ_FILE_TOOL);
    }
}
