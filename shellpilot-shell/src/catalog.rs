//! # Tool Catalog
//!
//! Static declaration of the command vocabulary exposed to the model: one
//! entry per command family, each with a parameter schema. The catalog is
//! pure data - it is consulted when requesting a completion and when
//! validating tool-call arguments, and never mutated at runtime.
//!
//! A single live catalog backs both the model-facing contract and the
//! shell's dispatch table; `CommandShell::verify_catalog` checks the two
//! name sets against each other at startup so they cannot drift.

use crate::provider::ToolDefinition;
use serde_json::{json, Map, Value};
use shellpilot_error::{Error, Result};

/// What kind of value a parameter takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// A string value (positional token on the line surface)
    Text,
    /// A boolean switch (flag token on the line surface)
    Flag,
}

/// Schema for one command parameter
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    /// Line surface only: this parameter consumes all remaining tokens,
    /// joined by spaces (e.g. the text of `write`, the command of `exec`).
    pub rest: bool,
}

impl ParamSpec {
    /// A required string parameter
    pub fn text(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            kind: ParamKind::Text,
            required: true,
            rest: false,
        }
    }

    /// An optional string parameter
    pub fn opt_text(name: &'static str, description: &'static str) -> Self {
        Self {
            required: false,
            ..Self::text(name, description)
        }
    }

    /// An optional boolean switch
    pub fn flag(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            kind: ParamKind::Flag,
            required: false,
            rest: false,
        }
    }

    /// Mark this parameter as consuming the rest of the line
    pub fn rest(mut self) -> Self {
        self.rest = true;
        self
    }
}

/// Schema for one command family
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
}

impl CommandSpec {
    fn new(name: &'static str, description: &'static str, params: Vec<ParamSpec>) -> Self {
        Self {
            name,
            description,
            params,
        }
    }

    /// Render a one-line usage string, e.g. `rm [--recursive] [--force] <path>`
    pub fn usage(&self) -> String {
        let mut out = self.name.to_string();
        for p in self.params.iter().filter(|p| p.kind == ParamKind::Flag) {
            out.push_str(&format!(" [--{}]", p.name));
        }
        for p in self.params.iter().filter(|p| p.kind == ParamKind::Text) {
            let name = if p.rest {
                format!("{}...", p.name)
            } else {
                p.name.to_string()
            };
            if p.required {
                out.push_str(&format!(" <{}>", name));
            } else {
                out.push_str(&format!(" [{}]", name));
            }
        }
        out
    }
}

/// The command vocabulary and parameter schemas exposed to the model
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    commands: Vec<CommandSpec>,
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self {
            commands: Self::define_commands(),
        }
    }

    fn define_commands() -> Vec<CommandSpec> {
        vec![
            CommandSpec::new(
                "help",
                "Show the list of available shell commands.",
                vec![],
            ),
            CommandSpec::new("pwd", "Show the current working directory.", vec![]),
            CommandSpec::new(
                "cd",
                "Change the working directory.",
                vec![ParamSpec::text("path", "Relative or absolute path.")],
            ),
            CommandSpec::new(
                "ls",
                "List files and directories. Defaults to the current directory.",
                vec![ParamSpec::opt_text("path", "Directory to list (optional).")],
            ),
            CommandSpec::new(
                "tree",
                "Show the file hierarchy recursively.",
                vec![ParamSpec::opt_text("path", "Root directory (optional).")],
            ),
            CommandSpec::new(
                "mkdir",
                "Create a directory (and missing parents).",
                vec![ParamSpec::text("path", "Directory name or path.")],
            ),
            CommandSpec::new(
                "touch",
                "Create an empty file. Existing content is preserved.",
                vec![ParamSpec::text("file", "File name or path.")],
            ),
            CommandSpec::new(
                "write",
                "Append a line of text to a file (created if absent).",
                vec![
                    ParamSpec::text("file", "Destination file."),
                    ParamSpec::text("text", "Text to append.").rest(),
                ],
            ),
            CommandSpec::new(
                "read",
                "Show the contents of a file.",
                vec![ParamSpec::text("file", "File to read.")],
            ),
            CommandSpec::new(
                "rm",
                "Remove a file or directory.",
                vec![
                    ParamSpec::text("path", "File or directory to remove."),
                    ParamSpec::flag("recursive", "Remove directories recursively."),
                    ParamSpec::flag("force", "Ignore a missing target."),
                ],
            ),
            CommandSpec::new(
                "cp",
                "Copy a file or directory.",
                vec![
                    ParamSpec::text("src", "Source path."),
                    ParamSpec::text("dest", "Destination path."),
                    ParamSpec::flag("recursive", "Copy directories recursively."),
                ],
            ),
            CommandSpec::new(
                "mv",
                "Move or rename a file or directory.",
                vec![
                    ParamSpec::text("src", "Source path."),
                    ParamSpec::text("dest", "Destination path."),
                ],
            ),
            CommandSpec::new(
                "fetch",
                "HTTP GET a URL; if dest is given, save the body to a file.",
                vec![
                    ParamSpec::text("url", "URL to fetch."),
                    ParamSpec::opt_text("dest", "File to save to (optional)."),
                ],
            ),
            CommandSpec::new(
                "exec",
                "Run a system command in the current working directory.",
                vec![ParamSpec::text("command", "Full command line.").rest()],
            ),
            CommandSpec::new(
                "chrome",
                "Open the default browser, optionally at a URL.",
                vec![ParamSpec::opt_text("url", "URL to open (optional).").rest()],
            ),
        ]
    }

    /// Look up a command spec by name
    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.iter().find(|c| c.name == name)
    }

    /// Check whether a command name is declared
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All declared command names, in declaration order
    pub fn names(&self) -> Vec<&'static str> {
        self.commands.iter().map(|c| c.name).collect()
    }

    /// All command specs, in declaration order
    pub fn commands(&self) -> &[CommandSpec] {
        &self.commands
    }

    /// Render the catalog as model-facing tool definitions (JSON schema)
    pub fn to_definitions(&self) -> Vec<ToolDefinition> {
        self.commands
            .iter()
            .map(|spec| {
                let mut properties = Map::new();
                let mut required: Vec<&str> = Vec::new();
                for p in &spec.params {
                    let ty = match p.kind {
                        ParamKind::Text => "string",
                        ParamKind::Flag => "boolean",
                    };
                    properties.insert(
                        p.name.to_string(),
                        json!({ "type": ty, "description": p.description }),
                    );
                    if p.required {
                        required.push(p.name);
                    }
                }
                ToolDefinition::new(spec.name, spec.description).with_parameters(json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                }))
            })
            .collect()
    }

    /// Validate a structured argument map against a command's schema.
    ///
    /// Unknown keys, missing required parameters, and wrongly typed values
    /// are all protocol violations: the arguments came from a tool call,
    /// not from a human typing a line.
    pub fn validate(&self, name: &str, args: &Map<String, Value>) -> Result<()> {
        let spec = self
            .get(name)
            .ok_or_else(|| Error::protocol_invalid(format!("unknown command '{}'", name)))?;

        for p in spec.params.iter().filter(|p| p.required) {
            if !args.contains_key(p.name) {
                return Err(Error::protocol_invalid(format!(
                    "'{}' missing required parameter '{}'",
                    name, p.name
                ))
                .with_context("command", name)
                .with_context("parameter", p.name));
            }
        }

        for (key, value) in args {
            let Some(p) = spec.params.iter().find(|p| p.name == key) else {
                return Err(Error::protocol_invalid(format!(
                    "'{}' has no parameter '{}'",
                    name, key
                ))
                .with_context("command", name));
            };
            let ok = match p.kind {
                ParamKind::Text => value.is_string() || value.is_number(),
                ParamKind::Flag => value.is_boolean(),
            };
            if !ok {
                return Err(Error::protocol_invalid(format!(
                    "'{}' parameter '{}' has wrong type: {}",
                    name, key, value
                ))
                .with_context("command", name)
                .with_context("parameter", p.name));
            }
        }

        Ok(())
    }

    /// Map line-surface tokens onto a structured argument map.
    ///
    /// Tokens starting with `--` select the matching boolean switch; a single
    /// dash groups one-letter switches by their first letter (`-rf`).
    /// Remaining tokens fill string parameters in declaration order; a `rest`
    /// parameter swallows everything left, joined by spaces.
    pub fn args_from_tokens(&self, name: &str, tokens: &[&str]) -> Result<Map<String, Value>> {
        let spec = self
            .get(name)
            .ok_or_else(|| Error::usage(format!("unknown command '{}'", name)))?;

        let mut args = Map::new();
        let mut positional: Vec<&str> = Vec::new();

        // Commands without boolean switches (exec, write, ...) take `-`
        // tokens literally, so lines like `exec ls -la` pass through intact.
        let has_flags = spec.params.iter().any(|p| p.kind == ParamKind::Flag);

        for token in tokens {
            if !has_flags {
                positional.push(token);
            } else if let Some(long) = token.strip_prefix("--") {
                let Some(p) = spec
                    .params
                    .iter()
                    .find(|p| p.kind == ParamKind::Flag && p.name == long)
                else {
                    return Err(Error::usage(spec.usage()).with_context("flag", *token));
                };
                args.insert(p.name.to_string(), Value::Bool(true));
            } else if let Some(short) = token.strip_prefix('-') {
                for letter in short.chars() {
                    let Some(p) = spec
                        .params
                        .iter()
                        .find(|p| p.kind == ParamKind::Flag && p.name.starts_with(letter))
                    else {
                        return Err(Error::usage(spec.usage()).with_context("flag", *token));
                    };
                    args.insert(p.name.to_string(), Value::Bool(true));
                }
            } else {
                positional.push(token);
            }
        }

        let mut remaining = positional.into_iter();
        for p in spec.params.iter().filter(|p| p.kind == ParamKind::Text) {
            if p.rest {
                let rest: Vec<&str> = remaining.by_ref().collect();
                if rest.is_empty() {
                    if p.required {
                        return Err(Error::usage(spec.usage()));
                    }
                } else {
                    args.insert(p.name.to_string(), Value::String(rest.join(" ")));
                }
            } else {
                match remaining.next() {
                    Some(v) => {
                        args.insert(p.name.to_string(), Value::String(v.to_string()));
                    }
                    None if p.required => return Err(Error::usage(spec.usage())),
                    None => {}
                }
            }
        }

        if remaining.next().is_some() {
            return Err(Error::usage(spec.usage()));
        }

        Ok(args)
    }

    /// Render the static help text listing all commands
    pub fn help_text(&self) -> String {
        let width = self
            .commands
            .iter()
            .map(|c| c.usage().len())
            .max()
            .unwrap_or(0);
        let mut out = String::from("Available commands:\n");
        for spec in &self.commands {
            out.push_str(&format!(
                "  {:<width$}  - {}\n",
                spec.usage(),
                spec.description,
                width = width
            ));
        }
        out.push_str("  <any other line>  - run directly as a system command\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_names() {
        let catalog = ToolCatalog::new();
        let names = catalog.names();
        assert_eq!(names.len(), 15);
        assert!(catalog.contains("exec"));
        assert!(catalog.contains("chrome"));
        assert!(!catalog.contains("grep"));
    }

    #[test]
    fn test_to_definitions_schema() {
        let catalog = ToolCatalog::new();
        let defs = catalog.to_definitions();
        let rm = defs.iter().find(|d| d.name == "rm").unwrap();

        assert_eq!(rm.parameters["properties"]["recursive"]["type"], "boolean");
        assert_eq!(rm.parameters["properties"]["path"]["type"], "string");
        assert_eq!(rm.parameters["required"], json!(["path"]));
    }

    #[test]
    fn test_validate_accepts_good_args() {
        let catalog = ToolCatalog::new();
        let mut args = Map::new();
        args.insert("path".into(), json!("src"));
        args.insert("recursive".into(), json!(true));
        assert!(catalog.validate("rm", &args).is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_required() {
        let catalog = ToolCatalog::new();
        let args = Map::new();
        let err = catalog.validate("cd", &args).unwrap_err();
        assert_eq!(err.kind(), shellpilot_error::ErrorKind::ProtocolInvalid);
    }

    #[test]
    fn test_validate_rejects_unknown_key_and_bad_type() {
        let catalog = ToolCatalog::new();

        let mut args = Map::new();
        args.insert("bogus".into(), json!("x"));
        args.insert("path".into(), json!("dir"));
        assert!(catalog.validate("cd", &args).is_err());

        let mut args = Map::new();
        args.insert("path".into(), json!("dir"));
        args.insert("recursive".into(), json!("yes"));
        assert!(catalog.validate("rm", &args).is_err());
    }

    #[test]
    fn test_args_from_tokens_flags_and_positionals() {
        let catalog = ToolCatalog::new();

        let args = catalog.args_from_tokens("rm", &["-rf", "build"]).unwrap();
        assert_eq!(args["path"], json!("build"));
        assert_eq!(args["recursive"], json!(true));
        assert_eq!(args["force"], json!(true));

        let args = catalog
            .args_from_tokens("cp", &["--recursive", "a", "b"])
            .unwrap();
        assert_eq!(args["src"], json!("a"));
        assert_eq!(args["dest"], json!("b"));
        assert_eq!(args["recursive"], json!(true));
    }

    #[test]
    fn test_args_from_tokens_rest_param() {
        let catalog = ToolCatalog::new();
        let args = catalog
            .args_from_tokens("write", &["notes.txt", "hello", "world"])
            .unwrap();
        assert_eq!(args["file"], json!("notes.txt"));
        assert_eq!(args["text"], json!("hello world"));
    }

    #[test]
    fn test_args_from_tokens_dash_literals_without_flags() {
        let catalog = ToolCatalog::new();
        let args = catalog
            .args_from_tokens("exec", &["ls", "-la", "/tmp"])
            .unwrap();
        assert_eq!(args["command"], json!("ls -la /tmp"));
    }

    #[test]
    fn test_args_from_tokens_missing_required() {
        let catalog = ToolCatalog::new();
        let err = catalog.args_from_tokens("cd", &[]).unwrap_err();
        assert_eq!(err.kind(), shellpilot_error::ErrorKind::UsageInvalid);
        assert!(err.message().contains("cd <path>"));
    }

    #[test]
    fn test_args_from_tokens_extra_tokens_rejected() {
        let catalog = ToolCatalog::new();
        assert!(catalog.args_from_tokens("mv", &["a", "b", "c"]).is_err());
    }

    #[test]
    fn test_usage_rendering() {
        let catalog = ToolCatalog::new();
        assert_eq!(
            catalog.get("rm").unwrap().usage(),
            "rm [--recursive] [--force] <path>"
        );
        assert_eq!(catalog.get("write").unwrap().usage(), "write <file> <text...>");
        assert_eq!(catalog.get("ls").unwrap().usage(), "ls [path]");
    }

    #[test]
    fn test_help_text_lists_every_command() {
        let catalog = ToolCatalog::new();
        let help = catalog.help_text();
        for name in catalog.names() {
            assert!(help.contains(name), "help text missing {}", name);
        }
    }
}
