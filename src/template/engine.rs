//! Template engine: id generation and parser hooks

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::config::SyntheticParameter;
use crate::error::ParseError;
use crate::parser::ast::{Origin, ParameterDeclaration};
use crate::parser::builder::TemplateBuilder;
use crate::parser::grammar;

use super::Template;

/// Source of template and expression ids for one engine
#[derive(Debug, Default)]
pub(crate) struct IdGenerator {
    template: AtomicU64,
    expression: AtomicU32,
}

impl IdGenerator {
    pub fn next_template_id(&self) -> String {
        (self.template.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }

    pub fn next_expression_id(&self) -> u32 {
        self.expression.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Called before a template is parsed
pub trait ParserHook: Send + Sync {
    fn before_parsing(&self, helper: &mut ParserHelper<'_>);
}

/// Lets a [`ParserHook`] contribute to the template being parsed
#[derive(Debug)]
pub struct ParserHelper<'a> {
    template_id: Option<&'a str>,
    declarations: Vec<ParameterDeclaration>,
}

impl<'a> ParserHelper<'a> {
    fn new(template_id: Option<&'a str>) -> Self {
        Self {
            template_id,
            declarations: Vec::new(),
        }
    }

    /// Id of the template being parsed, if it has one
    pub fn template_id(&self) -> Option<&str> {
        self.template_id
    }

    /// Add a synthetic parameter declaration
    pub fn add_parameter(&mut self, key: impl Into<String>, type_info: impl Into<String>) {
        self.declarations.push(ParameterDeclaration {
            type_info: type_info.into(),
            key: key.into(),
            default_value: None,
            origin: Origin::synthetic(),
        });
    }
}

/// Declares the same synthetic parameters in every template
#[derive(Debug, Clone, Default)]
pub struct SyntheticParametersHook {
    parameters: Vec<SyntheticParameter>,
}

impl SyntheticParametersHook {
    pub fn new(parameters: Vec<SyntheticParameter>) -> Self {
        Self { parameters }
    }
}

impl ParserHook for SyntheticParametersHook {
    fn before_parsing(&self, helper: &mut ParserHelper<'_>) {
        for param in &self.parameters {
            helper.add_parameter(param.key.clone(), param.type_info.clone());
        }
    }
}

/// Parses templates; ids are unique among all templates parsed by one engine
#[derive(Default)]
pub struct Engine {
    ids: IdGenerator,
    hooks: Vec<Box<dyn ParserHook>>,
}

impl Engine {
    /// Create an engine without parser hooks
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parser hook
    pub fn with_hook(mut self, hook: impl ParserHook + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    /// Parse an anonymous template
    pub fn parse(&self, source: &str) -> Result<Template, Vec<ParseError>> {
        self.parse_with_id(source, None)
    }

    /// Parse a template with a user-defined id
    pub fn parse_with_id(
        &self,
        source: &str,
        id: Option<&str>,
    ) -> Result<Template, Vec<ParseError>> {
        let mut helper = ParserHelper::new(id);
        for hook in &self.hooks {
            hook.before_parsing(&mut helper);
        }

        let raw = grammar::parse(source)?;
        let built = TemplateBuilder::new(source, &self.ids)
            .with_declarations(helper.declarations)
            .build(raw)?;

        let generated_id = self.ids.next_template_id();
        tracing::trace!(
            "parsed template {:?} as {} ({} expressions)",
            id,
            generated_id,
            built.expressions.len()
        );

        Ok(Template {
            generated_id,
            id: id.map(str::to_string),
            nodes: built.nodes,
            expressions: built.expressions,
            parameter_declarations: built.parameter_declarations,
            fragment_ids: built.fragment_ids,
        })
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("ids", &self.ids)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ItemHook;

    impl ParserHook for ItemHook {
        fn before_parsing(&self, helper: &mut ParserHelper<'_>) {
            if helper.template_id() == Some("items") {
                helper.add_parameter("item", "org.acme.Item");
            }
        }
    }

    #[test]
    fn test_generated_ids_unique() {
        let engine = Engine::new();
        let a = engine.parse("{a}").expect("Should parse");
        let b = engine.parse("{b}").expect("Should parse");
        assert_ne!(a.generated_id(), b.generated_id());
        assert_ne!(
            a.expressions()[0].generated_id,
            b.expressions()[0].generated_id
        );
    }

    #[test]
    fn test_failed_parse_does_not_consume_template_id() {
        let engine = Engine::new();
        assert!(engine.parse("{#if a}").is_err());
        let t = engine.parse("ok").expect("Should parse");
        assert_eq!(t.generated_id(), "1");
    }

    #[test]
    fn test_hook_adds_synthetic_declaration() {
        let engine = Engine::new().with_hook(ItemHook);
        let t = engine
            .parse_with_id("{@String title}{item.name}", Some("items"))
            .expect("Should parse");
        let decls = t.parameter_declarations();
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].key, "item");
        assert!(decls[0].origin.is_synthetic());
        assert_eq!(decls[0].origin.line, 0);
        assert!(!decls[1].origin.is_synthetic());

        let other = engine.parse_with_id("{x}", Some("other")).expect("Should parse");
        assert!(other.parameter_declarations().is_empty());
    }

    #[test]
    fn test_synthetic_parameters_hook() {
        let hook = SyntheticParametersHook::new(vec![SyntheticParameter {
            key: "config".to_string(),
            type_info: "org.acme.Config".to_string(),
        }]);
        let t = Engine::new()
            .with_hook(hook)
            .parse("{config.name}")
            .expect("Should parse");
        assert_eq!(t.parameter_declarations()[0].type_info, "org.acme.Config");
    }

    #[test]
    fn test_engine_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
        assert_send_sync::<Template>();
    }
}
