//! Integration tests for template discovery and analysis

use std::path::PathBuf;

use pretty_assertions::assert_eq;
use qute_analysis::analysis::report;
use qute_analysis::{
    analyze, analyze_sources, discover, AnalysisConfig, AnalysisError, Engine, ParseError,
    TemplateNode,
};

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/templates")
}

fn fixture_config() -> AnalysisConfig {
    AnalysisConfig::new().with_root(fixtures())
}

#[test]
fn test_discovers_fixture_templates() {
    let analysis = analyze(&fixture_config()).expect("Should analyze");

    let paths: Vec<&str> = analysis.iter().map(|a| a.path()).collect();
    assert_eq!(
        paths,
        vec!["ItemResource/items.html", "base.html", "mail/welcome.txt"]
    );

    let ids: Vec<Option<&str>> = analysis.iter().map(|a| a.id()).collect();
    assert_eq!(
        ids,
        vec![Some("ItemResource/items"), Some("base"), Some("mail/welcome")]
    );

    let generated: Vec<&str> = analysis.iter().map(|a| a.generated_id()).collect();
    assert_eq!(generated, vec!["1", "2", "3"]);
}

#[test]
fn test_items_template_analysis() {
    let analysis = analyze(&fixture_config()).expect("Should analyze");
    let items = analysis
        .find_by_id("ItemResource/items")
        .expect("Should find items");

    let values: Vec<&str> = items.expressions().iter().map(|e| e.value.as_str()).collect();
    assert_eq!(
        values,
        vec![
            "'Items'",
            "title",
            "items",
            "item.name",
            "item.price",
            "100",
            "item.active",
            "item.price.discount(10)",
            "10",
            "item.price",
        ]
    );

    // Every expression can be found by its generated id
    for expr in items.expressions() {
        assert_eq!(
            items.find_expression(expr.generated_id).map(|e| &e.value),
            Some(&expr.value)
        );
    }

    let decls = items.sorted_parameter_declarations();
    assert_eq!(decls.len(), 2);
    assert_eq!(decls[0].key, "items");
    assert_eq!(decls[0].type_info, "java.util.List<org.acme.Item>");
    assert_eq!(decls[0].origin.line, 1);
    assert_eq!(decls[1].key, "title");
    assert_eq!(
        decls[1].default_value.as_ref().map(|e| e.value.as_str()),
        Some("'Items'")
    );

    let loops = items.find_nodes(|n| n.is_section("for"));
    assert_eq!(loops.len(), 1);
    assert_eq!(loops[0].origin().line, 5);

    let includes = items.find_nodes(|n| n.is_section("include"));
    assert_eq!(includes.len(), 1);
    assert!(matches!(includes[0], TemplateNode::Section(s) if s.name == "include"));
}

#[test]
fn test_fragment_ids() {
    let analysis = analyze(&fixture_config()).expect("Should analyze");
    let base = analysis.find_by_path("base.html").expect("Should find base");
    let fragments: Vec<&str> = base.fragment_ids().iter().map(String::as_str).collect();
    assert_eq!(fragments, vec!["header", "row"]);
    assert_eq!(base.expressions().len(), 2);
}

#[test]
fn test_synthetic_parameters_from_config() {
    let config = fixture_config().with_synthetic_parameter("inject", "org.acme.Beans");
    let analysis = analyze(&config).expect("Should analyze");
    let welcome = analysis
        .find_by_id("mail/welcome")
        .expect("Should find welcome");

    let keys: Vec<&str> = welcome
        .parameter_declarations()
        .iter()
        .map(|d| d.key.as_str())
        .collect();
    assert_eq!(keys, vec!["inject", "user"]);

    let sorted_decls = welcome.sorted_parameter_declarations();
    let sorted: Vec<&str> = sorted_decls
        .iter()
        .map(|d| d.key.as_str())
        .collect();
    assert_eq!(sorted, vec!["user", "inject"]);
}

#[test]
fn test_config_selects_suffixes() {
    let toml = format!(
        "root = {:?}\nsuffixes = [\"txt\"]\n",
        fixtures().display().to_string()
    );
    let config = AnalysisConfig::from_str(&toml).expect("Should parse config");
    let analysis = analyze(&config).expect("Should analyze");
    let paths: Vec<&str> = analysis.iter().map(|a| a.path()).collect();
    assert_eq!(paths, vec!["mail/welcome.txt"]);
}

#[test]
fn test_generated_ids_unique_across_engine() {
    let engine = Engine::new();
    let config = fixture_config();
    let first = discover(&engine, &config).expect("Should analyze");
    let second = discover(&engine, &config).expect("Should analyze");

    for (a, b) in first.iter().zip(second.iter()) {
        assert_ne!(a, b);
        assert_eq!(a.path(), b.path());
    }

    let mut expression_ids: Vec<u32> = first
        .iter()
        .chain(second.iter())
        .flat_map(|a| a.expressions().iter().map(|e| e.generated_id))
        .collect();
    let total = expression_ids.len();
    expression_ids.sort_unstable();
    expression_ids.dedup();
    assert_eq!(expression_ids.len(), total);
}

#[test]
fn test_parse_failure_reports_path() {
    let sources = vec![
        ("ok.html".to_string(), "{a}".to_string()),
        ("broken.html".to_string(), "{#for x in items}{x}{/if}".to_string()),
    ];
    let err = analyze_sources(&Engine::new(), &AnalysisConfig::new(), sources).unwrap_err();
    let AnalysisError::Parse(failures) = err else {
        panic!("Expected parse failure");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].path, "broken.html");
    assert!(matches!(
        failures[0].errors[0],
        ParseError::MismatchedSectionEnd { .. }
    ));
    assert!(failures[0].format().contains("broken.html"));
}

#[test]
fn test_text_report_lists_templates() {
    let analysis = analyze(&fixture_config()).expect("Should analyze");
    let text = report::to_text(&analysis);
    assert!(text.contains("ItemResource/items.html [1] id=ItemResource/items"));
    assert!(text.contains("  {@java.util.List<org.acme.Item> items} line 1"));
    assert!(text.contains("  fragments: header, row"));
}
