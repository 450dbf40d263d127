use proptest::collection::vec;
use proptest::prelude::*;
use proptest::test_runner::{FileFailurePersistence, TestCaseResult};
use upsell_modal::{Error, Harness};

const PARSER_PROPTEST_REGRESSION_FILE: &str =
    "tests/proptest-regressions/parser_property_fuzz_test.txt";
const DEFAULT_PARSER_PROPTEST_CASES: u32 = 128;

fn parser_proptest_cases() -> u32 {
    std::env::var("UPSELL_MODAL_PARSER_PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_PARSER_PROPTEST_CASES)
}

#[derive(Debug, Clone)]
enum MarkupNode {
    Text(String),
    Element {
        tag: &'static str,
        attrs: Vec<(&'static str, String)>,
        children: Vec<MarkupNode>,
    },
}

fn attr_strategy() -> BoxedStrategy<(&'static str, String)> {
    (
        prop_oneof![
            Just("class"),
            Just("title"),
            Just("data-role"),
            Just("data-kind"),
        ],
        "[a-z][a-z ]{0,7}",
    )
        .boxed()
}

// Container tags only: void tags serialize without end tags and would make
// the dump/re-parse comparison about serialization quirks instead of tree
// stability.
fn markup_strategy() -> BoxedStrategy<MarkupNode> {
    let leaf = "[a-zA-Z0-9 .,:!_-]{1,16}"
        .prop_map(MarkupNode::Text)
        .boxed();
    leaf.prop_recursive(3, 24, 4, |inner| {
        (
            prop_oneof![
                Just("div"),
                Just("span"),
                Just("p"),
                Just("ul"),
                Just("li"),
                Just("section"),
                Just("em"),
                Just("strong"),
            ],
            vec(attr_strategy(), 0..=3),
            vec(inner, 0..=4),
        )
            .prop_map(|(tag, attrs, children)| MarkupNode::Element {
                tag,
                attrs,
                children,
            })
            .boxed()
    })
    .boxed()
}

fn selector_strategy() -> BoxedStrategy<&'static str> {
    prop_oneof![
        Just("div"),
        Just("span"),
        Just("*"),
        Just("#doc-root"),
        Just(".needle-mark"),
        Just(".nomatch"),
        Just("[title]"),
        Just("[data-role]"),
        Just("[data-role='hero']"),
        Just("div > span"),
        Just("ul li"),
        Just("section div, p"),
        Just("span:checked"),
        Just("li:disabled"),
        Just("div[data-kind] > em"),
    ]
    .boxed()
}

fn render(node: &MarkupNode, out: &mut String) {
    match node {
        MarkupNode::Text(text) => out.push_str(text),
        MarkupNode::Element {
            tag,
            attrs,
            children,
        } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("='");
                out.push_str(value);
                out.push('\'');
            }
            out.push('>');
            for child in children {
                render(child, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

fn document_for(nodes: &[MarkupNode], planted: &str) -> String {
    let mut body = String::new();
    for node in nodes {
        render(node, &mut body);
    }
    format!("<div id='doc-root'>{planted}{body}</div>")
}

fn fail(err: Error) -> proptest::test_runner::TestCaseError {
    proptest::test_runner::TestCaseError::fail(format!("{err:?}"))
}

fn assert_parse_dump_is_stable(nodes: &[MarkupNode]) -> TestCaseResult {
    let html = document_for(nodes, "");
    let first_pass = Harness::from_html(&html).map_err(fail)?;
    let first = first_pass.dump_dom("#doc-root").map_err(fail)?;

    let second_pass = Harness::from_html(&first).map_err(fail)?;
    let second = second_pass.dump_dom("#doc-root").map_err(fail)?;

    prop_assert_eq!(first, second);
    Ok(())
}

fn assert_selector_queries_are_total(
    nodes: &[MarkupNode],
    selectors: &[&str],
) -> TestCaseResult {
    let html = document_for(nodes, "<span id='needle' class='needle-mark'>x</span>");
    let h = Harness::from_html(&html).map_err(fail)?;

    // The id fast path and the full tree scan must agree.
    prop_assert_eq!(
        h.dump_dom("#needle").map_err(fail)?,
        h.dump_dom("span.needle-mark").map_err(fail)?
    );

    for selector in selectors {
        match h.dump_dom(selector) {
            Ok(_) | Err(Error::SelectorNotFound(_)) => {}
            Err(other) => {
                prop_assert!(false, "query failed for {selector:?}: {other:?}");
            }
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: parser_proptest_cases(),
        failure_persistence: Some(Box::new(
            FileFailurePersistence::Direct(PARSER_PROPTEST_REGRESSION_FILE),
        )),
        .. ProptestConfig::default()
    })]

    #[test]
    fn generated_markup_parses_and_dumps_stably(nodes in vec(markup_strategy(), 0..=5)) {
        assert_parse_dump_is_stable(&nodes)?;
    }

    #[test]
    fn selector_queries_never_panic_on_generated_markup(
        nodes in vec(markup_strategy(), 0..=5),
        selectors in vec(selector_strategy(), 1..=12),
    ) {
        assert_selector_queries_are_total(&nodes, &selectors)?;
    }
}
