use proptest::collection::vec;
use proptest::prelude::*;
use proptest::test_runner::{FileFailurePersistence, TestCaseResult};
use upsell_modal::{format_money, Harness};

const SELECTION_PROPTEST_REGRESSION_FILE: &str =
    "tests/proptest-regressions/selection_property_fuzz_test.txt";
const DEFAULT_SELECTION_PROPTEST_CASES: u32 = 128;

fn selection_proptest_cases() -> u32 {
    std::env::var("UPSELL_MODAL_SELECTION_PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SELECTION_PROPTEST_CASES)
}

#[derive(Debug, Clone)]
struct CardSpec {
    price: i64,
    checked: bool,
    available: bool,
}

#[derive(Debug, Clone)]
enum UiAction {
    ClickCard(usize),
    ClickCheckbox(usize),
    SetChecked(usize, bool),
}

fn card_spec_strategy() -> BoxedStrategy<CardSpec> {
    (0i64..100_000, any::<bool>(), prop::bool::weighted(0.8))
        .prop_map(|(price, checked, available)| CardSpec {
            price,
            checked,
            available,
        })
        .boxed()
}

fn ui_action_strategy(card_count: usize) -> BoxedStrategy<UiAction> {
    let index = 0..card_count;
    prop_oneof![
        3 => index.clone().prop_map(UiAction::ClickCard),
        3 => index.clone().prop_map(UiAction::ClickCheckbox),
        2 => (index, any::<bool>()).prop_map(|(i, value)| UiAction::SetChecked(i, value)),
    ]
    .boxed()
}

fn scenario_strategy() -> BoxedStrategy<(Vec<CardSpec>, Vec<UiAction>)> {
    vec(card_spec_strategy(), 1..=6)
        .prop_flat_map(|cards| {
            let count = cards.len();
            (Just(cards), vec(ui_action_strategy(count), 0..=24))
        })
        .boxed()
}

fn fragment_for(cards: &[CardSpec]) -> String {
    let mut html = String::from("<ul>");
    for (index, card) in cards.iter().enumerate() {
        let checked = if card.checked { " checked" } else { "" };
        html.push_str(&format!(
            "<li class='upsell-card' id='card-{index}' data-variant-id='{id}' \
             data-price='{price}' data-available='{available}'>\
             <input type='checkbox' id='check-{index}'{checked}>\
             </li>",
            id = 100 + index,
            price = card.price,
            available = card.available,
        ));
    }
    html.push_str("</ul><p id='subtotal' data-upsell-subtotal></p>");
    html.push_str("<button id='confirm' data-upsell-confirm>Add</button>");
    html
}

const HOST_PAGE: &str = r#"
    <a id='trigger' data-upsell-trigger data-product-handle='fuzz'>More</a>
    <div data-upsell-modal><div data-modal-content></div></div>
    "#;

fn check_subtotal(
    harness: &Harness,
    cards: &[CardSpec],
    selected: &[bool],
    step: &str,
) -> TestCaseResult {
    let total: i64 = cards
        .iter()
        .zip(selected)
        .filter(|(_, on)| **on)
        .map(|(card, _)| card.price)
        .sum();
    let text = harness
        .text("#subtotal")
        .map_err(|err| proptest::test_runner::TestCaseError::fail(format!("{err:?}")))?;
    prop_assert_eq!(text, format_money(total, None), "after {}", step);

    for (index, on) in selected.iter().enumerate() {
        let checked = harness
            .assert_checked(&format!("#check-{index}"), *on)
            .is_ok();
        prop_assert!(checked, "checkbox {} diverged after {}", index, step);
    }
    Ok(())
}

fn assert_selection_tracks_the_model(
    cards: &[CardSpec],
    actions: &[UiAction],
) -> TestCaseResult {
    let mut harness = Harness::from_html(HOST_PAGE)
        .map_err(|err| proptest::test_runner::TestCaseError::fail(format!("{err:?}")))?;
    harness.mock_product_fragment("fuzz", &fragment_for(cards));
    harness
        .click("#trigger")
        .map_err(|err| proptest::test_runner::TestCaseError::fail(format!("{err:?}")))?;

    let mut selected: Vec<bool> = cards
        .iter()
        .map(|card| card.checked && card.available)
        .collect();
    check_subtotal(&harness, cards, &selected, "mount")?;

    for (step, action) in actions.iter().enumerate() {
        let result = match action {
            UiAction::ClickCard(i) => {
                if cards[*i].available {
                    selected[*i] = !selected[*i];
                }
                harness.click(&format!("#card-{i}"))
            }
            UiAction::ClickCheckbox(i) => {
                if cards[*i].available {
                    selected[*i] = !selected[*i];
                }
                harness.click(&format!("#check-{i}"))
            }
            UiAction::SetChecked(i, value) => {
                if cards[*i].available {
                    selected[*i] = *value;
                }
                harness.set_checked(&format!("#check-{i}"), *value)
            }
        };
        if let Err(error) = result {
            prop_assert!(
                false,
                "action failed at step {step}: {action:?}, error={error:?}"
            );
        }
        check_subtotal(&harness, cards, &selected, &format!("step {step}"))?;
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: selection_proptest_cases(),
        failure_persistence: Some(Box::new(
            FileFailurePersistence::Direct(SELECTION_PROPTEST_REGRESSION_FILE),
        )),
        .. ProptestConfig::default()
    })]

    #[test]
    fn random_toggle_sequences_keep_the_subtotal_consistent(
        (cards, actions) in scenario_strategy(),
    ) {
        assert_selection_tracks_the_model(&cards, &actions)?;
    }
}
