use super::*;

const OLD_MOBILE_SAFARI: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_3 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.3 Mobile/15E148 Safari/604.1";

const NEW_MOBILE_SAFARI: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_2 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Mobile/15E148 Safari/604.1";

#[test]
fn clean_cart_update_closes_the_dialog() -> Result<()> {
    let mut h = mounted_two_card_page()?;
    assert!(h.dialog_open()?);

    h.announce_cart_update(false)?;
    assert!(!h.dialog_open()?);
    assert_eq!(
        h.emitted_signals(),
        [Signal::CartUpdate { did_error: false }, Signal::ModalClose]
    );
    Ok(())
}

#[test]
fn erroring_cart_update_leaves_the_dialog_open() -> Result<()> {
    let mut h = mounted_two_card_page()?;

    h.announce_cart_update(true)?;
    assert!(h.dialog_open()?);
    assert_eq!(h.emitted_signals(), [Signal::CartUpdate { did_error: true }]);
    Ok(())
}

#[test]
fn closing_an_already_closed_dialog_is_a_no_op() -> Result<()> {
    let mut h = Harness::from_html(STOREFRONT_PAGE)?;
    assert!(!h.dialog_open()?);

    h.close_dialog()?;
    assert!(!h.dialog_open()?);
    assert!(h.emitted_signals().is_empty());
    Ok(())
}

#[test]
fn removing_the_dialog_revokes_its_subscriptions() -> Result<()> {
    let mut h = mounted_two_card_page()?;
    h.remove("#modal")?;

    // The signal still travels, but the removed dialog no longer reacts:
    // no modal-close follows the cart update.
    h.announce_cart_update(false)?;
    assert_eq!(
        h.emitted_signals(),
        [Signal::CartUpdate { did_error: false }]
    );
    Ok(())
}

#[test]
fn old_mobile_safari_gets_the_reflow_nudge() -> Result<()> {
    let mut h = mounted_two_card_page()?;
    h.set_user_agent(OLD_MOBILE_SAFARI);

    h.close_dialog()?;
    assert_eq!(h.run_animation_frame()?, 1);
    assert_eq!(
        h.attr("body", "style")?.as_deref(),
        Some("width: calc(100% - 1px)")
    );

    assert_eq!(h.run_animation_frame()?, 1);
    assert_eq!(h.attr("body", "style")?, None);

    assert_eq!(h.run_animation_frame()?, 0);
    Ok(())
}

#[test]
fn sixteen_four_and_later_skip_the_reflow_nudge() -> Result<()> {
    let mut h = mounted_two_card_page()?;
    h.set_user_agent(
        "Mozilla/5.0 (iPhone; CPU iPhone OS 16_4 like Mac OS X) \
         AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.4 Mobile/15E148 Safari/604.1",
    );

    h.close_dialog()?;
    assert_eq!(h.run_animation_frame()?, 0);
    assert_eq!(h.attr("body", "style")?, None);
    Ok(())
}

#[test]
fn current_mobile_safari_skips_the_reflow_nudge() -> Result<()> {
    let mut h = mounted_two_card_page()?;
    h.set_user_agent(NEW_MOBILE_SAFARI);

    h.close_dialog()?;
    assert_eq!(h.run_animation_frame()?, 0);
    assert_eq!(h.attr("body", "style")?, None);
    Ok(())
}

#[test]
fn desktop_browsers_skip_the_reflow_nudge() -> Result<()> {
    let mut h = mounted_two_card_page()?;
    h.set_user_agent(
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    );

    h.close_dialog()?;
    assert_eq!(h.run_animation_frame()?, 0);
    Ok(())
}
