use super::*;

mod dialog_lifecycle;

/// Storefront page with a trigger and an empty upsell modal, wrapped in an
/// explicit body so the reflow nudge has a target.
pub(crate) const STOREFRONT_PAGE: &str = r#"
    <body>
      <a id='trigger' href='/products/travel-mug'
         data-upsell-trigger data-product-handle='travel-mug'>You may also like</a>
      <div id='modal' data-upsell-modal>
        <div data-modal-content></div>
      </div>
    </body>
    "#;

/// Two plain add-on cards, both preselected, plus subtotal and confirm.
pub(crate) const TWO_CARD_FRAGMENT: &str = r#"
    <ul>
      <li class='upsell-card' id='card-a' data-variant-id='111'
          data-price='1000' data-available='true'>
        <input type='checkbox' id='check-a' checked>
        <span class='upsell-card__price'>10.00</span>
      </li>
      <li class='upsell-card' id='card-b' data-variant-id='222'
          data-price='1500' data-available='true'>
        <input type='checkbox' id='check-b' checked>
        <span class='upsell-card__price'>15.00</span>
      </li>
    </ul>
    <p id='subtotal' data-upsell-subtotal></p>
    <button id='confirm' data-upsell-confirm>Add selected</button>
    "#;

pub(crate) fn mounted_two_card_page() -> Result<Harness> {
    let mut h = Harness::from_html(STOREFRONT_PAGE)?;
    h.mock_product_fragment("travel-mug", TWO_CARD_FRAGMENT);
    h.click("#trigger")?;
    Ok(h)
}
