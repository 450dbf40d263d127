use super::*;
use crate::variant::parse_variants;

const CART_ADD_URL: &str = "/cart/add.js";

// Matches the confirm control's css animation length.
const ADDED_FEEDBACK_DELAY_MS: i64 = 2000;

impl Harness {
    pub(crate) fn cards(&self) -> Result<Vec<NodeId>> {
        self.dom.query_selector_all(".upsell-card")
    }

    fn card_checkbox(&self, card: NodeId) -> Result<Option<NodeId>> {
        self.dom.query_selector_from(card, "input[type=checkbox]")
    }

    fn is_main_card(&self, card: NodeId) -> bool {
        // Bare boolean attributes parse to "true".
        self.dom.attr(card, "data-main-product").as_deref() == Some("true")
    }

    fn money_template(&self) -> Option<String> {
        let dialog = self.dom.query_selector("[data-upsell-modal]").ok()??;
        self.dom
            .attr(dialog, "data-money-format")
            .filter(|template| !template.is_empty())
    }

    /// Brings freshly injected (or statically present) cards into a
    /// consistent state: unavailable cards and cards without a resolvable
    /// variant cannot be selected; everything else follows its checkbox.
    pub(crate) fn init_cards(&mut self) -> Result<()> {
        for card in self.cards()? {
            let available = self.dom.attr(card, "data-available").as_deref() != Some("false");
            let has_variant = self
                .dom
                .attr(card, "data-variant-id")
                .map(|id| !id.is_empty())
                .unwrap_or(false);
            let checkbox = self.card_checkbox(card)?;

            if !available || !has_variant {
                if let Some(checkbox) = checkbox {
                    self.dom.set_disabled(checkbox, true)?;
                    self.dom.set_checked(checkbox, false)?;
                }
                self.dom.set_attr(card, "data-selected", "false")?;
                self.dom.class_remove(card, "is-selected")?;
                if !available && !self.is_main_card(card) {
                    self.mark_unavailable(card)?;
                }
                continue;
            }

            let selected = match checkbox {
                Some(checkbox) => self.dom.checked(checkbox)?,
                None => self.dom.attr(card, "data-selected").as_deref() == Some("true"),
            };
            self.dom
                .set_attr(card, "data-selected", if selected { "true" } else { "false" })?;
            if selected {
                self.dom.class_add(card, "is-selected")?;
            } else {
                self.dom.class_remove(card, "is-selected")?;
            }
        }
        self.refresh_subtotal()
    }

    pub(crate) fn toggle_card(&mut self, card: NodeId) -> Result<()> {
        let Some(checkbox) = self.card_checkbox(card)? else {
            return Ok(());
        };
        if self.dom.disabled(checkbox) {
            return Ok(());
        }
        let selected = !self.dom.checked(checkbox)?;
        self.dom.set_checked(checkbox, selected)?;
        self.set_card_selected(card, selected)
    }

    pub(crate) fn sync_selection_from_checkbox(&mut self, checkbox: NodeId) -> Result<()> {
        let Some(card) = self.dom.closest(checkbox, ".upsell-card")? else {
            return Ok(());
        };
        let selected = self.dom.checked(checkbox)?;
        self.set_card_selected(card, selected)
    }

    pub(crate) fn set_card_selected(&mut self, card: NodeId, selected: bool) -> Result<()> {
        self.dom
            .set_attr(card, "data-selected", if selected { "true" } else { "false" })?;
        if selected {
            self.dom.class_add(card, "is-selected")?;
        } else {
            self.dom.class_remove(card, "is-selected")?;
        }
        if let Some(checkbox) = self.card_checkbox(card)? {
            self.dom.set_checked(checkbox, selected)?;
        }
        self.refresh_subtotal()
    }

    /// Re-resolves a card's variant from its selector values. No match leaves
    /// the card exactly as it was.
    pub(crate) fn resolve_variant(&mut self, card: NodeId) -> Result<()> {
        let selected = self.selected_option_values(card)?;
        if selected.is_empty() {
            return Ok(());
        }

        let variants = self.card_variants(card)?;
        let Some(variant) = match_variant(&variants, &selected).cloned() else {
            return Ok(());
        };

        self.apply_variant(card, &variant)
    }

    fn selected_option_values(&self, card: NodeId) -> Result<Vec<String>> {
        let mut values = Vec::new();
        for select in self.dom.query_selector_all_from(card, "select")? {
            values.push(self.dom.value(select)?);
        }
        Ok(values)
    }

    fn card_variants(&mut self, card: NodeId) -> Result<Vec<Variant>> {
        let Some(script) = self
            .dom
            .query_selector_from(card, "script[type=\"application/json\"]")?
        else {
            return Ok(Vec::new());
        };
        let json = self.dom.text_content(script);
        match parse_variants(&json) {
            Ok(variants) => Ok(variants),
            Err(err) => {
                self.runtime
                    .error(format!("invalid variant data on card: {err}"));
                Ok(Vec::new())
            }
        }
    }

    fn apply_variant(&mut self, card: NodeId, variant: &Variant) -> Result<()> {
        self.dom.set_attr(card, "data-variant-id", &variant.id)?;
        self.dom
            .set_attr(card, "data-price", &variant.price.to_string())?;
        self.dom.set_attr(
            card,
            "data-available",
            if variant.available { "true" } else { "false" },
        )?;

        let template = self.money_template();
        if let Some(price_node) = self.dom.query_selector_from(card, ".upsell-card__price")? {
            self.dom
                .set_text_content(price_node, &format_money(variant.price, template.as_deref()))?;
        }
        if let Some(sku_node) = self.dom.query_selector_from(card, ".upsell-card__sku")? {
            self.dom
                .set_text_content(sku_node, variant.sku.as_deref().unwrap_or(""))?;
        }
        if let Some(image) = &variant.featured_image {
            if let Some(img) = self.dom.query_selector_from(card, "img")? {
                self.dom.set_attr(img, "src", &image.src)?;
            }
        }

        // The anchor product is not removable, so availability never touches
        // its checkbox.
        if self.is_main_card(card) {
            return self.refresh_subtotal();
        }

        let checkbox = self.card_checkbox(card)?;
        if variant.available {
            self.dom.class_remove(card, "is-unavailable")?;
            if let Some(badge) = self.sold_out_badge(card)? {
                self.dom.class_add(badge, "hidden")?;
            }
            if let Some(checkbox) = checkbox {
                self.dom.set_disabled(checkbox, false)?;
            }
            self.set_card_selected(card, true)
        } else {
            self.mark_unavailable(card)?;
            if let Some(checkbox) = checkbox {
                self.dom.set_disabled(checkbox, true)?;
            }
            self.set_card_selected(card, false)
        }
    }

    fn mark_unavailable(&mut self, card: NodeId) -> Result<()> {
        self.dom.class_add(card, "is-unavailable")?;
        if let Some(badge) = self.sold_out_badge(card)? {
            self.dom.class_remove(badge, "hidden")?;
        }
        Ok(())
    }

    fn sold_out_badge(&self, card: NodeId) -> Result<Option<NodeId>> {
        self.dom.query_selector_from(card, ".upsell-card__sold-out")
    }

    /// Sum of `data-price` over selected cards, rendered through the money
    /// formatter.
    pub(crate) fn refresh_subtotal(&mut self) -> Result<()> {
        let Some(readout) = self.dom.query_selector("[data-upsell-subtotal]")? else {
            return Ok(());
        };

        let mut total: i64 = 0;
        for card in self.cards()? {
            if self.dom.attr(card, "data-selected").as_deref() != Some("true") {
                continue;
            }
            if let Some(price) = self
                .dom
                .attr(card, "data-price")
                .and_then(|price| price.parse::<i64>().ok())
            {
                total += price;
            }
        }

        let template = self.money_template();
        self.dom
            .set_text_content(readout, &format_money(total, template.as_deref()))
    }

    /// Submits the current selection to the cart endpoint. An empty selection
    /// never touches the network; a failed submission is logged and stops
    /// before the close sequence.
    pub(crate) fn confirm_selection(&mut self, confirm: NodeId) -> Result<()> {
        let mut items = Vec::new();
        for card in self.cards()? {
            if self.dom.attr(card, "data-selected").as_deref() != Some("true") {
                continue;
            }
            let Some(id) = self
                .dom
                .attr(card, "data-variant-id")
                .filter(|id| !id.is_empty())
            else {
                continue;
            };
            items.push(CartItem { id, quantity: 1 });
        }

        if items.is_empty() {
            return Ok(());
        }

        let status = self.runtime.submit_cart(CART_ADD_URL, &items)?;
        if !(200..300).contains(&status) {
            self.runtime
                .error(format!("cart submission failed with status {status}"));
            return Ok(());
        }

        self.dom.class_add(confirm, "is-added")?;
        self.runtime.set_timeout(
            ADDED_FEEDBACK_DELAY_MS,
            TimerAction::AnnounceCartUpdate { did_error: false },
        );
        Ok(())
    }
}
