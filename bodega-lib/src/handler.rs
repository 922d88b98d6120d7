//! Business-logic seam behind the admission pipeline.
//!
//! The pipeline hands an admitted event plus its live session to a
//! `MessageHandler`; the handler drives step transitions and signals the
//! terminal order action back to the caller. A compact demo commerce
//! handler is included so the whole pipeline can run end to end.

use crate::admission::session::{CartLine, Discount, Session, SessionStep};
use crate::error::Result;
use crate::event::InboundEvent;
use crate::tenant::TenantProfile;

#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    /// Send this reply; the session stays live.
    Reply(String),
    /// Send this reply and close the session (order confirmed).
    CompleteOrder(String),
}

pub trait MessageHandler: Send + Sync {
    fn handle(
        &self,
        event: &InboundEvent,
        profile: &TenantProfile,
        session: &mut Session,
    ) -> Result<HandlerOutcome>;
}

/// A small fixed-catalog commerce flow for local runs and tests. Catalog
/// content, pricing and persistence belong to the surrounding product, not
/// this crate.
pub struct DemoCommerceHandler {
    catalog: Vec<(&'static str, &'static str, u64)>,
}

impl Default for DemoCommerceHandler {
    fn default() -> Self {
        Self {
            catalog: vec![
                ("cafe", "Coffee 250g", 650),
                ("pan", "Bread loaf", 300),
                ("leche", "Milk 1L", 180),
            ],
        }
    }
}

impl DemoCommerceHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, sku: &str) -> Option<CartLine> {
        self.catalog
            .iter()
            .find(|(s, _, _)| *s == sku)
            .map(|&(sku, name, price)| CartLine {
                sku: sku.to_string(),
                name: name.to_string(),
                quantity: 1,
                unit_price_cents: price,
            })
    }

    fn catalog_text(&self) -> String {
        let mut out = String::from("Catalog:\n");
        for (sku, name, price) in &self.catalog {
            out.push_str(&format!("  {sku} - {name} (${}.{:02})\n", price / 100, price % 100));
        }
        out.push_str("Send \"add <sku>\" to add an item, \"done\" to go back.");
        out
    }

    fn menu_text(profile: &TenantProfile) -> String {
        format!(
            "{}\nCommands: catalog, cart, checkout, register, order <sku>",
            profile.greeting
        )
    }

    fn cart_text(session: &Session) -> String {
        if session.cart.is_empty() {
            return "Your cart is empty.".to_string();
        }
        let mut out = String::from("Your cart:\n");
        for line in &session.cart {
            out.push_str(&format!("  {} x{}\n", line.name, line.quantity));
        }
        let total = session.cart_total_cents();
        out.push_str(&format!("Total: ${}.{:02}", total / 100, total % 100));
        out
    }

    fn handle_menu(
        &self,
        text: &str,
        profile: &TenantProfile,
        session: &mut Session,
    ) -> Result<HandlerOutcome> {
        let mut words = text.split_whitespace();
        match words.next() {
            Some("catalog") => {
                session.advance(SessionStep::Catalog)?;
                Ok(HandlerOutcome::Reply(self.catalog_text()))
            }
            Some("cart") => {
                session.advance(SessionStep::Cart)?;
                Ok(HandlerOutcome::Reply(format!(
                    "{}\nSend \"clear\" to empty it, \"done\" to go back.",
                    Self::cart_text(session)
                )))
            }
            Some("checkout") => {
                if session.cart.is_empty() {
                    return Ok(HandlerOutcome::Reply(
                        "Your cart is empty. Send \"catalog\" to browse.".to_string(),
                    ));
                }
                session.advance(SessionStep::Checkout)?;
                Ok(HandlerOutcome::Reply(format!(
                    "{}\nSend \"confirm\" to place the order, or \"discount <code>\".",
                    Self::cart_text(session)
                )))
            }
            Some("register") => {
                session.advance(SessionStep::Registration)?;
                Ok(HandlerOutcome::Reply(
                    "Send your details as: name; phone; address".to_string(),
                ))
            }
            Some("order") => {
                let Some(line) = words.next().and_then(|sku| self.find(sku)) else {
                    return Ok(HandlerOutcome::Reply(
                        "Unknown item. Send \"catalog\" to see what's available.".to_string(),
                    ));
                };
                session.advance(SessionStep::QuickOrder)?;
                session.cart.push(line);
                let total = session.cart_total_cents();
                Ok(HandlerOutcome::CompleteOrder(format!(
                    "Order placed! Total: ${}.{:02}. Thank you!",
                    total / 100,
                    total % 100
                )))
            }
            _ => Ok(HandlerOutcome::Reply(Self::menu_text(profile))),
        }
    }

    fn handle_catalog(&self, text: &str, session: &mut Session) -> Result<HandlerOutcome> {
        let mut words = text.split_whitespace();
        match words.next() {
            Some("add") => match words.next().and_then(|sku| self.find(sku)) {
                Some(line) => {
                    let name = line.name.clone();
                    match session.cart.iter_mut().find(|l| l.sku == line.sku) {
                        Some(existing) => existing.quantity += 1,
                        None => session.cart.push(line),
                    }
                    Ok(HandlerOutcome::Reply(format!("Added {name} to your cart.")))
                }
                None => Ok(HandlerOutcome::Reply("Unknown item.".to_string())),
            },
            Some("done") => {
                session.advance(SessionStep::Menu)?;
                Ok(HandlerOutcome::Reply("Back at the menu.".to_string()))
            }
            _ => Ok(HandlerOutcome::Reply(self.catalog_text())),
        }
    }

    fn handle_cart(&self, text: &str, session: &mut Session) -> Result<HandlerOutcome> {
        match text.trim() {
            "clear" => {
                session.cart.clear();
                Ok(HandlerOutcome::Reply("Cart cleared.".to_string()))
            }
            "done" => {
                session.advance(SessionStep::Menu)?;
                Ok(HandlerOutcome::Reply("Back at the menu.".to_string()))
            }
            _ => Ok(HandlerOutcome::Reply(Self::cart_text(session))),
        }
    }

    fn handle_checkout(&self, text: &str, session: &mut Session) -> Result<HandlerOutcome> {
        let mut words = text.split_whitespace();
        match words.next() {
            Some("confirm") => {
                let total = session.cart_total_cents();
                Ok(HandlerOutcome::CompleteOrder(format!(
                    "Order placed! Total: ${}.{:02}. Thank you!",
                    total / 100,
                    total % 100
                )))
            }
            Some("discount") => match words.next() {
                // The only code the demo knows about.
                Some("WELCOME10") => {
                    session.discount =
                        Some(Discount { code: "WELCOME10".to_string(), percent: 10 });
                    Ok(HandlerOutcome::Reply(format!(
                        "Discount applied. {}",
                        Self::cart_text(session)
                    )))
                }
                _ => Ok(HandlerOutcome::Reply("That code isn't valid.".to_string())),
            },
            _ => {
                session.advance(SessionStep::Menu)?;
                Ok(HandlerOutcome::Reply("Checkout cancelled.".to_string()))
            }
        }
    }

    fn handle_registration(&self, text: &str, session: &mut Session) -> Result<HandlerOutcome> {
        let mut parts = text.splitn(3, ';').map(str::trim);
        session.contact.name = parts.next().filter(|s| !s.is_empty()).map(String::from);
        session.contact.phone = parts.next().filter(|s| !s.is_empty()).map(String::from);
        session.contact.address = parts.next().filter(|s| !s.is_empty()).map(String::from);
        session.advance(SessionStep::Menu)?;
        Ok(HandlerOutcome::Reply("Thanks, your details are saved.".to_string()))
    }
}

impl MessageHandler for DemoCommerceHandler {
    fn handle(
        &self,
        event: &InboundEvent,
        profile: &TenantProfile,
        session: &mut Session,
    ) -> Result<HandlerOutcome> {
        let text = event.text.trim().to_lowercase();
        match session.step {
            SessionStep::Menu => self.handle_menu(&text, profile, session),
            SessionStep::Catalog => self.handle_catalog(&text, session),
            SessionStep::Cart => self.handle_cart(&text, session),
            // Checkout keeps the raw casing so discount codes match exactly.
            SessionStep::Checkout => self.handle_checkout(event.text.trim(), session),
            SessionStep::Registration => self.handle_registration(event.text.trim(), session),
            // QuickOrder completes in the same message that entered it; a
            // session seen here missed its terminal action, so reset.
            SessionStep::QuickOrder => {
                session.advance(SessionStep::Menu)?;
                Ok(HandlerOutcome::Reply(Self::menu_text(profile)))
            }
        }
    }
}
